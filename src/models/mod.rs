pub mod media;

pub use media::{MediaKind, MediaRecord, MediaStatus, ProcessableSeason, Season};
