pub mod lock;

pub use lock::KeyedMutex;
