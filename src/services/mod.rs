pub mod availability;
pub mod download_tracker;
pub mod media;
pub mod radarr_scanner;
pub mod scanner;
pub mod scheduler;
pub mod sonarr_scanner;

pub use availability::AvailabilityReconciler;
pub use download_tracker::DownloadTracker;
pub use media::{MediaError, MediaStore};
pub use radarr_scanner::MovieScanner;
pub use scanner::{ScanError, ScanStatus};
pub use scheduler::Scheduler;
pub use sonarr_scanner::SeriesScanner;
