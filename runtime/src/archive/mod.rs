//! Download bookkeeping and the on-disk archive tree.

pub mod barrier;
pub mod dedup;
pub mod organizer;

pub use barrier::DownloadSyncBarrier;
pub use dedup::{ContentIdentifier, DownloadDeduplicator};
pub use organizer::ArchiveOrganizer;
