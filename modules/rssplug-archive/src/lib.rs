pub mod archive;
pub mod feed;

pub use archive::{Archive, ArchiveConfig};
pub use feed::parse_feed;
