pub mod chunker;
pub mod dedup;
pub mod markup;
pub mod media;
pub mod plug;
pub mod publisher;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use chunker::Chunker;
pub use dedup::new_items;
pub use markup::MarkupConverter;
pub use media::MediaResolver;
pub use plug::{preview_feed, Plug, PlugConfig, TickReport};
pub use publisher::ThreadPublisher;
