pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, FileConfig};
pub use error::{
    ConversionError, FetchError, LogReadError, LogWriteError, MediaError, PlugError, StoreError,
};
pub use types::*;
