use thiserror::Error;

/// Feed or media retrieval failure.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse feed {url}: {reason}")]
    Parse { url: String, reason: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Request { url, .. }
            | FetchError::Status { url, .. }
            | FetchError::Parse { url, .. } => url,
        }
    }
}

/// Content store write failure.
#[derive(Error, Debug)]
#[error("Content store write failed: {0}")]
pub struct StoreError(pub String);

/// Media resolution failure: either the fetch or the store write.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Markup conversion failure. Only image substitution can fail.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Image substitution failed for {src}: {source}")]
    Image {
        src: String,
        #[source]
        source: MediaError,
    },
}

/// Log scan failure.
#[derive(Error, Debug)]
#[error("Log read failed: {0}")]
pub struct LogReadError(pub String);

/// Log append failure.
#[derive(Error, Debug)]
#[error("Log append failed: {0}")]
pub struct LogWriteError(pub String);

/// Top-level pipeline error. Every variant names the step and, where one
/// exists, the feed item link it failed on.
#[derive(Error, Debug)]
pub enum PlugError {
    #[error("Feed fetch failed: {0}")]
    Feed(#[source] FetchError),

    #[error("Log scan failed: {0}")]
    History(#[from] LogReadError),

    #[error("Converting {link} failed: {source}")]
    Conversion {
        link: String,
        #[source]
        source: ConversionError,
    },

    #[error("Cover image for {link} failed: {source}")]
    CoverImage {
        link: String,
        #[source]
        source: MediaError,
    },

    #[error("Avatar {url} failed: {source}")]
    Avatar {
        url: String,
        #[source]
        source: MediaError,
    },

    #[error("Publishing {label} failed: {source}")]
    Publish {
        label: String,
        #[source]
        source: LogWriteError,
    },

    #[error("Feed has no items")]
    EmptyFeed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_error_names_the_image() {
        let err = ConversionError::Image {
            src: "https://cdn.example.com/a.png".into(),
            source: MediaError::Fetch(FetchError::Status {
                url: "https://cdn.example.com/a.png".into(),
                status: 404,
            }),
        };

        let msg = err.to_string();
        assert!(msg.contains("https://cdn.example.com/a.png"));
        assert!(msg.contains("HTTP 404"));
    }

    #[test]
    fn plug_error_carries_link_context() {
        let err = PlugError::Publish {
            label: "https://example.com/post".into(),
            source: LogWriteError("connection reset".into()),
        };
        assert_eq!(
            err.to_string(),
            "Publishing https://example.com/post failed: Log append failed: connection reset"
        );
    }
}
