use thiserror::Error;

/// Errors that can occur while loading, fetching or resolving documents.
///
/// Per-node resolution failures are not reported through this type; they are
/// recorded as diagnostics on the owning document instead.
#[derive(Error, Debug)]
pub enum XrefError {
    #[error("invalid reference uri: {message} (uri: {uri})")]
    InvalidUri { message: String, uri: String },

    #[error("unknown project \"{key}\" for link: {uri}")]
    UnknownProject { key: String, uri: String },

    #[error("fetch error: {message} (url: {url})")]
    Fetch { message: String, url: String },

    #[error("document error: {message} (path: {path})")]
    Document { message: String, path: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results using `XrefError`.
pub type Result<T> = std::result::Result<T, XrefError>;
