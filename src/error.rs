//! Error types for the observability bridge

use thiserror::Error;

/// Main error type for the bridge
#[derive(Error, Debug)]
pub enum Error {
    /// Upstream catalog error
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Upstream audit-event error
    #[error("Event upstream error: {0}")]
    Events(#[from] EventError),

    /// Event sink error
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Cursor persistence error
    #[error("Cursor error: {0}")]
    Cursor(#[from] CursorError),

    /// Hostname resolution error
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Target file publication error
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the upstream catalog API
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Transport-level failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered outside the 2xx range
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

}

/// Errors from the upstream audit-event API
#[derive(Error, Debug)]
pub enum EventError {
    /// Transport-level failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered outside the 2xx range
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Token acquisition failed
    #[error("Authentication error: {0}")]
    Authentication(String),
}

/// Errors from the event sink
#[derive(Error, Debug)]
pub enum SinkError {
    /// Transport-level failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The sink answered outside [200, 300)
    #[error("Status: {status} Body: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// Envelope serialization failed
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors from cursor persistence
#[derive(Error, Debug)]
pub enum CursorError {
    /// The persistent medium refused the write
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from hostname resolution
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Lookup failed (non-existent hostname or transient DNS failure)
    #[error("Failed to resolve {hostname}: {source}")]
    Lookup {
        /// The hostname that failed to resolve
        hostname: String,
        /// Underlying resolver error
        source: std::io::Error,
    },
}

/// Errors from target file publication
#[derive(Error, Debug)]
pub enum PublishError {
    /// Target list serialization failed
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Filesystem write or rename failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
