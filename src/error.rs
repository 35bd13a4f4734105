//! Error types for the learn-sync library.

use thiserror::Error;

/// Errors that can occur while syncing or downloading course content.
#[derive(Error, Debug)]
pub enum Error {
    /// The session token could not be obtained or was rejected.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A predownload reference could not be exchanged for a transfer URL.
    #[error("Failed to resolve download link for {reference}: {message}")]
    Resolution {
        /// The predownload reference that failed to resolve.
        reference: String,
        /// Description of the failure.
        message: String,
    },

    /// Transferring bytes from a resolved URL failed.
    #[error("Transfer from {url} failed: {message}")]
    Transfer {
        /// The transfer URL.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// A document contained a node type this crate does not understand.
    #[error("Unknown node type {kind:?} for node {name:?}")]
    UnknownNodeType {
        /// Display name of the offending node.
        name: String,
        /// The unrecognised `type` value.
        kind: String,
    },

    /// A node was structurally incomplete (for example a leaf without a reference).
    #[error("Malformed node {name:?}: {reason}")]
    MalformedNode {
        /// Display name of the offending node.
        name: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The cached tree document could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A background download batch panicked or was aborted.
    #[error("Download task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A specialized `Result` type for learn-sync operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Renders an error and its whole `source()` chain as a multi-line trace.
///
/// Per-job failures are reported as progress events rather than propagated,
/// so this is the only place their cause chain survives.
#[must_use]
pub fn error_trace(err: &(dyn std::error::Error + 'static)) -> String {
    let mut trace = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        trace.push_str("\n  caused by: ");
        trace.push_str(&cause.to_string());
        source = cause.source();
    }
    trace
}
