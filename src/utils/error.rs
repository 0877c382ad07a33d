//! Error types for the serverwatch collaborators
//!
//! This module defines the error types of the leaf components. Channel errors
//! live next to the channel trait in [`crate::channel`].

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the A2S metadata query
#[derive(Error, Debug)]
pub enum QueryError {
    /// Socket error while talking to the server
    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),

    /// The server did not answer within the query timeout
    #[error("Query timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Reply ended before all expected fields were read
    #[error("Truncated reply while reading {0}")]
    Truncated(&'static str),

    /// Reply did not start with a known packet header
    #[error("Unexpected packet header: {0:#x}")]
    UnexpectedHeader(i32),

    /// Reply carried an unexpected payload type
    #[error("Unexpected reply type: {0:#x}")]
    UnexpectedReply(u8),

    /// The server kept answering with a challenge
    #[error("Server repeated the challenge")]
    ChallengeLoop,

    /// Split reply that this client cannot reassemble
    #[error("Unsupported split reply: {0}")]
    UnsupportedSplit(String),
}

/// Errors from the geolocation lookup
///
/// The resolver absorbs these and falls back to the unknown label; they are
/// surfaced for logging.
#[derive(Error, Debug)]
pub enum GeoError {
    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Lookup service answered with a non-success status
    #[error("Lookup service returned status {0}")]
    Status(u16),

    /// Reply did not contain a country code
    #[error("Reply has no country code")]
    MissingCountry,

    /// Invalid lookup URL
    #[error("Invalid lookup URL: {0}")]
    InvalidUrl(String),
}

/// Errors from the durable binding store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not read the bindings file
    #[error("Failed to read bindings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write or replace the bindings file
    #[error("Failed to write bindings to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
