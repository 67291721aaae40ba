//! Error types for the acme-dns hook
//!
//! This module defines all error types used throughout the workspace.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for hook operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the acme-dns hook
#[derive(Error, Debug)]
pub enum Error {
    /// Storage file exists but does not contain a valid account mapping
    #[error("Storage JSON is corrupted: {0}")]
    StorageCorrupt(String),

    /// Storage file exists but cannot be read
    #[error("Storage file exists but cannot be read: {0}")]
    StorageUnreadable(String),

    /// Storage file could not be written
    #[error("Could not write storage file: {0}")]
    StorageWriteFailed(String),

    /// acme-dns rejected the account registration
    #[error(
        "Encountered an error while trying to register a new acme-dns account. \
         HTTP status {status}, Response body: {body}"
    )]
    RegistrationFailed {
        /// HTTP status returned by the service
        status: u16,
        /// Raw response body
        body: String,
    },

    /// acme-dns rejected the TXT update
    #[error(
        "Encountered an error while trying to update TXT record in acme-dns.\n\
         ------- Request:\n{request}\n\
         ------- Response HTTP status: {status}\n\
         ------- Response body: {body}"
    )]
    UpdateFailed {
        /// HTTP status returned by the service
        status: u16,
        /// Redacted dump of the request
        request: String,
        /// Raw response body
        body: String,
    },

    /// The delegating CNAME could not be created
    #[error("Failed to create CNAME record: {0}")]
    CnameCreateFailed(String),

    /// The existing CNAME could not be listed or deleted
    #[error("Failed to delete DNS record: {0}")]
    CnameDeleteFailed(String),

    /// The TXT record did not resolve in time
    #[error("Timeout waiting for DNS records to propagate after {elapsed:?}")]
    PropagationTimeout {
        /// Time spent polling
        elapsed: Duration,
    },

    /// The name does not resolve (NXDOMAIN or no TXT data yet)
    #[error("Record not found: {0}")]
    NotFound(String),

    /// DNS resolution failed for another reason
    #[error("DNS resolution error: {0}")]
    Resolve(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),
}

impl Error {
    /// Create a storage corruption error
    pub fn storage_corrupt(msg: impl Into<String>) -> Self {
        Self::StorageCorrupt(msg.into())
    }

    /// Create a storage read error
    pub fn storage_unreadable(msg: impl Into<String>) -> Self {
        Self::StorageUnreadable(msg.into())
    }

    /// Create a storage write error
    pub fn storage_write(msg: impl Into<String>) -> Self {
        Self::StorageWriteFailed(msg.into())
    }

    /// Create a CNAME creation error
    pub fn cname_create(msg: impl Into<String>) -> Self {
        Self::CnameCreateFailed(msg.into())
    }

    /// Create a CNAME deletion error
    pub fn cname_delete(msg: impl Into<String>) -> Self {
        Self::CnameDeleteFailed(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a resolution error
    pub fn resolve(msg: impl Into<String>) -> Self {
        Self::Resolve(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Whether the reconciler may fall back to manual instructions
    /// instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::CnameCreateFailed(_) | Self::CnameDeleteFailed(_))
    }

    /// Whether this is the "does not resolve yet" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
