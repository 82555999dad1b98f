//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
/// SDK-specific failures are classified into one of these by the backend that
/// produced them and never escape it.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    /// The credentials in use are not allowed to write the object
    #[display("access denied: {_0}")]
    AccessDenied(#[error(not(source))] String),
    /// No credentials could be found in the environment
    #[display("no credentials available for the object store")]
    CredentialsMissing,
    /// Anything else that went wrong while transferring the object
    #[display("upload failed: {_0}")]
    UploadFailed(#[error(not(source))] String),
    /// The object was stored but no retrieval link could be generated
    #[display("unable to generate a retrieval link: {_0}")]
    Presign(#[error(not(source))] String),
    /// Destination URI is not of the form `s3://bucket/key`
    #[display("invalid S3 URI '{_0}': {_1}")]
    InvalidUri(#[error(not(source))] String, #[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UploadFailed(_) | Self::Presign(_))
    }
}
