//! Configuration Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// All of these are raised before any packaging or network activity.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("invalid source directory {}", _0.display())]
    InvalidSource(#[error(not(source))] PathBuf),
    #[display("invalid destination '{_0}', expected s3://bucket/key")]
    InvalidObjectUri(#[error(not(source))] String),
    #[display("invalid dashboard URL '{_0}', expected https://host/naut/project/<stack>/environment/<environment>")]
    InvalidDashboardUrl(#[error(not(source))] String),
    #[display("environment variable {_0} must be set")]
    MissingCredentials(#[error(not(source))] &'static str),
    #[display("unable to load configuration")]
    Load,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
