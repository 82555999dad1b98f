//! Packaging Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A packaging error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for scanning and packaging operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// ### Scan Errors
/// - [`ErrorKind::NotFound`] and [`ErrorKind::NotADirectory`] are raised
///   before any traversal happens.
/// - [`ErrorKind::Unreadable`] is yielded in place of a single entry that
///   could not be read mid-walk.
///
/// ### Packaging Errors
/// - [`ErrorKind::Scan`] wraps an [`Unreadable`](ErrorKind::Unreadable) entry
///   that reached the packager, aborting the archive.
/// - [`ErrorKind::Header`], [`ErrorKind::Open`] and [`ErrorKind::Copy`]
///   identify the stage of a single entry that failed.
/// - [`ErrorKind::Finish`] covers finalizing the tar and gzip streams.
/// - [`ErrorKind::Sink`] means the output itself went away (for example the
///   reading end of a pipe was dropped); the cause lies downstream.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("path '{}' doesn't exist", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    #[display("{} is not a directory", _0.display())]
    NotADirectory(#[error(not(source))] PathBuf),
    #[display("unable to read {}", _0.display())]
    Unreadable(#[error(not(source))] PathBuf),
    #[display("directory scan failed")]
    Scan,
    #[display("cannot write archive header for {}", _0.display())]
    Header(#[error(not(source))] PathBuf),
    #[display("cannot open {}", _0.display())]
    Open(#[error(not(source))] PathBuf),
    #[display("cannot copy file data for {} into archive", _0.display())]
    Copy(#[error(not(source))] PathBuf),
    #[display("cannot finalize archive")]
    Finish,
    #[display("archive output closed")]
    Sink,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreadable(_) | Self::Open(_) | Self::Copy(_))
    }
}
