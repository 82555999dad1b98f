//! Top-level Error Types
//!
//! Each stage of a run raises one of these over the error tree of the crate
//! that failed, so the printed tree reads from stage down to cause.

use derive_more::{Display, Error};

/// A run error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for a run.
pub type Result<T> = std::result::Result<T, Error>;

/// The stage of the run that failed.
#[derive(Clone, Copy, Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Configuration,
    #[display("packaging failed")]
    Packaging,
    #[display("upload failed")]
    Upload,
    #[display("deployment failed")]
    Deployment,
}
