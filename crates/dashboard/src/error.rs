//! Dashboard Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A dashboard error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for dashboard operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// ### Workflow Errors
/// Raised by [`deploy()`](crate::deploy), each one ending the workflow:
/// - [`ErrorKind::CreateFailed`], [`ErrorKind::StartFailed`] and
///   [`ErrorKind::PollFetchFailed`] wrap the transport error of the step that
///   failed.
/// - [`ErrorKind::DeploymentFailed`] and [`ErrorKind::Timeout`] name the
///   dashboard page where the deployment can be inspected. A timed out
///   deployment is left running.
///
/// ### Transport Errors
/// Raised by [`Dashboard`](crate::Dashboard) implementations.
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("failed to create deployment")]
    CreateFailed,
    #[display("failed to start deployment")]
    StartFailed,
    #[display("failed to fetch deployment status")]
    PollFetchFailed,
    #[display("deployment failed, check {_0} for details")]
    DeploymentFailed(#[error(not(source))] String),
    #[display("timed out waiting for the deployment to finish, check {_0} for details")]
    Timeout(#[error(not(source))] String),
    /// Request could not be sent, or the dashboard answered with an error status
    #[display("dashboard request failed: {_0}")]
    Http(#[error(not(source))] String),
    /// Dashboard answered with something other than a deployment
    #[display("unexpected dashboard response: {_0}")]
    Decode(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::PollFetchFailed)
    }
}
