//! Dashboard client trait and implementations.

#[cfg(feature = "http")]
mod http;
#[cfg(any(test, feature = "mock"))]
mod mock;

#[cfg(feature = "http")]
pub use self::http::HttpDashboard;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::{MockDashboard, Step};
use crate::error::Result;
use crate::models::{Deployment, DeploymentRequest};
use async_trait::async_trait;

/// The three deployment calls the workflow needs from a dashboard.
///
/// Every call is attempted once; implementations never retry.
#[async_trait]
pub trait Dashboard: Send + Sync {
    /// Create a deployment of `request.reference_url` on the requested
    /// environment. The deployment does not run until started.
    async fn create(&self, request: &DeploymentRequest) -> Result<Deployment>;

    async fn start(&self, deployment: &Deployment) -> Result<Deployment>;

    /// Re-fetch the current state of a deployment.
    async fn status(&self, deployment: &Deployment) -> Result<Deployment>;
}
