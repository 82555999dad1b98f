pub mod client;
mod controller;
pub mod error;
mod models;

pub use crate::client::Dashboard;
pub use crate::controller::{DeployEvent, Schedule, deploy};
pub use crate::models::{Deployment, DeploymentRequest, DeploymentState};
