use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a deployment as reported by the dashboard.
///
/// Unrecognised states are kept verbatim in [`Other`](Self::Other) so they
/// can still be reported when they change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeploymentState {
    New,
    Queued,
    Pending,
    Completed,
    Failed,
    Other(String),
}

impl DeploymentState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::New => "new",
            Self::Queued => "queued",
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Other(state) => state,
        }
    }

    /// `true` for states a deployment never leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl From<String> for DeploymentState {
    fn from(state: String) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "new" => Self::New,
            "queued" => Self::Queued,
            "pending" => Self::Pending,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Other(state),
        }
    }
}

impl From<&str> for DeploymentState {
    fn from(state: &str) -> Self {
        Self::from(state.to_string())
    }
}

impl From<DeploymentState> for String {
    fn from(state: DeploymentState) -> Self {
        match state {
            DeploymentState::Other(state) => state,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to deploy, and where.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeploymentRequest {
    pub stack_id: String,
    pub environment_id: String,
    /// Link the dashboard fetches the package from.
    pub reference_url: String,
    pub title: String,
}

/// A deployment as last seen on the dashboard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deployment {
    pub id: String,
    pub stack_id: String,
    pub environment_id: String,
    pub state: DeploymentState,
    pub reference_url: Option<String>,
    pub title: String,
}
