use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables that can be layered from defaults, a config file and the
/// environment. Intervals are whole seconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between deployment status fetches.
    pub poll_interval: u64,
    /// Seconds between "still running" reports while a deployment runs.
    pub heartbeat_interval: u64,
    /// Seconds to follow a deployment before giving up on it.
    pub deadline: u64,
    /// Lifetime of the retrieval link handed to the dashboard, in seconds.
    pub link_expiry: u64,
    /// Seconds between upload progress reports.
    pub report_interval: u64,
    /// Bucket region; the ambient AWS region is used when unset.
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores.
    pub endpoint: Option<String>,
    pub dashboard_user: Option<String>,
    pub dashboard_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval: 5,
            heartbeat_interval: 60,
            deadline: 25 * 60,
            link_expiry: 5 * 60,
            report_interval: 5,
            region: None,
            endpoint: None,
            dashboard_user: None,
            dashboard_token: None,
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval.max(1))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval.max(1))
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline)
    }

    pub fn link_expiry(&self) -> Duration {
        Duration::from_secs(self.link_expiry)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval.max(1))
    }
}
