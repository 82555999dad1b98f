use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use futures::StreamExt;
use tarship_dashboard::{Dashboard, DeployEvent, Deployment, DeploymentRequest, Schedule, deploy};
use tracing::instrument;

/// Drive a deployment to completion, logging its progress.
#[instrument(skip_all, fields(stack = %request.stack_id, environment = %request.environment_id))]
pub async fn follow(
    dashboard: &dyn Dashboard,
    request: DeploymentRequest,
    dashboard_url: String,
    schedule: Schedule,
) -> Result<Deployment> {
    let events = deploy(dashboard, request, dashboard_url, schedule);
    futures::pin_mut!(events);
    while let Some(event) = events.next().await {
        match event.or_raise(|| ErrorKind::Deployment)? {
            DeployEvent::Created(deployment) => tracing::info!(id = %deployment.id, "Deployment created"),
            DeployEvent::Started(deployment) => tracing::info!(id = %deployment.id, "Deployment started"),
            DeployEvent::StateChanged { from, to } => tracing::info!(%from, %to, "Deployment state changed"),
            DeployEvent::Heartbeat { state, elapsed } => {
                tracing::info!(%state, elapsed = %format!("{}s", elapsed.as_secs()), "Deployment still running")
            },
            DeployEvent::Completed(deployment) => {
                tracing::info!(id = %deployment.id, "Deployment completed");
                return Ok(deployment);
            },
        }
    }
    exn::bail!(ErrorKind::Deployment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarship_dashboard::DeploymentState;
    use tarship_dashboard::client::{MockDashboard, Step};

    fn request() -> DeploymentRequest {
        DeploymentRequest {
            stack_id: "mystack".to_string(),
            environment_id: "prod".to_string(),
            reference_url: "https://bucket.s3.mock/site.tar.gz".to_string(),
            title: "Deployment from CI".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_to_completion() {
        let dashboard = MockDashboard::new([DeploymentState::Pending, DeploymentState::Completed]);
        let deployment = follow(&dashboard, request(), "https://dash/env".to_string(), Schedule::default()).await.unwrap();
        assert_eq!(deployment.state, DeploymentState::Completed);
        assert_eq!(deployment.reference_url.as_deref(), Some("https://bucket.s3.mock/site.tar.gz"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_failure() {
        let dashboard = MockDashboard::new([DeploymentState::Pending]).failing_at(Step::Start);
        let err = follow(&dashboard, request(), "https://dash/env".to_string(), Schedule::default()).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Deployment);
        assert_eq!(dashboard.fetches(), 0);
    }
}
