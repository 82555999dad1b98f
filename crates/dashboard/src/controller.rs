//! Deployment workflow: create, start, then follow until done.

use crate::client::Dashboard;
use crate::error::{ErrorKind, Result};
use crate::models::{Deployment, DeploymentRequest, DeploymentState};
use async_stream::stream;
use exn::ResultExt;
use futures::Stream;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};

/// Timer cadence of the polling phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schedule {
    /// How often the deployment is re-fetched.
    pub poll: Duration,
    /// How often a still-running deployment is reported.
    pub heartbeat: Duration,
    /// How long to follow the deployment before giving up on it.
    pub deadline: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            poll: Duration::from_secs(5),
            heartbeat: Duration::from_secs(60),
            deadline: Duration::from_secs(25 * 60),
        }
    }
}

/// Progress of a [`deploy()`] workflow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeployEvent {
    Created(Deployment),
    Started(Deployment),
    /// Reported once per transition, never once per poll.
    StateChanged { from: DeploymentState, to: DeploymentState },
    /// The deployment is still running.
    Heartbeat { state: DeploymentState, elapsed: Duration },
    /// Terminal success; always the last item of the stream.
    Completed(Deployment),
}

enum Tick {
    Deadline,
    Poll,
    Heartbeat,
}

/// Create and start a deployment of `request`, then follow it until it
/// reaches a terminal state.
///
/// The stream ends after [`DeployEvent::Completed`] or after its first error,
/// whichever comes first. Errors are never retried:
/// - [`CreateFailed`](ErrorKind::CreateFailed),
///   [`StartFailed`](ErrorKind::StartFailed) and
///   [`PollFetchFailed`](ErrorKind::PollFetchFailed) when the dashboard call
///   of that step fails,
/// - [`DeploymentFailed`](ErrorKind::DeploymentFailed) when the deployment
///   ends up failed,
/// - [`Timeout`](ErrorKind::Timeout) once `schedule.deadline` has passed since
///   the deployment was started. The deployment itself is left alone.
///
/// Both terminal errors name `dashboard_url`.
///
/// All timers are tokio timers, so a paused test clock drives the whole
/// workflow.
///
/// # Examples
///
/// ```no_run
/// use futures::TryStreamExt;
/// use tarship_dashboard::{Dashboard, DeploymentRequest, Schedule, deploy, error::Result};
///
/// async fn follow(dashboard: &dyn Dashboard, request: DeploymentRequest) -> Result<()> {
///     let url = "https://dashboard.example.com/naut/project/stack/environment/prod".to_string();
///     let events = deploy(dashboard, request, url, Schedule::default());
///     futures::pin_mut!(events);
///     while let Some(event) = events.try_next().await? {
///         println!("{event:?}");
///     }
///     Ok(())
/// }
/// ```
pub fn deploy<'a>(
    dashboard: &'a dyn Dashboard,
    request: DeploymentRequest,
    dashboard_url: String,
    schedule: Schedule,
) -> impl Stream<Item = Result<DeployEvent>> + Send + 'a {
    stream! {
        let created = match dashboard.create(&request).await.or_raise(|| ErrorKind::CreateFailed) {
            Ok(created) => created,
            Err(err) => { yield Err(err); return; },
        };
        tracing::debug!(id = %created.id, state = %created.state, "Deployment created");
        yield Ok(DeployEvent::Created(created.clone()));

        let mut deployment = match dashboard.start(&created).await.or_raise(|| ErrorKind::StartFailed) {
            Ok(started) => started,
            Err(err) => { yield Err(err); return; },
        };
        tracing::debug!(id = %deployment.id, state = %deployment.state, "Deployment started");
        yield Ok(DeployEvent::Started(deployment.clone()));

        let started = Instant::now();
        let deadline = sleep_until(started + schedule.deadline);
        tokio::pin!(deadline);
        let mut poll = interval_at(started + schedule.poll, schedule.poll);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut heartbeat = interval_at(started + schedule.heartbeat, schedule.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The deadline always wins a tie.
            let tick = tokio::select! {
                biased;
                () = &mut deadline => Tick::Deadline,
                _ = poll.tick() => Tick::Poll,
                _ = heartbeat.tick() => Tick::Heartbeat,
            };
            match tick {
                Tick::Deadline => {
                    yield Err(exn::Exn::from(ErrorKind::Timeout(dashboard_url.clone())));
                    return;
                },
                Tick::Heartbeat => {
                    yield Ok(DeployEvent::Heartbeat { state: deployment.state.clone(), elapsed: started.elapsed() });
                },
                Tick::Poll => {
                    let fetched = tokio::select! {
                        biased;
                        () = &mut deadline => None,
                        fetched = dashboard.status(&deployment) => Some(fetched),
                    };
                    let current = match fetched.map(|fetched| fetched.or_raise(|| ErrorKind::PollFetchFailed)) {
                        None => {
                            yield Err(exn::Exn::from(ErrorKind::Timeout(dashboard_url.clone())));
                            return;
                        },
                        Some(Ok(current)) => current,
                        Some(Err(err)) => { yield Err(err); return; },
                    };
                    tracing::debug!(id = %current.id, state = %current.state, "Polled deployment");
                    let previous = std::mem::replace(&mut deployment, current);
                    if previous.state != deployment.state {
                        yield Ok(DeployEvent::StateChanged { from: previous.state, to: deployment.state.clone() });
                    }
                    match deployment.state {
                        DeploymentState::Completed => {
                            yield Ok(DeployEvent::Completed(deployment));
                            return;
                        },
                        DeploymentState::Failed => {
                            yield Err(exn::Exn::from(ErrorKind::DeploymentFailed(dashboard_url.clone())));
                            return;
                        },
                        _ => {},
                    }
                },
            }
        }
    }
}
