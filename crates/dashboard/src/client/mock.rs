//! Scripted dashboard for testing.

use crate::client::Dashboard;
use crate::error::{ErrorKind, Result};
use crate::models::{Deployment, DeploymentRequest, DeploymentState};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A call that a [`MockDashboard`] can be told to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Create,
    Start,
    /// Fail the status fetch after this many successful ones.
    Status(usize),
}

/// Dashboard double that walks a deployment through a scripted list of states.
///
/// Created deployments start out [`New`](DeploymentState::New) and are
/// [`Queued`](DeploymentState::Queued) once started. Each status fetch then
/// returns the next scripted state, repeating the last one once the script
/// runs out.
pub struct MockDashboard {
    script: Mutex<VecDeque<DeploymentState>>,
    last: Mutex<DeploymentState>,
    failure: Option<Step>,
    fetches: AtomicUsize,
    requests: Mutex<Vec<DeploymentRequest>>,
}

impl MockDashboard {
    pub fn new(states: impl IntoIterator<Item = DeploymentState>) -> Self {
        Self {
            script: Mutex::new(states.into_iter().collect()),
            last: Mutex::new(DeploymentState::Queued),
            failure: None,
            fetches: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(mut self, step: Step) -> Self {
        self.failure = Some(step);
        self
    }

    /// Number of status fetches made so far, failed ones included.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Every request passed to [`create()`](Dashboard::create).
    pub fn requests(&self) -> Vec<DeploymentRequest> {
        self.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
    }

    fn fail(&self, step: Step) -> Result<()> {
        match self.failure {
            Some(failure) if failure == step => exn::bail!(ErrorKind::Http(format!("injected {step:?} failure"))),
            _ => Ok(()),
        }
    }

    fn with_state(deployment: &Deployment, state: DeploymentState) -> Deployment {
        Deployment { state, ..deployment.clone() }
    }
}

#[async_trait]
impl Dashboard for MockDashboard {
    async fn create(&self, request: &DeploymentRequest) -> Result<Deployment> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.fail(Step::Create)?;
        Ok(Deployment {
            id: "1".to_string(),
            stack_id: request.stack_id.clone(),
            environment_id: request.environment_id.clone(),
            state: DeploymentState::New,
            reference_url: Some(request.reference_url.clone()),
            title: request.title.clone(),
        })
    }

    async fn start(&self, deployment: &Deployment) -> Result<Deployment> {
        self.fail(Step::Start)?;
        Ok(Self::with_state(deployment, DeploymentState::Queued))
    }

    async fn status(&self, deployment: &Deployment) -> Result<Deployment> {
        let succeeded = self.fetches.fetch_add(1, Ordering::SeqCst);
        self.fail(Step::Status(succeeded))?;
        let mut last = self.last.lock().map_err(|_| exn::Exn::from(ErrorKind::Http("poisoned".to_string())))?;
        if let Some(next) = self.script.lock().ok().and_then(|mut script| script.pop_front()) {
            *last = next;
        }
        Ok(Self::with_state(deployment, last.clone()))
    }
}
