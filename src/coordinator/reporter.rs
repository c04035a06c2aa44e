//! Lifecycle status reporting
//!
//! Every report is a PATCH of the task URI. A rejected PATCH is returned as
//! [`Error::Report`]; nothing is retried.

use std::sync::Arc;

use reqwest::Method;
use tracing::{debug, info};

use crate::closure::{LifecycleState, Semaphore, StatusUpdate, ValueMap};
use crate::error::{Error, Result};
use crate::transport::Transport;

/// PATCHes lifecycle state to the task URI
pub struct StatusReporter {
    transport: Arc<Transport>,
    task_uri: String,
}

impl StatusReporter {
    pub fn new(transport: Arc<Transport>, task_uri: impl Into<String>) -> Self {
        Self {
            transport,
            task_uri: task_uri.into(),
        }
    }

    pub async fn report_started(&self, semaphore: &Semaphore) -> Result<()> {
        self.send(StatusUpdate::started(semaphore.clone())).await
    }

    pub async fn report_finished(&self, semaphore: &Semaphore, outputs: ValueMap) -> Result<()> {
        self.send(StatusUpdate::finished(semaphore.clone(), outputs)).await
    }

    /// Report a failure; `closureSemaphore` is omitted when no semaphore is known
    pub async fn report_failed(&self, semaphore: Option<&Semaphore>, error: &Error) -> Result<()> {
        self.send(StatusUpdate::failed(semaphore.cloned(), error.to_string()))
            .await
    }

    async fn send(&self, update: StatusUpdate) -> Result<()> {
        let state = update.state;
        debug!(uri = %self.task_uri, state = %state, "Reporting closure state");

        let response = self.transport.patch(&self.task_uri, &update).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::report(&Method::PATCH, &self.task_uri, status));
        }

        if state != LifecycleState::Started {
            println!("Script run state: {}", state);
        }
        info!(state = %state, "Closure state reported");
        Ok(())
    }
}
