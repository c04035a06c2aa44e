//! Task and closure description retrieval

use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::closure::{ClosureDescription, TaskDescriptor};
use crate::error::{Error, Result};
use crate::transport::Transport;

/// Path segment at which task URIs are cut to find the coordinator root
pub const CLOSURES_PATH_MARKER: &str = "/resources/closures/";

/// Build the closure description URI from the task URI and the description link
///
/// Everything from the first `/resources/closures/` on is dropped from the task
/// URI and the link is appended. A task URI without the marker is used whole.
pub fn build_description_uri(task_uri: &str, description_link: &str) -> String {
    let head = task_uri
        .split_once(CLOSURES_PATH_MARKER)
        .map_or(task_uri, |(head, _)| head);
    format!("{}{}", head, description_link)
}

/// Reads coordinator documents for one run
pub struct CoordinatorClient {
    transport: Arc<Transport>,
}

impl CoordinatorClient {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    /// GET the task descriptor
    pub async fn fetch_task(&self, task_uri: &str) -> Result<TaskDescriptor> {
        info!(uri = task_uri, "Fetching task descriptor");
        let task: TaskDescriptor = self.get_json(task_uri).await?;
        debug!(
            semaphore = %task.closure_semaphore,
            inputs = task.inputs.len(),
            link = %task.description_link,
            "Task descriptor received"
        );
        Ok(task)
    }

    /// GET the closure description referenced by `task`
    pub async fn fetch_description(&self, task_uri: &str, task: &TaskDescriptor) -> Result<ClosureDescription> {
        let uri = build_description_uri(task_uri, &task.description_link);
        info!(uri = %uri, "Fetching closure description");
        let description: ClosureDescription = self.get_json(&uri).await?;
        debug!(
            name = %description.name,
            entrypoint = ?description.entrypoint,
            outputs = ?description.output_names,
            remote = description.remote_source().is_some(),
            "Closure description received"
        );
        Ok(description)
    }

    async fn get_json<T: DeserializeOwned>(&self, uri: &str) -> Result<T> {
        let response = self.transport.get(uri).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::report(&Method::GET, uri, status));
        }

        let body = response.bytes().await.map_err(|e| Error::http(uri, e))?;
        serde_json::from_slice(&body).map_err(|e| Error::Malformed {
            url: uri.to_string(),
            message: e.to_string(),
        })
    }
}
