//! Coordinator payloads
//!
//! JSON documents exchanged with the coordinator. Field names follow the
//! coordinator's camelCase wire format.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Mapping of input or output names to JSON values
pub type ValueMap = Map<String, Value>;

// ─────────────────────────────────────────────────────────────────
// Semaphore
// ─────────────────────────────────────────────────────────────────

/// Opaque correlation token identifying one closure run
///
/// Echoed back exactly as received, whatever JSON type the coordinator used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Semaphore(pub Value);

impl Semaphore {
    /// Plain string form, without JSON quoting for string tokens
    pub fn as_arg(&self) -> String {
        match &self.0 {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_arg())
    }
}

// ─────────────────────────────────────────────────────────────────
// Task Descriptor
// ─────────────────────────────────────────────────────────────────

/// Coordinator record describing one invocation request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDescriptor {
    /// Correlation token for this run
    pub closure_semaphore: Semaphore,

    /// Input values by name
    #[serde(default)]
    pub inputs: ValueMap,

    /// Coordinator-relative link to the closure description
    pub description_link: String,
}

// ─────────────────────────────────────────────────────────────────
// Closure Description
// ─────────────────────────────────────────────────────────────────

/// User script plus its declared outputs and entry point
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosureDescription {
    /// Closure name, used as handler name when no entry point is set
    pub name: String,

    /// `module.handler`; `None` when the field is absent
    #[serde(default)]
    pub entrypoint: Option<String>,

    /// Names of the outputs the closure produces
    #[serde(default)]
    pub output_names: Vec<String>,

    /// Inline source code
    #[serde(default)]
    pub source: Option<String>,

    /// Remote source location, takes precedence over `source` when non-empty
    #[serde(default, rename = "sourceURL")]
    pub source_url: Option<String>,
}

impl ClosureDescription {
    /// Non-empty source URL, if any
    pub fn remote_source(&self) -> Option<&str> {
        self.source_url.as_deref().filter(|url| !url.trim().is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────
// Lifecycle State
// ─────────────────────────────────────────────────────────────────

/// Run state reported to the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Started,
    Finished,
    Failed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Started => "STARTED",
            LifecycleState::Finished => "FINISHED",
            LifecycleState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// PATCH body sent to the task URI
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub state: LifecycleState,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub closure_semaphore: Option<Semaphore>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<ValueMap>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
}

impl StatusUpdate {
    pub fn started(semaphore: Semaphore) -> Self {
        Self {
            state: LifecycleState::Started,
            closure_semaphore: Some(semaphore),
            outputs: None,
            error_msg: None,
        }
    }

    pub fn finished(semaphore: Semaphore, outputs: ValueMap) -> Self {
        Self {
            state: LifecycleState::Finished,
            closure_semaphore: Some(semaphore),
            outputs: Some(outputs),
            error_msg: None,
        }
    }

    pub fn failed(semaphore: Option<Semaphore>, error_msg: String) -> Self {
        Self {
            state: LifecycleState::Failed,
            closure_semaphore: semaphore,
            outputs: None,
            error_msg: Some(error_msg),
        }
    }
}
