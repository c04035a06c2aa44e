//! Interpreter invocation
//!
//! Runs the configured interpreter against the materialized script with a
//! structured argument vector. The child's stderr decides success: any
//! diagnostic output is a failure regardless of the exit status.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::closure::{EntryPoint, Semaphore, ValueMap};
use crate::config::{ExecutionSettings, TOKEN_ENV};
use crate::error::{Error, Result};

const BANNER: &str = "*******************";

/// Everything the interpreter needs to know about one closure run
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext<'a> {
    pub task_uri: &'a str,
    pub inputs: &'a ValueMap,
    pub output_names: &'a [String],
    pub semaphore: &'a Semaphore,
    pub entry: &'a EntryPoint,
}

/// Whether the result file should be read for these output names
///
/// The joined names must be non-empty and purely alphabetic.
pub fn wants_outputs(output_names: &[String]) -> bool {
    let joined = output_names.concat();
    !joined.is_empty() && joined.chars().all(char::is_alphabetic)
}

/// Invokes the interpreter for a closure
pub struct ExecutionRunner {
    settings: ExecutionSettings,
    token: String,
    trust_bundle: String,
}

impl ExecutionRunner {
    pub fn new(settings: &ExecutionSettings, token: impl Into<String>, trust_bundle: impl Into<String>) -> Self {
        Self {
            settings: settings.clone(),
            token: token.into(),
            trust_bundle: trust_bundle.into(),
        }
    }

    /// Location of the result file the script writes
    ///
    /// Relative paths resolve against the runner's working directory, which
    /// the child inherits.
    pub fn result_path(&self) -> PathBuf {
        PathBuf::from(&self.settings.result_file)
    }

    /// Arguments passed after the interpreter program
    pub fn build_args(&self, context: &ExecutionContext<'_>) -> Result<Vec<String>> {
        let inputs = serde_json::to_string(context.inputs)
            .map_err(|e| Error::Internal(format!("Failed to encode inputs: {}", e)))?;
        let outputs = serde_json::to_string(context.output_names)
            .map_err(|e| Error::Internal(format!("Failed to encode output names: {}", e)))?;

        let mut args = self.settings.interpreter_args.clone();
        args.extend([
            inputs,
            "-outputs".to_string(),
            outputs,
            "-closure_semaphore".to_string(),
            context.semaphore.as_arg(),
            "-closure_uri".to_string(),
            context.task_uri.to_string(),
            "-token".to_string(),
            self.token.clone(),
            "-source_name".to_string(),
            context.entry.source_file(&self.settings.script_extension),
            "-handler_name".to_string(),
            context.entry.handler.clone(),
            "-trusted_certs".to_string(),
            self.trust_bundle.clone(),
        ]);
        Ok(args)
    }

    /// Run the closure and collect its outputs
    pub async fn run(&self, context: &ExecutionContext<'_>) -> Result<ValueMap> {
        let args = self.build_args(context)?;

        // The token still travels as an argument; only the environment is cleaned
        if std::env::var_os(TOKEN_ENV).is_some() {
            std::env::remove_var(TOKEN_ENV);
        }

        info!(
            interpreter = %self.settings.interpreter,
            source = %context.entry.source_file(&self.settings.script_extension),
            handler = %context.entry.handler,
            "Running closure"
        );

        println!("Script run logs:");
        println!("{}", BANNER);

        let output = Command::new(&self.settings.interpreter)
            .args(&args)
            .env_remove(TOKEN_ENV)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::InterpreterSpawn {
                program: self.settings.interpreter.clone(),
                source: e,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        println!("{}", stdout);
        debug!(status = %output.status, stdout_bytes = output.stdout.len(), "Interpreter exited");

        if !stderr.is_empty() {
            return Err(Error::ExecutionFailed {
                stderr: stderr.into_owned(),
            });
        }
        if !output.status.success() {
            warn!(status = %output.status, "Interpreter exited unsuccessfully without diagnostics");
        }

        let outputs = if wants_outputs(context.output_names) {
            self.read_outputs().await?
        } else {
            ValueMap::new()
        };
        println!("{}", BANNER);
        Ok(outputs)
    }

    async fn read_outputs(&self) -> Result<ValueMap> {
        let path = self.result_path();
        let output_error = |message: String| Error::OutputRead {
            path: path.clone(),
            message,
        };

        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| output_error(e.to_string()))?;
        let outputs: ValueMap = serde_json::from_str(&contents).map_err(|e| output_error(e.to_string()))?;

        debug!(path = %path.display(), count = outputs.len(), "Outputs read");
        Ok(outputs)
    }
}
