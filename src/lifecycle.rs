//! Closure run lifecycle
//!
//! Drives one run from task retrieval to the final status report:
//!
//! ```text
//! IDLE -> FETCHING_TASK -> (STARTED) -> MATERIALIZING_SOURCE -> RUNNING -> FINISHED | FAILED
//! ```
//!
//! Once STARTED has been attempted the run is armed: any error escaping
//! preparation is reported as FAILED exactly once before it propagates.
//! Failures while running are reported the same way but end the run with
//! [`RunOutcome::Failed`] instead of an error.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::closure::{ClosureDescription, EntryPoint, Semaphore, TaskDescriptor, ValueMap};
use crate::config::RunnerConfig;
use crate::coordinator::{CoordinatorClient, StatusReporter};
use crate::error::{Error, Result};
use crate::executor::{ExecutionContext, ExecutionRunner};
use crate::source::SourceMaterializer;
use crate::transport::{Transport, TrustResolver};

/// Exit status of a run that failed, whatever the cause
pub const RUN_FAILURE_EXIT_CODE: i32 = 1;

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// No task URI was configured
    Aborted,
    /// The closure ran and FINISHED was reported
    Finished { outputs: ValueMap },
    /// The closure failed while running and FAILED was reported
    Failed { message: String },
}

impl RunOutcome {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Aborted | RunOutcome::Finished { .. } => 0,
            RunOutcome::Failed { .. } => RUN_FAILURE_EXIT_CODE,
        }
    }
}

/// Collaborators bound to one task URI
struct Session {
    task_uri: String,
    transport: Arc<Transport>,
    coordinator: CoordinatorClient,
    reporter: StatusReporter,
    materializer: SourceMaterializer,
    runner: ExecutionRunner,
}

/// Runs a single closure end to end
pub struct Orchestrator {
    config: RunnerConfig,
}

impl Orchestrator {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Run the configured task
    pub async fn run(&self) -> Result<RunOutcome> {
        let task_uri = self.config.task.uri.trim();
        if task_uri.is_empty() {
            println!("TASK_URI environment variable is not set. Aborting...");
            info!("No task URI configured, nothing to run");
            return Ok(RunOutcome::Aborted);
        }

        let result = match self.session(task_uri) {
            Ok(session) => {
                let result = self.drive(&session).await;
                let trust = session.transport.trust().state();
                debug!(probed = trust.probed, use_custom_ca = trust.use_custom_ca, "Trust decision");
                result
            }
            Err(e) => Err(e),
        };

        let completed_at = chrono::Local::now();
        println!("Script run completed at: {}", completed_at);
        match &result {
            Ok(outcome) => info!(completed_at = %completed_at.to_rfc3339(), outcome = ?outcome, "Closure run completed"),
            Err(e) => error!(completed_at = %completed_at.to_rfc3339(), error = %e.format_for_log(), "Closure run aborted"),
        }
        result
    }

    fn session(&self, task_uri: &str) -> Result<Session> {
        let transport_settings = &self.config.transport;
        let trust = Arc::new(TrustResolver::new(&transport_settings.trust_bundle));
        let transport = Arc::new(Transport::new(transport_settings, &self.config.task.token, trust)?);

        Ok(Session {
            task_uri: task_uri.to_string(),
            coordinator: CoordinatorClient::new(Arc::clone(&transport)),
            reporter: StatusReporter::new(Arc::clone(&transport), task_uri),
            materializer: SourceMaterializer::new(Arc::clone(&transport), &self.config.runner),
            runner: ExecutionRunner::new(
                &self.config.runner,
                self.config.task.token.clone(),
                transport_settings.trust_bundle.clone(),
            ),
            transport,
        })
    }

    async fn drive(&self, session: &Session) -> Result<RunOutcome> {
        let task = session.coordinator.fetch_task(&session.task_uri).await?;
        let semaphore = &task.closure_semaphore;
        let armed = !self.config.task.skip_execution;

        let (description, entry) = match self.prepare(session, &task, armed).await {
            Ok(prepared) => prepared,
            Err(e) => {
                if armed {
                    report_failure(&session.reporter, semaphore, &e).await;
                }
                return Err(e);
            }
        };

        let context = ExecutionContext {
            task_uri: &session.task_uri,
            inputs: &task.inputs,
            output_names: &description.output_names,
            semaphore,
            entry: &entry,
        };

        match self.execute(session, &context).await {
            Ok(outputs) => Ok(RunOutcome::Finished { outputs }),
            Err(e) => {
                println!("*******************");
                println!("Script run failed with: {}", e);
                report_failure(&session.reporter, semaphore, &e).await;
                Ok(RunOutcome::Failed { message: e.to_string() })
            }
        }
    }

    /// Steps guarded by the failure boundary once armed
    async fn prepare(
        &self,
        session: &Session,
        task: &TaskDescriptor,
        armed: bool,
    ) -> Result<(ClosureDescription, EntryPoint)> {
        if armed {
            session.reporter.report_started(&task.closure_semaphore).await?;
        }

        let description = session
            .coordinator
            .fetch_description(&session.task_uri, task)
            .await?;
        let entry = EntryPoint::resolve(&description)?;
        session.materializer.materialize(&description, &entry.module).await?;
        debug!(
            script_dir = %session.materializer.script_dir().display(),
            module = %entry.module,
            "Closure source ready"
        );

        Ok((description, entry))
    }

    async fn execute(&self, session: &Session, context: &ExecutionContext<'_>) -> Result<ValueMap> {
        let outputs = session.runner.run(context).await?;
        session
            .reporter
            .report_finished(context.semaphore, outputs.clone())
            .await?;
        Ok(outputs)
    }
}

/// Send the single FAILED report for `cause`; a rejected report is only logged
async fn report_failure(reporter: &StatusReporter, semaphore: &Semaphore, cause: &Error) {
    warn!(error = %cause, "Reporting closure failure");
    if let Err(e) = reporter.report_failed(Some(semaphore), cause).await {
        error!(error = %e, cause = %cause, "Failed to report closure failure");
    }
}
