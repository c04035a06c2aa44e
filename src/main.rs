//! closure-runner - coordinator closure task runner
//!
//! Entry point for the runner binary. A run fetches one task from the
//! coordinator, executes its closure through an external interpreter and
//! reports the outcome back on the task URI.

mod cli;
mod closure;
mod config;
mod coordinator;
mod error;
mod executor;
mod lifecycle;
mod logging;
mod source;
mod transport;
mod version;

use clap::Parser;
use tracing::{debug, info};

use crate::cli::{Cli, Commands};
use crate::config::RunnerConfig;
use crate::error::{Error, Result};
use crate::lifecycle::{Orchestrator, RUN_FAILURE_EXIT_CODE};

fn main() -> Result<()> {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    let (config_path, task_uri, skip_execution) = match cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(());
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_config_command(subcommand);
        }
        Commands::Run {
            config,
            task_uri,
            skip_execution,
        } => (config, task_uri, skip_execution),
    };

    let config = RunnerConfig::load(config_path.as_deref())
        .and_then(|mut cfg| cfg.apply_cli_overrides(task_uri, skip_execution).map(|_| cfg))
        .unwrap_or_else(|e| exit_with(&e, RUN_FAILURE_EXIT_CODE));

    // The guards must be kept alive until the run is over
    let log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    let build = version::build_info();
    info!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting closure runner"
    );
    debug!(
        has_task = config.has_task(),
        skip_execution = config.task.skip_execution,
        interpreter = %config.runner.interpreter,
        script_dir = %config.runner.script_dir,
        trust_bundle = %config.transport.trust_bundle,
        "Configuration loaded"
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    let code = match runtime.block_on(Orchestrator::new(config).run()) {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => {
            eprint!("{}", e.format_for_terminal());
            RUN_FAILURE_EXIT_CODE
        }
    };

    // Flush the file writer before exiting
    drop(runtime);
    drop(log_guards);

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Print the error for the terminal and exit with `code`
fn exit_with(error: &Error, code: i32) -> ! {
    eprint!("{}", error.format_for_terminal());
    std::process::exit(code);
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: cli::ConfigSubcommand) -> Result<()> {
    use cli::ConfigSubcommand;

    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = RunnerConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            config::init_config(path.as_deref(), force)?;
        }
        ConfigSubcommand::Validate { config } => match RunnerConfig::load(config.as_deref()) {
            Ok(_) => println!("Configuration is valid."),
            Err(e) => exit_with(&e, e.exit_code()),
        },
    }

    Ok(())
}
