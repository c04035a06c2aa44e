//! CLI argument parsing using clap v4

use clap::{Parser, Subcommand};

/// Closure runner - executes one coordinator closure task
///
/// Fetches the task named by TASK_URI, materializes the closure source,
/// runs it through the configured interpreter and reports the outcome back
/// to the coordinator.
#[derive(Parser, Debug)]
#[command(name = "closure-runner")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the task named by TASK_URI
    Run {
        /// Path to configuration file
        #[arg(short, long, env = "CLOSURE_RUNNER_CONFIG")]
        config: Option<String>,

        /// Task URI, overriding TASK_URI and the config file
        #[arg(long)]
        task_uri: Option<String>,

        /// Do not report STARTED before running
        #[arg(long)]
        skip_execution: bool,
    },

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the effective configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Write a commented default configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}
