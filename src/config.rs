//! Configuration system for the closure runner
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (`TASK_URI`, `TOKEN`, `CLOSURE_RUNNER_*`)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Environment variable carrying the coordinator task URI
pub const TASK_URI_ENV: &str = "TASK_URI";

/// Environment variable carrying the coordinator auth token
pub const TOKEN_ENV: &str = "TOKEN";

/// Main runner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Task being run and how the lifecycle is reported
    pub task: TaskSettings,

    /// Coordinator transport settings
    pub transport: TransportSettings,

    /// Script materialization and interpreter settings
    pub runner: ExecutionSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Task settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    /// Coordinator task URI (blank = nothing to run)
    pub uri: String,

    /// Skip the STARTED report and the failure boundary armed with it
    pub skip_execution: bool,

    /// Auth token sent with every coordinator call; only ever read from the environment
    #[serde(skip)]
    pub token: String,
}

/// Transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// PEM bundle used as custom certificate authority when it probes usable
    pub trust_bundle: String,

    /// Header carrying the auth token
    pub auth_header: String,
}

/// Script and interpreter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    /// Interpreter executable
    pub interpreter: String,

    /// Arguments placed before the closure arguments (launcher script etc.)
    pub interpreter_args: Vec<String>,

    /// Directory receiving the materialized closure source
    pub script_dir: String,

    /// Extension of the materialized source file
    pub script_extension: String,

    /// File the interpreter writes the JSON output mapping to
    pub result_file: String,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            trust_bundle: "/app/trust.pem".to_string(),
            auth_header: "x-xenon-auth-token".to_string(),
        }
    }
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            interpreter: "/usr/bin/powershell".to_string(),
            interpreter_args: vec!["-file".to_string(), "../context_object_class.ps1".to_string()],
            script_dir: "./user_scripts".to_string(),
            script_extension: "ps1".to_string(),
            result_file: "output.txt".to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_files: 5,
            json_format: false,
        }
    }
}

impl RunnerConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path).map_err(|e| Error::IoRead {
                path: path.clone(),
                source: e,
            })?;
            config = toml::from_str(&content).map_err(|e| Error::ConfigParse {
                message: format!("{}: {}", path.display(), e.message()),
                source: Some(e),
            })?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::ConfigNotFound { path });
        }

        let search_paths = [
            PathBuf::from("closure-runner.toml"),
            dirs::config_dir()
                .map(|p| p.join("closure-runner").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/closure-runner/config.toml"),
        ];

        for path in &search_paths {
            if path.is_file() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Contract variables shared with the coordinator
        if let Ok(val) = std::env::var(TASK_URI_ENV) {
            self.task.uri = val;
        }
        if let Ok(val) = std::env::var(TOKEN_ENV) {
            self.task.token = val;
        }
        if let Ok(val) = std::env::var("CLOSURE_RUNNER_SKIP_EXECUTION") {
            self.task.skip_execution = parse_bool(&val);
        }

        // Transport settings
        if let Ok(val) = std::env::var("CLOSURE_RUNNER_TRUST_BUNDLE") {
            self.transport.trust_bundle = val;
        }
        if let Ok(val) = std::env::var("CLOSURE_RUNNER_AUTH_HEADER") {
            self.transport.auth_header = val;
        }

        // Runner settings
        if let Ok(val) = std::env::var("CLOSURE_RUNNER_INTERPRETER") {
            self.runner.interpreter = val;
        }
        if let Ok(val) = std::env::var("CLOSURE_RUNNER_INTERPRETER_ARGS") {
            self.runner.interpreter_args = val.split_whitespace().map(str::to_string).collect();
        }
        if let Ok(val) = std::env::var("CLOSURE_RUNNER_SCRIPT_DIR") {
            self.runner.script_dir = val;
        }
        if let Ok(val) = std::env::var("CLOSURE_RUNNER_SCRIPT_EXTENSION") {
            self.runner.script_extension = val;
        }
        if let Ok(val) = std::env::var("CLOSURE_RUNNER_RESULT_FILE") {
            self.runner.result_file = val;
        }

        // Logging settings
        if let Ok(val) = std::env::var("CLOSURE_RUNNER_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("CLOSURE_RUNNER_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("CLOSURE_RUNNER_LOG_JSON") {
            self.logging.json_format = parse_bool(&val);
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        self.transport.trust_bundle = expand_path(&self.transport.trust_bundle);
        self.runner.script_dir = expand_path(&self.runner.script_dir);
        self.runner.result_file = expand_path(&self.runner.result_file);

        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    ///
    /// A blank task URI is valid: the run aborts silently instead.
    fn validate(&self) -> Result<()> {
        if !self.task.uri.trim().is_empty() {
            let parsed = url::Url::parse(self.task.uri.trim()).map_err(|e| {
                Error::config_field_invalid("task.uri", format!("Invalid task URI '{}': {}", self.task.uri, e))
            })?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(Error::config_field_invalid(
                    "task.uri",
                    "Task URI must start with http:// or https://",
                ));
            }
        }

        if self.runner.interpreter.trim().is_empty() {
            return Err(Error::config_field_invalid("runner.interpreter", "Interpreter cannot be empty"));
        }
        if self.runner.script_extension.trim().is_empty() {
            return Err(Error::config_field_invalid(
                "runner.script_extension",
                "Script extension cannot be empty",
            ));
        }
        if self.transport.auth_header.trim().is_empty() {
            return Err(Error::config_field_invalid("transport.auth_header", "Auth header cannot be empty"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Whether there is a task to run
    pub fn has_task(&self) -> bool {
        !self.task.uri.trim().is_empty()
    }

    /// Apply `run` flags, which take precedence over file and environment
    pub fn apply_cli_overrides(&mut self, task_uri: Option<String>, skip_execution: bool) -> Result<()> {
        if let Some(uri) = task_uri {
            self.task.uri = uri;
        }
        if skip_execution {
            self.task.skip_execution = true;
        }
        self.validate()
    }
}

fn parse_bool(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<()> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| PathBuf::from("closure-runner.toml"));

    if config_path.exists() && !force {
        return Err(Error::config_validation(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::IoWrite {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(&config_path, DEFAULT_CONFIG).map_err(|e| Error::IoWrite {
        path: config_path.clone(),
        source: e,
    })?;

    println!("Configuration file created: {}", config_path.display());
    Ok(())
}

/// Default configuration content with comments
const DEFAULT_CONFIG: &str = r#"# Closure Runner Configuration
#
# TASK_URI and TOKEN are always taken from the environment.

[task]
# Skip the STARTED report (the closure still runs)
skip_execution = false

[transport]
# PEM bundle used as custom certificate authority when the coordinator accepts it
trust_bundle = "/app/trust.pem"

# Header carrying the auth token
auth_header = "x-xenon-auth-token"

[runner]
# Interpreter executable and the arguments placed before the closure arguments
interpreter = "/usr/bin/powershell"
interpreter_args = ["-file", "../context_object_class.ps1"]

# Where closure sources are materialized
script_dir = "./user_scripts"
script_extension = "ps1"

# JSON output mapping written by the interpreter, relative to the working directory
result_file = "output.txt"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "/var/log/closure-runner/runner.log"

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#;
