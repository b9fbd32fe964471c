//! Logging System
//!
//! Structured logging through `tracing`. The host application may install its
//! own subscriber instead; `init_logging` is for hosts and tools that want the
//! cache's default setup.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Filter directive environment variable.
pub const LOG_ENV: &str = "OUTLINE_CACHE_LOG";
const LOG_FILE_ENV: &str = "OUTLINE_CACHE_LOG_FILE";
const LOG_FORMAT_ENV: &str = "OUTLINE_CACHE_LOG_FORMAT";
const LOG_OUTPUT_ENV: &str = "OUTLINE_CACHE_LOG_OUTPUT";
const LOG_MODULES_ENV: &str = "OUTLINE_CACHE_LOG_MODULES";

/// Resolve the log file path: `OUTLINE_CACHE_LOG_FILE`, then config, then the
/// platform state directory (optionally scoped to a document's directory).
pub fn resolve_log_file_path(
    config_file: Option<PathBuf>,
    document: Option<&Path>,
) -> Result<PathBuf, ApiError> {
    if let Ok(env_path) = std::env::var(LOG_FILE_ENV) {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    if let Some(p) = config_file {
        if !p.as_os_str().is_empty() {
            return Ok(p);
        }
    }
    default_log_file_path(document)
}

fn default_log_file_path(document: Option<&Path>) -> Result<PathBuf, ApiError> {
    let project_dirs = directories::ProjectDirs::from("", "outline-cache", "outline-cache")
        .ok_or_else(|| {
            ApiError::ConfigError(
                "Could not determine platform state directory for log file".to_string(),
            )
        })?;
    let mut dir = project_dirs
        .state_dir()
        .unwrap_or_else(|| project_dirs.cache_dir())
        .to_path_buf();
    if let Some(doc) = document {
        let canonical = dunce::canonicalize(doc).map_err(|e| {
            ApiError::ConfigError(format!("Failed to canonicalize document path: {}", e))
        })?;
        let parent = canonical.parent().unwrap_or(&canonical);
        for component in parent.components() {
            if let std::path::Component::Normal(name) = component {
                dir.push(name);
            }
        }
    }
    Ok(dir.join("outline-cache.log"))
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether logging is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file, file+stderr, both
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when output includes file; None means use runtime default
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Colored output (text format on a terminal only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Per-module levels, e.g. `outline_cache::reconcile = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Install the global subscriber.
///
/// Environment variables (`OUTLINE_CACHE_LOG`, `OUTLINE_CACHE_LOG_FORMAT`,
/// `OUTLINE_CACHE_LOG_OUTPUT`, `OUTLINE_CACHE_LOG_MODULES`) override the
/// config, which overrides the defaults. Fails if a global subscriber is
/// already installed.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), ApiError> {
    let already_set =
        |e: tracing_subscriber::util::TryInitError| ApiError::ConfigError(format!("Logging already initialized: {}", e));

    if config.is_some_and(|c| !c.enabled) {
        return Registry::default()
            .with(EnvFilter::new("off"))
            .try_init()
            .map_err(already_set);
    }

    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let output = determine_output(config)?;
    let log_file = config.and_then(|c| c.file.clone());
    let writer = make_writer(&output, log_file)?;
    // Never emit escape codes into a log file.
    let ansi = config.map_or(true, |c| c.color) && !output.file;

    let subscriber = Registry::default().with(filter);
    if format == "json" {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init()
            .map_err(already_set)
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .try_init()
            .map_err(already_set)
    }
}

fn open_log_file(config_file: Option<PathBuf>) -> Result<Arc<std::fs::File>, ApiError> {
    let log_file = resolve_log_file_path(config_file, None)?;
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ApiError::ConfigError(format!("Failed to create log directory: {}", e)))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .map_err(|e| {
            ApiError::ConfigError(format!("Failed to open log file {:?}: {}", log_file, e))
        })?;
    Ok(Arc::new(file))
}

fn make_writer(output: &OutputDestinations, log_file: Option<PathBuf>) -> Result<BoxMakeWriter, ApiError> {
    let writer = match (output.file, output.stdout, output.stderr) {
        (true, _, true) => BoxMakeWriter::new(open_log_file(log_file)?.and(std::io::stderr)),
        (true, _, false) => BoxMakeWriter::new(open_log_file(log_file)?),
        (false, true, true) => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
        (false, true, false) => BoxMakeWriter::new(std::io::stdout),
        (false, false, _) => BoxMakeWriter::new(std::io::stderr),
    };
    Ok(writer)
}

/// Build environment filter from config or environment variables
fn build_env_filter(config: Option<&LoggingConfig>) -> Result<EnvFilter, ApiError> {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return Ok(filter);
    }

    let level = config.map(|c| c.level.as_str()).unwrap_or("info");
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut directives: Vec<String> = Vec::new();
    if let Some(config) = config {
        directives.extend(
            config
                .modules
                .iter()
                .map(|(module, module_level)| format!("{}={}", module, module_level)),
        );
    }
    if let Ok(modules_str) = std::env::var(LOG_MODULES_ENV) {
        for module_spec in modules_str.split(',') {
            if let Some((module, module_level)) = module_spec.split_once('=') {
                directives.push(format!("{}={}", module.trim(), module_level.trim()));
            }
        }
    }

    let mut filter = EnvFilter::new(level);
    for directive in directives {
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| ApiError::ConfigError(format!("Invalid log directive {}: {}", directive, e)))?,
        );
    }
    Ok(filter)
}

/// Determine output format from config or environment
fn determine_format(config: Option<&LoggingConfig>) -> Result<String, ApiError> {
    if let Ok(format) = std::env::var(LOG_FORMAT_ENV) {
        if format == "json" || format == "text" {
            return Ok(format);
        }
    }
    let format = config.map(|c| c.format.as_str()).unwrap_or("text");
    if format != "json" && format != "text" {
        return Err(ApiError::ConfigError(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            format
        )));
    }
    Ok(format.to_string())
}

/// Output destinations
#[derive(Debug, PartialEq, Eq)]
struct OutputDestinations {
    stdout: bool,
    stderr: bool,
    file: bool,
}

fn determine_output(config: Option<&LoggingConfig>) -> Result<OutputDestinations, ApiError> {
    if let Ok(output) = std::env::var(LOG_OUTPUT_ENV) {
        return parse_output_destinations(&output);
    }
    let output = config.map(|c| c.output.as_str()).unwrap_or("stderr");
    parse_output_destinations(output)
}

fn parse_output_destinations(output: &str) -> Result<OutputDestinations, ApiError> {
    let (stdout, stderr, file) = match output {
        "stdout" => (true, false, false),
        "stderr" => (false, true, false),
        "file" => (false, false, true),
        "file+stderr" => (false, true, true),
        "both" => (true, true, false),
        _ => {
            return Err(ApiError::ConfigError(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr', 'file', 'file+stderr', or 'both')",
                output
            )))
        }
    };
    Ok(OutputDestinations {
        stdout,
        stderr,
        file,
    })
}
