//! Configuration file support.
//!
//! Settings are layered: defaults < config file < command-line arguments.
//! Unknown fields are ignored. A broken file at the default location is
//! reported and skipped; a broken file named with `--config` is fatal.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use etcetera::BaseStrategy;
use pipewright_core::{EscapeMode, ExecutorOptions};

use crate::args::CommandLineArgs;
use crate::events::TraceEvent;

/// Root configuration structure.
#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// How commands are spawned and collected.
    pub executor: ExecutorOptions,

    /// Defaults for `--remote`.
    pub remote: RemoteConfig,

    /// Additional tracing events to enable.
    pub log_enable: Vec<TraceEvent>,
}

/// Defaults applied to remote commands.
#[derive(Clone, Debug, Default, serde::Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RemoteConfig {
    /// Login user when `--remote` names only a host.
    pub user: Option<String>,

    /// Identity file passed to ssh.
    pub identity: Option<PathBuf>,

    /// `-o` options passed to ssh, before any given on the command line.
    pub ssh_options: BTreeMap<String, String>,

    /// How single quotes in the remote command are escaped.
    pub escape_mode: EscapeMode,
}

impl Config {
    /// Produces executor options with command-line arguments applied over the
    /// configured values.
    pub fn executor_options(&self, args: &CommandLineArgs) -> ExecutorOptions {
        let mut options = self.executor.clone();

        options.verbose |= args.verbose;

        if let Some(mode) = args.spawn_mode {
            options.spawn_mode = mode.into();
        }
        if let Some(ms) = args.echo_after_ms {
            options.collector.echo_after_ms = ms;
        }
        if let Some(ms) = args.poll_interval_ms {
            options.collector.poll_interval_ms = ms;
        }

        options
    }

    /// Returns the escape mode for remote commands, preferring the command line.
    pub fn remote_escape_mode(&self, args: &CommandLineArgs) -> EscapeMode {
        args.escape_mode.map_or(self.remote.escape_mode, EscapeMode::from)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse the TOML content.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result of attempting to load a configuration file.
#[derive(Debug, Default)]
pub struct ConfigLoadResult {
    /// The loaded configuration, or the defaults if loading failed.
    pub config: Config,

    /// The path that was used (or attempted).
    pub path: Option<PathBuf>,

    /// Any error that occurred during loading.
    pub error: Option<ConfigLoadError>,

    /// Whether the path came from `--config`; errors are then fatal.
    pub explicit_path: bool,
}

/// Returns the default configuration file path for the current platform.
pub fn default_config_path() -> Option<PathBuf> {
    let strategy = etcetera::choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("pipewright").join("config.toml"))
}

fn parse_file(path: &Path) -> Result<Config, ConfigLoadError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Loads configuration.
///
/// # Arguments
///
/// * `disabled` - Skip loading and return defaults.
/// * `explicit_path` - Use this path instead of the default.
pub fn load_config(disabled: bool, explicit_path: Option<&Path>) -> ConfigLoadResult {
    if disabled {
        return ConfigLoadResult::default();
    }

    let Some(path) = explicit_path
        .map(Path::to_path_buf)
        .or_else(default_config_path)
    else {
        return ConfigLoadResult::default();
    };

    let explicit_path = explicit_path.is_some();

    // A missing file at the default location just means no configuration.
    if !explicit_path && !path.exists() {
        return ConfigLoadResult {
            path: Some(path),
            ..ConfigLoadResult::default()
        };
    }

    match parse_file(&path) {
        Ok(config) => ConfigLoadResult {
            config,
            path: Some(path),
            error: None,
            explicit_path,
        },
        Err(error) => ConfigLoadResult {
            config: Config::default(),
            path: Some(path),
            error: Some(error),
            explicit_path,
        },
    }
}
