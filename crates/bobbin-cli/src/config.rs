//! Configuration for the `bobbin` binary.
//!
//! Layered resolution, highest priority first:
//! 1. CLI flags
//! 2. Environment variables (clap `env`)
//! 3. TOML config file (`--config`, or `<config_dir>/bobbin/config.toml`)
//! 4. Compiled defaults from `bobbin_core::config`
//!
//! Durations in the file and on the command line are whole seconds.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bobbin_core::config::BobbinConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    #[error("{field} must be at least one second")]
    ZeroDuration { field: &'static str },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct BobbinConfigFile {
    storage: StorageFileConfig,
    leases: LeasesFileConfig,
    reaper: ReaperFileConfig,
}

/// `[storage]`
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StorageFileConfig {
    data_dir: Option<PathBuf>,
}

/// `[leases]`
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct LeasesFileConfig {
    duration_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

/// `[reaper]`
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ReaperFileConfig {
    retention_secs: Option<u64>,
    interval_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// Global options shared by every subcommand.
#[derive(clap::Args, Debug, Default)]
pub struct CliArgs {
    /// Directory holding `tasks/`, `leases/` and `metadata/`.
    #[arg(long, global = true, env = "BOBBIN_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Path to config file (default: `~/.config/bobbin/config.toml`).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Lease length granted by `lease`, in seconds.
    #[arg(long, global = true, env = "BOBBIN_LEASE_SECS")]
    pub lease_secs: Option<u64>,

    /// Age after which the reaper deletes a task, in seconds.
    #[arg(long, global = true, env = "BOBBIN_RETENTION_SECS")]
    pub retention_secs: Option<u64>,

    /// Seconds between reaper passes.
    #[arg(long, global = true)]
    pub reap_interval_secs: Option<u64>,

    /// Seconds between expired-lease sweeps.
    #[arg(long, global = true)]
    pub sweep_interval_secs: Option<u64>,

    /// Log level filter (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[arg(long, global = true, default_value = "info", env = "BOBBIN_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CliConfig {
    pub core: BobbinConfig,
    pub log_level: String,
}

impl CliConfig {
    /// Merge CLI args, env vars and the config file.
    ///
    /// An explicit `--config` that cannot be read is an error; a missing
    /// default file is treated as empty.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    fn resolve(cli: &CliArgs, file: &BobbinConfigFile) -> Result<Self, ConfigError> {
        let defaults = BobbinConfig::default();

        let core = BobbinConfig {
            data_dir: cli
                .data_dir
                .clone()
                .or_else(|| file.storage.data_dir.clone())
                .unwrap_or(defaults.data_dir),
            lease_duration: seconds(
                "lease duration",
                cli.lease_secs.or(file.leases.duration_secs),
                defaults.lease_duration,
            )?,
            retention: seconds(
                "retention",
                cli.retention_secs.or(file.reaper.retention_secs),
                defaults.retention,
            )?,
            reap_interval: seconds(
                "reap interval",
                cli.reap_interval_secs.or(file.reaper.interval_secs),
                defaults.reap_interval,
            )?,
            lease_sweep_interval: seconds(
                "lease sweep interval",
                cli.sweep_interval_secs.or(file.leases.sweep_interval_secs),
                defaults.lease_sweep_interval,
            )?,
        };

        Ok(Self {
            core,
            log_level: cli.log_level.clone(),
        })
    }
}

fn seconds(
    field: &'static str,
    value: Option<u64>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(0) => Err(ConfigError::ZeroDuration { field }),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(default),
    }
}

fn load_config_file(explicit_path: Option<&Path>) -> Result<BobbinConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    }

    let Some(config_dir) = dirs::config_dir() else {
        return Ok(BobbinConfigFile::default());
    };
    let path = config_dir.join("bobbin").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BobbinConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bobbin_core::config::{DEFAULT_LEASE_DURATION, DEFAULT_RETENTION};
    use std::io::Write;

    fn cli() -> CliArgs {
        CliArgs {
            log_level: "info".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_file_gives_core_defaults() {
        let file: BobbinConfigFile = toml::from_str("").unwrap();
        let config = CliConfig::resolve(&cli(), &file).unwrap();

        assert_eq!(config.core, BobbinConfig::default());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn toml_parsing_full() {
        let toml_str = r#"
[storage]
data_dir = "/var/lib/bobbin"

[leases]
duration_secs = 30
sweep_interval_secs = 5

[reaper]
retention_secs = 600
interval_secs = 60
"#;
        let file: BobbinConfigFile = toml::from_str(toml_str).unwrap();
        let config = CliConfig::resolve(&cli(), &file).unwrap();

        assert_eq!(config.core.data_dir, PathBuf::from("/var/lib/bobbin"));
        assert_eq!(config.core.lease_duration, Duration::from_secs(30));
        assert_eq!(config.core.lease_sweep_interval, Duration::from_secs(5));
        assert_eq!(config.core.retention, Duration::from_secs(600));
        assert_eq!(config.core.reap_interval, Duration::from_secs(60));
    }

    #[test]
    fn toml_parsing_partial() {
        let toml_str = r#"
[reaper]
retention_secs = 3600
"#;
        let file: BobbinConfigFile = toml::from_str(toml_str).unwrap();
        let config = CliConfig::resolve(&cli(), &file).unwrap();

        assert_eq!(config.core.retention, Duration::from_secs(3600));
        assert_eq!(config.core.lease_duration, DEFAULT_LEASE_DURATION);
        assert_eq!(config.core.data_dir, PathBuf::from("database"));
    }

    #[test]
    fn cli_overrides_file() {
        let toml_str = r#"
[storage]
data_dir = "/from/file"

[leases]
duration_secs = 30
"#;
        let file: BobbinConfigFile = toml::from_str(toml_str).unwrap();
        let args = CliArgs {
            data_dir: Some(PathBuf::from("/from/cli")),
            retention_secs: None,
            ..cli()
        };
        let config = CliConfig::resolve(&args, &file).unwrap();

        assert_eq!(config.core.data_dir, PathBuf::from("/from/cli"));
        assert_eq!(config.core.lease_duration, Duration::from_secs(30));
        assert_eq!(config.core.retention, DEFAULT_RETENTION);
    }

    #[test]
    fn zero_seconds_is_rejected() {
        let file = BobbinConfigFile::default();
        let args = CliArgs {
            sweep_interval_secs: Some(0),
            ..cli()
        };

        let err = CliConfig::resolve(&args, &file).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ZeroDuration {
                field: "lease sweep interval"
            }
        ));
    }

    #[test]
    fn explicit_config_file_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[leases]\nduration_secs = 90").unwrap();

        let args = CliArgs {
            config: Some(file.path().to_path_buf()),
            ..cli()
        };
        let config = CliConfig::load(&args).unwrap();
        assert_eq!(config.core.lease_duration, Duration::from_secs(90));
    }

    #[test]
    fn explicit_missing_config_file_returns_error() {
        let result = load_config_file(Some(Path::new("/nonexistent/bobbin.toml")));
        assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
    }

    #[test]
    fn malformed_config_file_returns_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[leases\nduration_secs = ").unwrap();

        let result = load_config_file(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::ParseToml(_))));
    }
}
