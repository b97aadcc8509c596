use bobbin_core::app::BuildError;
use bobbin_core::domain::BobbinError;

use crate::bootstrap::BootstrapError;
use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("start-up failed: {0}")]
    Build(#[from] BuildError),

    #[error(transparent)]
    Core(#[from] BobbinError),

    #[error("invalid argument: {0}")]
    Usage(String),

    #[error("failed to write output: {0}")]
    Output(#[from] serde_json::Error),

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}
