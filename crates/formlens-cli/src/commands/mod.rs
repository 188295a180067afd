//! CLI subcommands and the helpers they share.

pub mod batch;
pub mod config;
pub mod output;
pub mod process;

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use formlens_core::models::config::{FormlensConfig, StrategyKind};

/// Strategy override accepted on the command line.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum StrategyArg {
    /// Document-analysis service with key-value and selection detection
    Layout,
    /// Multimodal model reading rendered page images
    Vision,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Layout => StrategyKind::Layout,
            StrategyArg::Vision => StrategyKind::Vision,
        }
    }
}

/// `<config dir>/formlens/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("formlens")
        .join("config.json")
}

/// Explicit path first, then the default file when it exists, then defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<FormlensConfig> {
    if let Some(path) = config_path {
        return Ok(FormlensConfig::from_file(Path::new(path))?);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Loading config from {}", default_path.display());
        Ok(FormlensConfig::from_file(&default_path)?)
    } else {
        Ok(FormlensConfig::default())
    }
}

/// Token cancelled on Ctrl-C.
pub fn cancel_on_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling extraction");
            child.cancel();
        }
    });
    token
}
