pub mod config;
pub mod fetch;
pub mod pack;

use crate::config::{load_config, Config, ConfigError};
use crate::error::BatchError;
use crate::store::{build_object_store, ObjectStoreClient};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Key type used by the command line tool: the name of each packed file.
pub type CliKey = String;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(
        "config not found\n\
         Searched locations:\n  \
         ~/.config/batchstore/config.yml\n  \
         /etc/batchstore/config.yml\n\
         \n\
         Use --config <path> to specify a config file, or run 'batchstore config init' to generate one."
    )]
    NoConfig,

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to open object store: {0}")]
    Store(#[from] object_store::Error),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("invalid tag '{0}', expected key=value")]
    InvalidTag(String),

    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file already exists at {0}\nRemove it first or use --stdout to print the config")]
    ConfigExists(PathBuf),

    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Load the config and build a client for its store.
pub fn connect(config_path: Option<&Path>) -> Result<(Config, ObjectStoreClient<CliKey>), CliError> {
    let path = config_path.ok_or(CliError::NoConfig)?;
    info!(config_path = %path.display(), "Loading configuration");

    let config = load_config(path)?;
    let store = build_object_store(&config.store)?;
    let client = ObjectStoreClient::with_options(store, config.client_options());

    Ok((config, client))
}

/// Token cancelled on the first Ctrl+C.
pub fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling");
            child.cancel();
        }
    });
    token
}

/// Parse a `key=value` tag argument.
pub fn parse_tag(arg: &str) -> Result<(String, String), CliError> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(CliError::InvalidTag(arg.to_string())),
    }
}
