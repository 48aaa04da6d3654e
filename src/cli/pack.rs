use super::{connect, parse_tag, CliError, CliKey};
use crate::batch::{BatchIndex, ObjectName};
use crate::config::validate_tags;
use crate::store::BatchStore;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// What `batchstore pack` prints once the batch is stored.
#[derive(Debug, Serialize)]
pub struct PackSummary {
    pub object: ObjectName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    pub total_bytes: u64,
    pub items: BatchIndex<CliKey>,
}

pub async fn run(
    config_path: Option<&Path>,
    files: &[PathBuf],
    tags: &[String],
    no_metadata: bool,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let (config, client) = connect(config_path)?;

    let mut batch_tags = config.tags.clone();
    for tag in tags {
        let (key, value) = parse_tag(tag)?;
        batch_tags.insert(key, value);
    }
    validate_tags(&batch_tags)?;

    let with_metadata = config.metadata.enabled && !no_metadata;
    let summary = pack_files(&client, files, batch_tags, with_metadata, cancel).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Append every file to one batch, keyed by its path as given, and upload it.
pub async fn pack_files<S>(
    store: &S,
    files: &[PathBuf],
    tags: crate::batch::Tags,
    with_metadata: bool,
    cancel: &CancellationToken,
) -> Result<PackSummary, CliError>
where
    S: BatchStore<CliKey>,
{
    let mut batch = store.new_batch(tags)?;

    let result = async {
        for path in files {
            let payload = tokio::fs::read(path).await.map_err(|source| CliError::File {
                path: path.clone(),
                source,
            })?;
            let record = batch.append(path.display().to_string(), &payload)?;
            info!(
                file = %path.display(),
                offset = record.offset,
                length = record.length,
                "Appended file"
            );
        }

        store.upload(&mut batch, with_metadata, cancel).await?;
        Ok::<_, CliError>(())
    }
    .await;

    let summary = PackSummary {
        object: batch.name().clone(),
        metadata: with_metadata.then(|| batch.metadata_name()),
        total_bytes: batch.total_bytes(),
        items: batch.indexes().clone(),
    };

    if let Err(e) = batch.close() {
        warn!(batch = %batch.name(), error = %e, "Failed to release batch buffer");
    }

    result.map(|()| summary)
}
