use super::{connect, CliError, CliKey};
use crate::batch::{LocationRecord, ObjectName};
use crate::store::BatchStore;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Serialize)]
struct IndexEntry {
    key: CliKey,
    #[serde(flatten)]
    record: LocationRecord,
}

pub async fn fetch(
    config_path: Option<&Path>,
    object: &str,
    offset: u64,
    length: u64,
    out: Option<&PathBuf>,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let (_config, client) = connect(config_path)?;

    let record = LocationRecord {
        object_name: object.to_string(),
        offset,
        length,
    };
    let bytes = client.fetch(&record, cancel).await?;

    match out {
        Some(path) => {
            tokio::fs::write(path, &bytes)
                .await
                .map_err(|source| CliError::File {
                    path: path.clone(),
                    source,
                })?;
            info!(object, bytes = bytes.len(), out = %path.display(), "Wrote payload");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }

    Ok(())
}

pub async fn index(
    config_path: Option<&Path>,
    object: &str,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let (_config, client) = connect(config_path)?;

    let index = client.fetch_index(&ObjectName::from(object), cancel).await?;

    // Listed in data object order
    let mut listing: Vec<IndexEntry> = index
        .into_iter()
        .map(|(key, record)| IndexEntry { key, record })
        .collect();
    listing.sort_by_key(|entry| entry.record.offset);

    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}

pub async fn delete(
    config_path: Option<&Path>,
    object: &str,
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    let (_config, client) = connect(config_path)?;

    let name = ObjectName::from(object);
    client.delete_objects(&name, cancel).await?;
    info!(object = %name, "Deleted batch");

    Ok(())
}
