use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Which object store batches go to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// S3 or an S3-compatible service. Credentials come from the usual AWS
    /// environment variables.
    S3 {
        bucket: String,
        #[serde(default)]
        region: Option<String>,
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        allow_http: bool,
    },
    /// A directory on the local filesystem.
    Local { root: PathBuf },
    /// Process memory; contents are lost on exit.
    Memory,
}

pub fn build_object_store(
    config: &BackendConfig,
) -> Result<Arc<dyn ObjectStore>, object_store::Error> {
    match config {
        BackendConfig::S3 {
            bucket,
            region,
            endpoint,
            allow_http,
        } => {
            let mut builder = AmazonS3Builder::from_env()
                .with_bucket_name(bucket)
                .with_allow_http(*allow_http);
            if let Some(region) = region {
                builder = builder.with_region(region);
            }
            if let Some(endpoint) = endpoint {
                builder = builder.with_endpoint(endpoint);
            }
            tracing::info!(bucket = %bucket, "Using S3 object store");
            Ok(Arc::new(builder.build()?))
        }
        BackendConfig::Local { root } => {
            std::fs::create_dir_all(root).map_err(|e| object_store::Error::Generic {
                store: "LocalFileSystem",
                source: Box::new(e),
            })?;
            tracing::info!(root = %root.display(), "Using local object store");
            Ok(Arc::new(LocalFileSystem::new_with_prefix(root)?))
        }
        BackendConfig::Memory => {
            tracing::info!("Using in-memory object store");
            Ok(Arc::new(InMemory::new()))
        }
    }
}
