//! Batch store backed by any `object_store::ObjectStore`.
//!
//! ## Upload
//!
//! ```text
//! upload(file, with_metadata)
//!     ↓
//! encode index            ← only with metadata
//!     ↓
//! seal / rewind buffer
//!     ↓
//! put data object         ← single PUT, or multipart above the threshold
//!     ↓
//! put metadata object     ← only with metadata
//! ```
//!
//! Both objects carry the batch tags. A failure in either phase is reported
//! with the phase and object name; a metadata failure leaves the data object
//! in place.

use super::range::ByteRange;
use super::tags::tag_set;
use super::{BatchKey, BatchStore};
use crate::batch::{BatchFile, BatchIndex, BufferKind, LocationRecord, ObjectName, SealedReader, Tags};
use crate::codec::IndexCodec;
use crate::error::{BatchError, Result, UploadPhase};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Future, StreamExt};
use object_store::path::Path;
use object_store::{
    ObjectStore, PutMultipartOptions, PutOptions, PutPayload, TagSet, WriteMultipart,
};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Batches above this size are streamed with a multipart upload.
pub const DEFAULT_MULTIPART_THRESHOLD: u64 = 16 * 1024 * 1024;

/// S3 rejects parts under 5 MiB except the last one.
pub const DEFAULT_PART_SIZE: usize = 5 * 1024 * 1024;

const MAX_CONCURRENT_PARTS: usize = 4;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Buffer used by batches opened through the client.
    pub buffer: BufferKind,
    /// Codec for metadata objects, on both upload and `fetch_index`.
    pub codec: IndexCodec,
    pub multipart_threshold: u64,
    pub part_size: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            buffer: BufferKind::default(),
            codec: IndexCodec::default(),
            multipart_threshold: DEFAULT_MULTIPART_THRESHOLD,
            part_size: DEFAULT_PART_SIZE,
        }
    }
}

pub struct ObjectStoreClient<K> {
    store: Arc<dyn ObjectStore>,
    options: ClientOptions,
    _key: PhantomData<fn() -> K>,
}

impl<K> ObjectStoreClient<K> {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_options(store, ClientOptions::default())
    }

    pub fn with_options(store: Arc<dyn ObjectStore>, options: ClientOptions) -> Self {
        Self {
            store,
            options,
            _key: PhantomData,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    async fn put_object(
        &self,
        phase: UploadPhase,
        path: &Path,
        body: PutPayload,
        tags: TagSet,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let opts = PutOptions {
            tags,
            ..Default::default()
        };
        tracing::debug!(object = %path, phase = %phase, "Putting object");

        cancellable(cancel, "upload", async {
            self.store
                .put_opts(path, body, opts)
                .await
                .map(|_| ())
                .map_err(|source| BatchError::Upload {
                    phase,
                    object: path.to_string(),
                    source,
                })
        })
        .await
    }

    async fn put_multipart(
        &self,
        path: &Path,
        reader: &mut SealedReader<'_>,
        tags: TagSet,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let upload_err = |source: object_store::Error| BatchError::Upload {
            phase: UploadPhase::Data,
            object: path.to_string(),
            source,
        };

        let opts = PutMultipartOptions {
            tags,
            ..Default::default()
        };
        let upload = cancellable(cancel, "upload", async {
            self.store
                .put_multipart_opts(path, opts)
                .await
                .map_err(upload_err)
        })
        .await?;
        let mut writer = WriteMultipart::new_with_chunk_size(upload, self.options.part_size);

        let parts = self.write_parts(&mut writer, reader, path);
        let written = match cancellable(cancel, "upload", parts).await {
            Ok(()) if cancel.is_cancelled() => Err(BatchError::Cancelled { operation: "upload" }),
            other => other,
        };
        if let Err(e) = written {
            if let Err(abort_err) = writer.abort().await {
                tracing::warn!(
                    object = %path,
                    error = %abort_err,
                    "Failed to abort multipart upload"
                );
            }
            return Err(e);
        }

        // Every full part is stored at this point; completion is not interrupted
        writer.finish().await.map(|_| ()).map_err(upload_err)
    }

    async fn write_parts(
        &self,
        writer: &mut WriteMultipart,
        reader: &mut SealedReader<'_>,
        path: &Path,
    ) -> Result<()> {
        let upload_err = |source: object_store::Error| BatchError::Upload {
            phase: UploadPhase::Data,
            object: path.to_string(),
            source,
        };

        loop {
            let chunk = reader.read_chunk_async(self.options.part_size).await?;
            if chunk.is_empty() {
                break;
            }
            writer
                .wait_for_capacity(MAX_CONCURRENT_PARTS)
                .await
                .map_err(upload_err)?;
            writer.write(&chunk);
        }

        writer.wait_for_capacity(0).await.map_err(upload_err)
    }
}

#[async_trait]
impl<K: BatchKey> BatchStore<K> for ObjectStoreClient<K> {
    fn new_batch(&self, tags: Tags) -> Result<BatchFile<K>> {
        BatchFile::open_with(tags, &self.options.buffer)
    }

    async fn upload(
        &self,
        file: &mut BatchFile<K>,
        with_metadata: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let object = file.name().clone();
        let tags = tag_set(file.tags());
        let items = file.item_count();

        let metadata = if with_metadata {
            let body = self
                .options
                .codec
                .encode(file.indexes())
                .map_err(|source| BatchError::Encode {
                    object: object.metadata_name(),
                    source,
                })?;
            Some(body)
        } else {
            None
        };

        let mut reader = if file.is_sealed() {
            file.sealed_reader()?
        } else {
            file.seal()?
        };
        let bytes = reader.len();
        let data_path = Path::from(object.as_str());

        if bytes > self.options.multipart_threshold {
            tracing::debug!(object = %object, bytes, "Uploading batch as multipart");
            self.put_multipart(&data_path, &mut reader, tags.clone(), cancel)
                .await?;
        } else {
            let body = reader.read_remaining_async().await?;
            self.put_object(UploadPhase::Data, &data_path, body.into(), tags.clone(), cancel)
                .await?;
        }

        if let Some(body) = metadata {
            let meta_path = Path::from(object.metadata_name());
            self.put_object(UploadPhase::Metadata, &meta_path, body.into(), tags, cancel)
                .await?;
        }

        tracing::info!(
            object = %object,
            items,
            bytes,
            metadata = with_metadata,
            "Uploaded batch"
        );
        Ok(())
    }

    async fn delete_objects(&self, object: &ObjectName, cancel: &CancellationToken) -> Result<()> {
        let names = vec![object.to_string(), object.metadata_name()];
        let locations = names
            .iter()
            .map(|name| Ok::<_, object_store::Error>(Path::from(name.as_str())))
            .collect::<Vec<_>>();

        cancellable(cancel, "delete", async {
            let mut results = self
                .store
                .delete_stream(futures::stream::iter(locations).boxed());
            while let Some(result) = results.next().await {
                match result {
                    Ok(_) | Err(object_store::Error::NotFound { .. }) => {}
                    Err(source) => {
                        return Err(BatchError::Delete {
                            objects: names.clone(),
                            source,
                        })
                    }
                }
            }
            Ok(())
        })
        .await?;

        tracing::info!(object = %object, "Deleted batch objects");
        Ok(())
    }

    async fn fetch(&self, record: &LocationRecord, cancel: &CancellationToken) -> Result<Bytes> {
        let range = ByteRange::for_record(record).ok_or_else(|| BatchError::InvalidRange {
            object: record.object_name.clone(),
            offset: record.offset,
            length: record.length,
        })?;
        let path = Path::from(record.object_name.as_str());
        let fetch_err = |source: object_store::Error| BatchError::Fetch {
            object: record.object_name.clone(),
            range: range.to_string(),
            source,
        };

        tracing::debug!(object = %record.object_name, range = %range, "Fetching payload");

        // No valid range header exists for zero bytes; just confirm the object is there.
        if range.is_empty() {
            return cancellable(cancel, "fetch", async {
                self.store
                    .head(&path)
                    .await
                    .map(|_| Bytes::new())
                    .map_err(fetch_err)
            })
            .await;
        }

        let data = cancellable(cancel, "fetch", async {
            self.store
                .get_range(&path, range.as_range())
                .await
                .map_err(fetch_err)
        })
        .await?;

        if data.len() as u64 != record.length {
            return Err(BatchError::ShortRead {
                object: record.object_name.clone(),
                range: range.to_string(),
                expected: record.length,
                actual: data.len() as u64,
            });
        }

        Ok(data)
    }

    async fn fetch_index(
        &self,
        object: &ObjectName,
        cancel: &CancellationToken,
    ) -> Result<BatchIndex<K>> {
        let meta_name = object.metadata_name();
        let path = Path::from(meta_name.as_str());

        let fetch_err = |source: object_store::Error| BatchError::Fetch {
            object: meta_name.clone(),
            range: "(whole object)".to_string(),
            source,
        };

        let body = cancellable(cancel, "fetch", async {
            let result = self.store.get(&path).await.map_err(fetch_err)?;
            result.bytes().await.map_err(fetch_err)
        })
        .await?;

        self.options
            .codec
            .decode(&body)
            .map_err(|source| BatchError::Decode {
                object: meta_name,
                source,
            })
    }
}

/// Race `fut` against `cancel`, dropping the request if the token fires first.
async fn cancellable<T, F>(cancel: &CancellationToken, operation: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BatchError::Cancelled { operation }),
        out = fut => out,
    }
}
