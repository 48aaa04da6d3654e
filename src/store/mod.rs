pub mod backend;
pub mod client;
pub mod range;
pub mod tags;

use crate::batch::{BatchFile, BatchIndex, LocationRecord, ObjectName, Tags};
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::hash::Hash;
use tokio_util::sync::CancellationToken;

pub use backend::{build_object_store, BackendConfig};
pub use client::{ClientOptions, ObjectStoreClient};
pub use range::ByteRange;
pub use tags::{encode_tags, tag_set};

/// Types usable as payload keys inside a batch.
///
/// Keys must serialize as JSON map keys (strings, integers, chars).
pub trait BatchKey: Serialize + DeserializeOwned + Eq + Hash + Send + Sync + 'static {}

impl<T> BatchKey for T where T: Serialize + DeserializeOwned + Eq + Hash + Send + Sync + 'static {}

/// Moves batches to and from a remote object store.
///
/// Every remote call takes a cancellation token; cancelling it drops the
/// in-flight request and the call returns `BatchError::Cancelled`. Nothing is
/// retried here.
#[async_trait]
pub trait BatchStore<K: BatchKey>: Send + Sync {
    /// Open an empty batch configured for this store.
    fn new_batch(&self, tags: Tags) -> Result<BatchFile<K>>;

    /// Upload the batch as one object, and its index as a second one when
    /// `with_metadata` is set. A batch that is still writable is sealed first.
    ///
    /// The data object is written first; if the metadata write then fails the
    /// data object is left in place. Use [`BatchStore::delete`] to roll back.
    async fn upload(
        &self,
        file: &mut BatchFile<K>,
        with_metadata: bool,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Delete the data and metadata objects named after `object` in one
    /// batched request. Missing objects are not an error.
    async fn delete_objects(&self, object: &ObjectName, cancel: &CancellationToken) -> Result<()>;

    async fn delete(&self, file: &BatchFile<K>, cancel: &CancellationToken) -> Result<()> {
        self.delete_objects(file.name(), cancel).await
    }

    /// Read exactly the bytes `record` points at with one range request.
    /// The bytes are returned as stored.
    async fn fetch(&self, record: &LocationRecord, cancel: &CancellationToken) -> Result<Bytes>;

    /// Download and decode the metadata object of `object`.
    async fn fetch_index(
        &self,
        object: &ObjectName,
        cancel: &CancellationToken,
    ) -> Result<BatchIndex<K>>;
}
