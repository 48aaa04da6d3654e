use super::buffer::{Backing, BufferKind};
use super::naming::ObjectName;
use super::Tags;
use crate::error::{BatchError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;
use std::io::{self, Read, Seek};
use std::time::Duration;

/// Where one payload lives inside one batch object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationRecord {
    #[serde(rename = "file", alias = "objectName")]
    pub object_name: String,
    pub offset: u64,
    pub length: u64,
}

/// Key to location mapping of a batch.
pub type BatchIndex<K> = HashMap<K, LocationRecord>;

/// A batch object being assembled locally.
///
/// Payloads are appended back to back into a local buffer (a temp file by
/// default) and their positions recorded in the index. Once sealed the batch
/// accepts no more appends and its buffer can be read from the start for
/// upload.
///
/// Not synchronized: `append` takes `&mut self`, so callers sharing a batch
/// across tasks must wrap it in their own lock.
///
/// The local buffer is released by [`BatchFile::close`] or, failing that, when
/// the batch is dropped.
#[derive(Debug)]
pub struct BatchFile<K> {
    name: ObjectName,
    tags: Tags,
    created_at: DateTime<Utc>,
    buffer: Option<Backing>,
    sealed: bool,
    item_count: u64,
    write_cursor: u64,
    index: BatchIndex<K>,
}

impl<K: Eq + Hash> BatchFile<K> {
    /// Open an empty batch spilling to a temp file in the system temp dir.
    pub fn open(tags: Tags) -> Result<Self> {
        Self::open_with(tags, &BufferKind::default())
    }

    pub fn open_with(tags: Tags, buffer: &BufferKind) -> Result<Self> {
        let created_at = Utc::now();
        let name = ObjectName::generate_at(created_at);

        let backing = Backing::create(buffer).map_err(|source| BatchError::Create {
            name: name.to_string(),
            source,
        })?;

        tracing::debug!(object = %name, ?buffer, "Opened batch");

        Ok(Self {
            name,
            tags,
            created_at,
            buffer: Some(backing),
            sealed: false,
            item_count: 0,
            write_cursor: 0,
            index: HashMap::new(),
        })
    }

    /// Append `payload` under `key` and return where it landed.
    ///
    /// Re-using a key points its index entry at the new bytes; the old bytes
    /// stay in the batch unreferenced. On failure nothing is recorded and the
    /// write cursor does not move.
    pub fn append(&mut self, key: K, payload: &[u8]) -> Result<LocationRecord> {
        let length = payload.len() as u64;

        if self.sealed {
            return Err(BatchError::Sealed {
                name: self.name.to_string(),
            });
        }

        let buffer = self.buffer.as_mut().ok_or_else(|| BatchError::Released {
            name: self.name.to_string(),
        })?;

        buffer
            .write_at(self.write_cursor, payload)
            .map_err(|(written, source)| BatchError::Write {
                name: self.name.to_string(),
                length,
                written,
                source,
            })?;

        let record = LocationRecord {
            object_name: self.name.to_string(),
            offset: self.write_cursor,
            length,
        };
        self.index.insert(key, record.clone());
        self.write_cursor += length;
        self.item_count += 1;

        Ok(record)
    }

    /// Stop accepting appends and return a reader over the batch bytes.
    ///
    /// Sealing twice is an error.
    pub fn seal(&mut self) -> Result<SealedReader<'_>> {
        if self.sealed {
            return Err(BatchError::Sealed {
                name: self.name.to_string(),
            });
        }

        let len = self.write_cursor;
        let buffer = self.buffer.as_mut().ok_or_else(|| BatchError::Released {
            name: self.name.to_string(),
        })?;
        buffer
            .truncate_and_rewind(len)
            .map_err(|source| BatchError::Rewind {
                name: self.name.to_string(),
                bytes: len,
                source,
            })?;

        self.sealed = true;
        tracing::debug!(
            object = %self.name,
            items = self.item_count,
            bytes = len,
            "Sealed batch"
        );

        Ok(SealedReader {
            name: &self.name,
            buffer,
            len,
            position: 0,
        })
    }

    /// Reader over an already sealed batch, starting again from byte 0.
    pub fn sealed_reader(&mut self) -> Result<SealedReader<'_>> {
        if !self.sealed {
            return Err(BatchError::NotSealed {
                name: self.name.to_string(),
            });
        }

        let len = self.write_cursor;
        let buffer = self.buffer.as_mut().ok_or_else(|| BatchError::Released {
            name: self.name.to_string(),
        })?;
        buffer.rewind().map_err(|source| BatchError::Rewind {
            name: self.name.to_string(),
            bytes: len,
            source,
        })?;

        Ok(SealedReader {
            name: &self.name,
            buffer,
            len,
            position: 0,
        })
    }

    /// Release the local buffer. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(buffer) = self.buffer.take() {
            buffer.release().map_err(|source| BatchError::Release {
                name: self.name.to_string(),
                source,
            })?;
            tracing::debug!(object = %self.name, "Released batch buffer");
        }
        Ok(())
    }

    pub fn name(&self) -> &ObjectName {
        &self.name
    }

    pub fn metadata_name(&self) -> String {
        self.name.metadata_name()
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time since the batch was opened.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.created_at).to_std().unwrap_or_default()
    }

    /// Successful appends, counting re-used keys every time.
    pub fn item_count(&self) -> u64 {
        self.item_count
    }

    /// Bytes appended so far, which is also the next write offset.
    pub fn total_bytes(&self) -> u64 {
        self.write_cursor
    }

    pub fn indexes(&self) -> &BatchIndex<K> {
        &self.index
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn is_released(&self) -> bool {
        self.buffer.is_none()
    }
}

/// Read handle over a sealed batch, from byte 0 to the last appended byte.
pub struct SealedReader<'a> {
    name: &'a ObjectName,
    buffer: &'a mut Backing,
    len: u64,
    position: u64,
}

impl SealedReader<'_> {
    pub fn name(&self) -> &ObjectName {
        self.name
    }

    /// Total bytes in the sealed batch.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes read so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read up to `max` bytes, returning an empty vec at the end.
    pub fn read_chunk(&mut self, max: usize) -> Result<Vec<u8>> {
        let mut chunk = Vec::with_capacity(max.min(self.len.saturating_sub(self.position) as usize));
        let name = self.name;
        let position = self.position;
        let result = self.by_ref().take(max as u64).read_to_end(&mut chunk);
        result.map_err(|source| BatchError::Read {
            name: name.to_string(),
            position,
            source,
        })?;
        Ok(chunk)
    }

    /// Read the remaining bytes into memory.
    pub fn read_remaining(&mut self) -> Result<Vec<u8>> {
        let remaining = self.len.saturating_sub(self.position);
        self.read_chunk(remaining as usize)
    }

    /// Async form of [`SealedReader::read_chunk`]; temp file reads run on the
    /// blocking pool.
    pub async fn read_chunk_async(&mut self, max: usize) -> Result<Vec<u8>> {
        let want = max.min(self.len.saturating_sub(self.position) as usize);
        if want == 0 {
            return Ok(Vec::new());
        }

        let chunk = self
            .buffer
            .read_next(want)
            .await
            .map_err(|source| BatchError::Read {
                name: self.name.to_string(),
                position: self.position,
                source,
            })?;
        self.position += chunk.len() as u64;
        Ok(chunk)
    }

    pub async fn read_remaining_async(&mut self) -> Result<Vec<u8>> {
        let remaining = self.len.saturating_sub(self.position);
        self.read_chunk_async(remaining as usize).await
    }
}

impl Read for SealedReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.len.saturating_sub(self.position);
        if remaining == 0 {
            return Ok(0);
        }
        let max = buf.len().min(remaining as usize);
        let n = self.buffer.read(&mut buf[..max])?;
        self.position += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_memory() -> BatchFile<String> {
        BatchFile::open_with(Tags::new(), &BufferKind::Memory).unwrap()
    }

    fn read_sealed(file: &mut BatchFile<String>) -> Vec<u8> {
        let mut out = Vec::new();
        file.seal().unwrap().read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_failed_append_records_nothing() {
        let mut file = open_memory();
        file.buffer = Some(Backing::Capped {
            cursor: io::Cursor::new(Vec::new()),
            capacity: 20,
        });

        file.append("a".to_string(), &[b'a'; 17]).unwrap();
        let err = file.append("b".to_string(), &[b'b'; 23]).unwrap_err();
        match err {
            BatchError::Write {
                length, written, ..
            } => assert_eq!((length, written), (23, 3)),
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(file.total_bytes(), 17);
        assert_eq!(file.item_count(), 1);
        assert!(!file.indexes().contains_key("b"));

        if let Some(Backing::Capped { capacity, .. }) = file.buffer.as_mut() {
            *capacity = 100;
        }
        let record = file.append("c".to_string(), b"0123456789").unwrap();
        assert_eq!((record.offset, record.length), (17, 10));

        let mut expected = vec![b'a'; 17];
        expected.extend_from_slice(b"0123456789");
        assert_eq!(read_sealed(&mut file), expected);
    }

    #[tokio::test]
    async fn test_async_reads_match_sync_reads() {
        let mut file: BatchFile<String> = BatchFile::open(Tags::new()).unwrap();
        file.append("a".to_string(), b"hello ").unwrap();
        file.append("b".to_string(), b"world").unwrap();

        let mut reader = file.seal().unwrap();
        assert_eq!(reader.read_chunk_async(4).await.unwrap(), b"hell");
        assert_eq!(reader.position(), 4);
        assert_eq!(reader.read_remaining_async().await.unwrap(), b"o world");
        assert!(reader.read_chunk_async(4).await.unwrap().is_empty());
    }

    #[test]
    fn test_offsets_are_prefix_sums() {
        for kind in [BufferKind::Memory, BufferKind::default()] {
            let mut file: BatchFile<u64> = BatchFile::open_with(Tags::new(), &kind).unwrap();
            let lengths = [17usize, 23, 0, 1, 4096, 5];

            let mut expected_offset = 0u64;
            for (i, len) in lengths.iter().enumerate() {
                let record = file.append(i as u64, &vec![i as u8; *len]).unwrap();
                assert_eq!(record.offset, expected_offset);
                assert_eq!(record.length, *len as u64);
                assert_eq!(record.object_name, file.name().as_str());
                expected_offset += *len as u64;
            }

            assert_eq!(file.total_bytes(), lengths.iter().sum::<usize>() as u64);
            assert_eq!(file.item_count(), lengths.len() as u64);
            assert_eq!(file.indexes().len(), lengths.len());
            file.close().unwrap();
        }
    }

    #[test]
    fn test_two_payload_scenario() {
        let mut file = open_memory();
        let a = vec![b'a'; 17];
        let b = vec![b'b'; 23];

        let ra = file.append("a".to_string(), &a).unwrap();
        let rb = file.append("b".to_string(), &b).unwrap();

        assert_eq!((ra.offset, ra.length), (0, 17));
        assert_eq!((rb.offset, rb.length), (17, 23));

        let bytes = read_sealed(&mut file);
        assert_eq!(bytes.len(), 40);
        assert_eq!(&bytes[0..17], &a[..]);
        assert_eq!(&bytes[17..40], &b[..]);
    }

    #[test]
    fn test_append_after_seal_fails_without_mutation() {
        let mut file = open_memory();
        file.append("x".to_string(), b"payload").unwrap();
        file.seal().unwrap();

        let before_index = file.indexes().clone();
        let err = file.append("y".to_string(), b"more").unwrap_err();

        assert!(matches!(err, BatchError::Sealed { .. }));
        assert_eq!(err.to_string(), format!("batch {} is sealed", file.name()));
        assert_eq!(file.indexes(), &before_index);
        assert_eq!(file.total_bytes(), 7);
        assert_eq!(file.item_count(), 1);
    }

    #[test]
    fn test_reappend_overwrites_entry_and_keeps_stale_bytes() {
        let mut file = open_memory();
        file.append("k".to_string(), b"first").unwrap();
        file.append("other".to_string(), b"--").unwrap();
        let latest = file.append("k".to_string(), b"second").unwrap();

        assert_eq!(file.indexes().len(), 2);
        assert_eq!(file.item_count(), 3);
        assert_eq!(file.total_bytes(), 13);
        assert_eq!(file.indexes()["k"], latest);
        assert_eq!((latest.offset, latest.length), (7, 6));

        assert_eq!(read_sealed(&mut file), b"first--second");
    }

    #[test]
    fn test_seal_twice_fails() {
        let mut file = open_memory();
        file.seal().unwrap();
        assert!(matches!(file.seal(), Err(BatchError::Sealed { .. })));
    }

    #[test]
    fn test_sealed_reader_rewinds() {
        let mut file = open_memory();
        file.append("a".to_string(), b"abc").unwrap();
        assert_eq!(read_sealed(&mut file), b"abc");

        let mut again = Vec::new();
        file.sealed_reader()
            .unwrap()
            .read_to_end(&mut again)
            .unwrap();
        assert_eq!(again, b"abc");
    }

    #[test]
    fn test_sealed_reader_requires_seal() {
        let mut file = open_memory();
        assert!(matches!(
            file.sealed_reader(),
            Err(BatchError::NotSealed { .. })
        ));
    }

    #[test]
    fn test_read_chunk_walks_the_batch() {
        let mut file = open_memory();
        file.append("a".to_string(), b"0123456789").unwrap();
        let mut reader = file.seal().unwrap();

        assert_eq!(reader.len(), 10);
        assert_eq!(reader.read_chunk(4).unwrap(), b"0123");
        assert_eq!(reader.read_chunk(4).unwrap(), b"4567");
        assert_eq!(reader.read_remaining().unwrap(), b"89");
        assert!(reader.read_chunk(4).unwrap().is_empty());
        assert_eq!(reader.position(), 10);
    }

    #[test]
    fn test_close_is_idempotent_and_blocks_further_use() {
        let mut file: BatchFile<String> = BatchFile::open(Tags::new()).unwrap();
        file.append("a".to_string(), b"abc").unwrap();

        file.close().unwrap();
        file.close().unwrap();
        assert!(file.is_released());

        assert!(matches!(
            file.append("b".to_string(), b"def"),
            Err(BatchError::Released { .. })
        ));
        assert!(matches!(file.seal(), Err(BatchError::Released { .. })));
        assert_eq!(file.item_count(), 1);
    }

    #[test]
    fn test_accessors() {
        let tags = Tags::from([("retention-days".to_string(), "14".to_string())]);
        let file: BatchFile<String> = BatchFile::open_with(tags.clone(), &BufferKind::Memory).unwrap();

        assert_eq!(file.tags(), &tags);
        assert!(file.name().as_str().starts_with("v1/"));
        assert_eq!(file.metadata_name(), format!("{}.meta.json", file.name()));
        assert!(file.age() < Duration::from_secs(60));
        assert_eq!(file.item_count(), 0);
        assert_eq!(file.total_bytes(), 0);
        assert!(file.indexes().is_empty());
        assert!(!file.is_sealed());
    }

    #[test]
    fn test_record_serializes_with_file_field() {
        let record = LocationRecord {
            object_name: "v1/2026/01/01/00/abc".to_string(),
            offset: 17,
            length: 23,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"file":"v1/2026/01/01/00/abc","offset":17,"length":23}"#);

        let aliased: LocationRecord =
            serde_json::from_str(r#"{"objectName":"v1/2026/01/01/00/abc","offset":17,"length":23}"#)
                .unwrap();
        assert_eq!(aliased, record);
    }
}
