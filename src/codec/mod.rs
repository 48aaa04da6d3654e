//! Serialization of a batch index into the metadata object.
//!
//! The index is written as a JSON object keyed by the payload key rendered as
//! text, each value `{"file", "offset", "length"}`, then optionally wrapped in
//! a zstd or gzip envelope. Writers and readers must agree on the envelope;
//! decoding checks its magic bytes so a mismatch is reported rather than
//! surfacing as garbled JSON.

use crate::batch::BatchIndex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::io::{self, Read, Write};
use thiserror::Error;

pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{codec} error: {source}")]
    Compression {
        codec: Compression,
        #[source]
        source: io::Error,
    },

    #[error("payload is not in the {expected} envelope")]
    EnvelopeMismatch { expected: Compression },
}

/// Envelope around the JSON index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Zstd,
    Gzip,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => f.write_str("none"),
            Compression::Zstd => f.write_str("zstd"),
            Compression::Gzip => f.write_str("gzip"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexCodec {
    compression: Compression,
    level: i32,
}

impl Default for IndexCodec {
    fn default() -> Self {
        Self::new(Compression::default())
    }
}

impl IndexCodec {
    pub fn new(compression: Compression) -> Self {
        Self {
            compression,
            level: DEFAULT_ZSTD_LEVEL,
        }
    }

    /// Compression level, only used by zstd.
    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn encode<K>(&self, index: &BatchIndex<K>) -> Result<Vec<u8>, CodecError>
    where
        K: Serialize + Eq + Hash,
    {
        let json = serde_json::to_vec(index)?;

        match self.compression {
            Compression::None => Ok(json),
            Compression::Zstd => zstd::encode_all(&json[..], self.level).map_err(|source| {
                CodecError::Compression {
                    codec: Compression::Zstd,
                    source,
                }
            }),
            Compression::Gzip => {
                let mut encoder =
                    flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder
                    .write_all(&json)
                    .and_then(|_| encoder.finish())
                    .map_err(|source| CodecError::Compression {
                        codec: Compression::Gzip,
                        source,
                    })
            }
        }
    }

    pub fn decode<K>(&self, bytes: &[u8]) -> Result<BatchIndex<K>, CodecError>
    where
        K: DeserializeOwned + Eq + Hash,
    {
        let json = match self.compression {
            Compression::None => {
                if bytes.starts_with(&ZSTD_MAGIC) || bytes.starts_with(&GZIP_MAGIC) {
                    return Err(CodecError::EnvelopeMismatch {
                        expected: Compression::None,
                    });
                }
                bytes.to_vec()
            }
            Compression::Zstd => {
                if !bytes.starts_with(&ZSTD_MAGIC) {
                    return Err(CodecError::EnvelopeMismatch {
                        expected: Compression::Zstd,
                    });
                }
                zstd::decode_all(bytes).map_err(|source| CodecError::Compression {
                    codec: Compression::Zstd,
                    source,
                })?
            }
            Compression::Gzip => {
                if !bytes.starts_with(&GZIP_MAGIC) {
                    return Err(CodecError::EnvelopeMismatch {
                        expected: Compression::Gzip,
                    });
                }
                let mut decoded = Vec::new();
                flate2::read::GzDecoder::new(bytes)
                    .read_to_end(&mut decoded)
                    .map_err(|source| CodecError::Compression {
                        codec: Compression::Gzip,
                        source,
                    })?;
                decoded
            }
        };

        Ok(serde_json::from_slice(&json)?)
    }
}
