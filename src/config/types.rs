use crate::batch::{BufferKind, Tags};
use crate::codec::{Compression, IndexCodec, DEFAULT_ZSTD_LEVEL};
use crate::store::client::{DEFAULT_MULTIPART_THRESHOLD, DEFAULT_PART_SIZE};
use crate::store::{BackendConfig, ClientOptions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: BackendConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Tags applied to every batch opened by the CLI.
    #[serde(default)]
    pub tags: Tags,
}

impl Config {
    pub fn client_options(&self) -> ClientOptions {
        let buffer = match self.batch.buffer {
            BufferType::File => BufferKind::File {
                dir: self.batch.temp_dir.clone(),
            },
            BufferType::Memory => BufferKind::Memory,
        };

        ClientOptions {
            buffer,
            codec: IndexCodec::new(self.metadata.compression).with_level(self.metadata.level),
            multipart_threshold: self.batch.multipart_threshold,
            part_size: DEFAULT_PART_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub buffer: BufferType,
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
    #[serde(default = "default_multipart_threshold", with = "byte_size")]
    pub multipart_threshold: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            buffer: BufferType::default(),
            temp_dir: None,
            multipart_threshold: default_multipart_threshold(),
        }
    }
}

fn default_multipart_threshold() -> u64 {
    DEFAULT_MULTIPART_THRESHOLD
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferType {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "default_metadata_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default = "default_level")]
    pub level: i32,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            enabled: default_metadata_enabled(),
            compression: Compression::default(),
            level: default_level(),
        }
    }
}

fn default_metadata_enabled() -> bool {
    true
}

fn default_level() -> i32 {
    DEFAULT_ZSTD_LEVEL
}

// Sizes as plain byte counts or with a KiB/MiB/GiB (or KB/MB/GB) suffix
mod byte_size {
    use serde::{self, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bytes(u64),
        Text(String),
    }

    pub fn serialize<S>(bytes: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_size(*bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Bytes(n) => Ok(n),
            Raw::Text(s) => parse_size(&s).map_err(serde::de::Error::custom),
        }
    }

    pub(super) fn parse_size(s: &str) -> Result<u64, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty size string".to_string());
        }

        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (value_str, unit) = s.split_at(split);

        let value: u64 = value_str
            .parse()
            .map_err(|_| format!("invalid numeric value: {}", s))?;

        let multiplier: u64 = match unit.trim() {
            "" | "B" => 1,
            "KiB" => 1 << 10,
            "MiB" => 1 << 20,
            "GiB" => 1 << 30,
            "KB" => 1_000,
            "MB" => 1_000_000,
            "GB" => 1_000_000_000,
            other => return Err(format!("unknown size unit: {}", other)),
        };

        value
            .checked_mul(multiplier)
            .ok_or_else(|| format!("size too large: {}", s))
    }

    pub(super) fn format_size(bytes: u64) -> String {
        const UNITS: [(u64, &str); 3] = [(1 << 30, "GiB"), (1 << 20, "MiB"), (1 << 10, "KiB")];
        for (size, unit) in UNITS {
            if bytes >= size && bytes % size == 0 {
                return format!("{}{}", bytes / size, unit);
            }
        }
        bytes.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::byte_size::{format_size, parse_size};
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("16MiB").unwrap(), 16 * 1024 * 1024);
        assert_eq!(parse_size("512 KiB").unwrap(), 512 * 1024);
        assert_eq!(parse_size("2GB").unwrap(), 2_000_000_000);
        assert!(parse_size("").is_err());
        assert!(parse_size("MiB").is_err());
        assert!(parse_size("3 parsecs").is_err());
        assert!(parse_size("99999999999999GiB").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(16 * 1024 * 1024), "16MiB");
        assert_eq!(format_size(3 << 30), "3GiB");
        assert_eq!(format_size(1000), "1000");
    }

    #[test]
    fn test_defaults() {
        let config: Config = serde_yaml::from_str("store:\n  type: memory\n").unwrap();
        assert_eq!(config.batch.buffer, BufferType::File);
        assert_eq!(config.batch.multipart_threshold, DEFAULT_MULTIPART_THRESHOLD);
        assert!(config.metadata.enabled);
        assert_eq!(config.metadata.compression, Compression::Zstd);
        assert!(config.tags.is_empty());

        let options = config.client_options();
        assert_eq!(options.buffer, BufferKind::File { dir: None });
        assert_eq!(options.codec.compression(), Compression::Zstd);
    }

    #[test]
    fn test_client_options_from_config() {
        let yaml = r#"
store:
  type: memory
batch:
  buffer: memory
  multipart_threshold: 1MiB
metadata:
  compression: gzip
tags:
  retention-days: "14"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let options = config.client_options();

        assert_eq!(options.buffer, BufferKind::Memory);
        assert_eq!(options.multipart_threshold, 1 << 20);
        assert_eq!(options.codec.compression(), Compression::Gzip);
        assert_eq!(config.tags.get("retention-days").map(String::as_str), Some("14"));
    }
}
