use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Leading path segment of every object name. Bump it when the layout changes
/// so that readers of old objects keep working.
pub const NAME_VERSION: &str = "v1";

/// Appended to a batch object name to get its metadata object name.
pub const METADATA_SUFFIX: &str = ".meta.json";

/// Name of a batch object in the remote store.
///
/// Shaped as `v1/<yyyy>/<mm>/<dd>/<hh>/<id>`: the hour bucket is UTC, and the
/// id is a UUIDv7 in simple (hex) form, so names sort by creation time and
/// everything created in the same hour shares one listing prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectName(String);

impl ObjectName {
    pub fn generate() -> Self {
        Self::generate_at(Utc::now())
    }

    /// Generate a name bucketed under `created_at`.
    pub fn generate_at(created_at: DateTime<Utc>) -> Self {
        let id = Uuid::now_v7();
        Self(format!(
            "{}/{}/{}",
            NAME_VERSION,
            hour_bucket(created_at),
            id.simple()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Everything before the unique suffix, including the trailing slash.
    pub fn prefix(&self) -> &str {
        match self.0.rfind('/') {
            Some(pos) => &self.0[..=pos],
            None => "",
        }
    }

    pub fn metadata_name(&self) -> String {
        format!("{}{}", self.0, METADATA_SUFFIX)
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ObjectName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for ObjectName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// `yyyy/mm/dd/hh` in UTC.
pub fn hour_bucket(t: DateTime<Utc>) -> String {
    t.format("%Y/%m/%d/%H").to_string()
}
