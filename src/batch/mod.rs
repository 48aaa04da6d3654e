pub mod buffer;
pub mod file;
pub mod naming;

use std::collections::BTreeMap;

pub use buffer::BufferKind;
pub use file::{BatchFile, BatchIndex, LocationRecord, SealedReader};
pub use naming::{ObjectName, METADATA_SUFFIX, NAME_VERSION};

/// Object tags attached to a batch in the remote store. Kept sorted.
pub type Tags = BTreeMap<String, String>;
