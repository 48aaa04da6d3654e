pub mod batch;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod store;

pub use batch::{BatchFile, BatchIndex, BufferKind, LocationRecord, ObjectName, Tags};
pub use codec::{Compression, IndexCodec};
pub use error::{BatchError, Result, UploadPhase};
pub use store::{BatchKey, BatchStore, ClientOptions, ObjectStoreClient};
