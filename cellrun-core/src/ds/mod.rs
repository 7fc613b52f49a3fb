pub mod config;
pub mod discovery;
pub mod guard;
pub mod manifest;
pub mod partition;
pub mod prepare;

pub use config::{Channel, ChannelConfig, ChannelRole, DatasetConfig};
pub use discovery::{DatasetIter, DatasetRecord, Discovery};
pub use guard::{GuardedDataset, Verdict, inspect};
pub use manifest::{Manifest, ManifestEntry};
pub use partition::Partition;
