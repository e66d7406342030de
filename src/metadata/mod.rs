//! Derived-metadata cache.
//!
//! Two independent, time-expiring caches of table metadata — columns and
//! partitions — keyed by fully-qualified table name. A miss issues a
//! synthetic introspection query (`SHOW COLUMNS FROM ...`,
//! `SHOW PARTITIONS FROM ...`) through the bounded query driver under a
//! short budget, transforms the raw pages into typed records, and populates
//! the entry. Concurrent lookups for the same table coalesce onto one load.

mod cache;
mod types;

pub use cache::{MetadataCache, MetadataError, MetadataResult};
pub use types::{fqn, ColumnRecord, PartitionRecord};
