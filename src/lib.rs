//! # Stratus
//!
//! A bounded query driver and expiring metadata cache for remote analytic
//! engines.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              MetadataCache (columns, partitions)         │
//! │  two independent keyed caches, one TTL each; miss path   │
//! │  issues SHOW COLUMNS / SHOW PARTITIONS introspection     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [single-flight loads]
//! ┌─────────────────────────────────────────────────────────┐
//! │          AsyncLoadingCache (background loader)           │
//! │  key → shared in-flight load on an injected runtime,     │
//! │  TTL measured from write time                            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [introspection queries]
//! ┌─────────────────────────────────────────────────────────┐
//! │            QueryDriver (bounded polling loop)            │
//! │  one session per invocation, per-step projection,        │
//! │  hard wall-clock budget, cooperative cancellation        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │       SessionFactory / QuerySession (remote engine)      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The remote engine itself is an opaque collaborator: callers supply a
//! [`engine::SessionFactory`] and this crate never inspects its network
//! framing.

pub mod cache;
pub mod config;
pub mod driver;
pub mod engine;
pub mod metadata;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::cache::{AsyncLoadingCache, LoadError};
    pub use crate::config::Settings;
    pub use crate::driver::{DriverError, QueryDriver};
    pub use crate::engine::{
        ColumnDescriptor, EngineError, QuerySession, ResultPage, SessionFactory, SessionHandle,
    };
    pub use crate::metadata::{ColumnRecord, MetadataCache, MetadataError, PartitionRecord};
}
