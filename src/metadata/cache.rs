//! The column/partition cache implementation.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::cache::{AsyncLoadingCache, BoxError, LoadError};
use crate::config::MetadataSettings;
use crate::driver::QueryDriver;
use crate::engine::{ColumnDescriptor, EngineError, SessionFactory};

use super::types::{fqn, ColumnRecord, PartitionRecord};

/// Literal value in the third `SHOW COLUMNS` field marking a partition key.
const PARTITION_KEY_MARKER: &str = "Partition Key";

/// Result type for metadata cache operations.
pub type MetadataResult<T> = Result<T, MetadataError>;

/// Errors surfaced by [`MetadataCache`].
#[derive(Error, Debug, Clone)]
pub enum MetadataError {
    /// The background load for a table failed.
    ///
    /// Introspection timeouts never reach this error: they resolve the entry
    /// to an empty list instead (see the module docs).
    #[error("metadata load for {table} failed")]
    Load {
        /// Fully-qualified table name whose load failed.
        table: String,
        source: LoadError,
    },
}

/// Time-expiring cache of table columns and table partitions.
///
/// The two caches are independent: each has its own TTL and its own key
/// space, and a table's columns and partitions load separately. All
/// dependencies — the session factory, the runtime the loads run on, and
/// the lifetimes — are injected through the constructor.
///
/// # Example
///
/// ```ignore
/// use stratus::config::MetadataSettings;
/// use stratus::metadata::MetadataCache;
///
/// let cache = MetadataCache::new(
///     factory,
///     tokio::runtime::Handle::current(),
///     &MetadataSettings::default(),
/// );
///
/// let columns = cache.get_columns("logs", "events").await?;
/// let partitions = cache.get_partitions("logs", "events").await?;
/// ```
pub struct MetadataCache {
    columns: AsyncLoadingCache<String, Vec<ColumnRecord>>,
    partitions: AsyncLoadingCache<String, Vec<PartitionRecord>>,
}

impl MetadataCache {
    /// Build the two caches over `factory`, spawning loads on `runtime`.
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        runtime: tokio::runtime::Handle,
        settings: &MetadataSettings,
    ) -> Self {
        let query_budget = settings.metadata_query_timeout();

        let columns = AsyncLoadingCache::new(runtime.clone(), settings.column_cache_ttl(), {
            let factory = Arc::clone(&factory);
            move |table: String| load_columns(Arc::clone(&factory), query_budget, table).boxed()
        });

        let partitions = AsyncLoadingCache::new(runtime, settings.partition_cache_ttl(), {
            let factory = Arc::clone(&factory);
            move |table: String| load_partitions(Arc::clone(&factory), query_budget, table).boxed()
        });

        Self {
            columns,
            partitions,
        }
    }

    /// The columns of `database.table`, loading on first access or after
    /// expiration. Awaits the in-flight load if one is already running.
    ///
    /// # Errors
    ///
    /// [`MetadataError::Load`] wrapping the underlying failure for any
    /// non-timeout load failure. A timed-out introspection query yields an
    /// empty list instead.
    pub async fn get_columns(&self, database: &str, table: &str) -> MetadataResult<Arc<Vec<ColumnRecord>>> {
        let key = fqn(database, table);
        self.columns
            .get(key.clone())
            .await
            .map_err(|source| MetadataError::Load { table: key, source })
    }

    /// The partition records of `database.table`. Symmetric with
    /// [`MetadataCache::get_columns`]; an unpartitioned table yields an
    /// empty list.
    pub async fn get_partitions(
        &self,
        database: &str,
        table: &str,
    ) -> MetadataResult<Arc<Vec<PartitionRecord>>> {
        let key = fqn(database, table);
        self.partitions
            .get(key.clone())
            .await
            .map_err(|source| MetadataError::Load { table: key, source })
    }

    /// Drop both cached entries for a table, forcing reloads.
    pub fn invalidate(&self, database: &str, table: &str) {
        let key = fqn(database, table);
        self.columns.invalidate(&key);
        self.partitions.invalidate(&key);
    }
}

/// Load path for `SHOW COLUMNS FROM <table>`.
///
/// Rows are read positionally: column name, declared type, and a third
/// field whose literal value marks partition keys. Nullability is not
/// derivable from this query and is always recorded as false.
async fn load_columns(
    factory: Arc<dyn SessionFactory>,
    budget: Duration,
    table: String,
) -> Result<Vec<ColumnRecord>, BoxError> {
    let query = format!("SHOW COLUMNS FROM {table}");
    let driver = QueryDriver::with_budget(factory, query, budget);

    let mut records = Vec::new();
    let outcome = driver
        .execute_with(&CancellationToken::new(), |session| {
            for row in &session.current().rows {
                records.push(column_from_row(&table, row)?);
            }
            Ok(())
        })
        .await;

    finish_load(&table, outcome, records)
}

/// Load path for `SHOW PARTITIONS FROM <table>`.
///
/// Pages are pivoted column-wise: one record per result column, holding the
/// ordered values observed across all rows. A table with no partition data
/// yields an empty list.
async fn load_partitions(
    factory: Arc<dyn SessionFactory>,
    budget: Duration,
    table: String,
) -> Result<Vec<PartitionRecord>, BoxError> {
    let query = format!("SHOW PARTITIONS FROM {table}");
    let driver = QueryDriver::with_budget(factory, query, budget);

    let mut columns: Vec<ColumnDescriptor> = Vec::new();
    let mut values: Vec<Vec<serde_json::Value>> = Vec::new();

    let outcome = driver
        .execute_with(&CancellationToken::new(), |session| {
            let page = session.current();
            if !page.has_data() {
                return Ok(());
            }
            if columns.is_empty() {
                columns = page.columns.clone();
                values = vec![Vec::new(); columns.len()];
            }
            for row in &page.rows {
                for (i, value) in row.iter().enumerate() {
                    if let Some(slot) = values.get_mut(i) {
                        slot.push(value.clone());
                    }
                }
            }
            Ok(())
        })
        .await;

    let records = columns
        .iter()
        .zip(values)
        .map(|(column, values)| PartitionRecord::from_column(column, values))
        .collect();

    finish_load(&table, outcome, records)
}

/// Map a driver outcome to the cache entry value.
///
/// A timed-out introspection query is logged and resolves to an EMPTY list —
/// partial metadata availability is preferable to failing an aggregate
/// listing over one misbehaving table. Every other failure propagates so the
/// entry is evicted and retried.
fn finish_load<T>(
    table: &str,
    outcome: Result<Option<()>, crate::driver::DriverError>,
    records: Vec<T>,
) -> Result<Vec<T>, BoxError> {
    match outcome {
        Ok(_) => Ok(records),
        Err(err) if err.is_timeout() => {
            error!(
                target: "metadata",
                table = %table,
                error = %err,
                "introspection query timed out; serving empty metadata"
            );
            Ok(Vec::new())
        }
        Err(err) => Err(err.into()),
    }
}

/// Interpret one positional `SHOW COLUMNS` row.
fn column_from_row(
    table: &str,
    row: &[serde_json::Value],
) -> Result<ColumnRecord, EngineError> {
    let name = row
        .first()
        .and_then(|v| v.as_str())
        .ok_or_else(|| malformed_row(table, row))?;
    let type_name = row
        .get(1)
        .and_then(|v| v.as_str())
        .ok_or_else(|| malformed_row(table, row))?;
    let is_partition_key = row
        .get(2)
        .and_then(|v| v.as_str())
        .is_some_and(|v| v == PARTITION_KEY_MARKER);

    Ok(ColumnRecord {
        table: table.to_string(),
        name: name.to_string(),
        type_name: type_name.to_string(),
        is_nullable: false,
        is_partition_key,
    })
}

fn malformed_row(table: &str, row: &[serde_json::Value]) -> EngineError {
    EngineError::Projection(format!(
        "malformed SHOW COLUMNS row for {table}: {}",
        serde_json::Value::Array(row.to_vec())
    ))
}
