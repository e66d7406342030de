//! Typed metadata records produced by the introspection load paths.

use serde::{Deserialize, Serialize};

use crate::engine::ColumnDescriptor;

/// Fully-qualified table name used as the cache key.
pub fn fqn(database: &str, table: &str) -> String {
    format!("{database}.{table}")
}

/// One column of a table, as reported by `SHOW COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRecord {
    /// Fully-qualified name of the owning table.
    pub table: String,
    /// Column name.
    pub name: String,
    /// Declared type (e.g., "bigint", "varchar").
    pub type_name: String,
    /// Whether the column is nullable. `SHOW COLUMNS` does not report
    /// nullability, so this is always false on the introspection path.
    pub is_nullable: bool,
    /// Whether the column is a partition key.
    pub is_partition_key: bool,
}

/// One partition column of a table, pivoted from `SHOW PARTITIONS` output:
/// the ordered values observed for that column across all result rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionRecord {
    /// Partition column name.
    pub name: String,
    /// Declared type of the partition column.
    pub type_name: String,
    /// All observed values for this column, in row order.
    pub values: Vec<serde_json::Value>,
}

impl PartitionRecord {
    /// Build a record from a result column and its accumulated values.
    pub fn from_column(column: &ColumnDescriptor, values: Vec<serde_json::Value>) -> Self {
        Self {
            name: column.name.clone(),
            type_name: column.type_name.clone(),
            values,
        }
    }
}
