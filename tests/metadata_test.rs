//! Integration tests for the derived-metadata cache: positional column
//! parsing, partition pivoting, caching behavior, and the fail-soft timeout
//! policy.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use stratus::config::MetadataSettings;
use stratus::engine::{
    ColumnDescriptor, EngineError, EngineResult, QuerySession, ResultPage, SessionFactory,
    SessionHandle,
};
use stratus::metadata::{MetadataCache, MetadataError};

struct MockSession {
    pages: VecDeque<ResultPage>,
    current: ResultPage,
    advance_delay: Duration,
    never_finish: bool,
    fail_advance: bool,
    valid: bool,
}

#[async_trait]
impl QuerySession for MockSession {
    fn is_valid(&self) -> bool {
        self.valid
    }

    fn current(&self) -> &ResultPage {
        &self.current
    }

    fn final_results(&self) -> ResultPage {
        self.current.clone()
    }

    async fn advance(&mut self) -> EngineResult<()> {
        if self.advance_delay > Duration::ZERO {
            tokio::time::sleep(self.advance_delay).await;
        }
        if self.fail_advance {
            return Err(EngineError::Advance("injected advance failure".into()));
        }
        if self.never_finish {
            return Ok(());
        }
        match self.pages.pop_front() {
            Some(page) => self.current = page,
            None => self.valid = false,
        }
        Ok(())
    }

    async fn close(&mut self) {}
}

/// Factory that replays the same scripted pages for every session.
#[derive(Default)]
struct ScriptedFactory {
    pages: Vec<ResultPage>,
    advance_delay: Duration,
    never_finish: bool,
    fail_advance: bool,
    sessions_started: Arc<AtomicUsize>,
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    fn create(&self) -> SessionHandle {
        SessionHandle::default()
    }

    async fn start_session(
        &self,
        _handle: SessionHandle,
        _query: &str,
    ) -> EngineResult<Box<dyn QuerySession>> {
        self.sessions_started.fetch_add(1, Ordering::SeqCst);
        let mut pages: VecDeque<ResultPage> = self.pages.clone().into();
        let current = pages.pop_front().unwrap_or_default();
        Ok(Box::new(MockSession {
            pages,
            current,
            advance_delay: self.advance_delay,
            never_finish: self.never_finish,
            fail_advance: self.fail_advance,
            valid: true,
        }))
    }
}

fn cache_over(factory: ScriptedFactory) -> MetadataCache {
    MetadataCache::new(
        Arc::new(factory),
        tokio::runtime::Handle::current(),
        &MetadataSettings::default(),
    )
}

#[tokio::test]
async fn test_get_columns_parses_rows_positionally() {
    let factory = ScriptedFactory {
        pages: vec![ResultPage {
            columns: vec![
                ColumnDescriptor::new("Column", "varchar"),
                ColumnDescriptor::new("Type", "varchar"),
                ColumnDescriptor::new("Null", "varchar"),
            ],
            rows: vec![
                vec![json!("id"), json!("bigint"), json!("NULL")],
                vec![json!("ds"), json!("varchar"), json!("Partition Key")],
            ],
        }],
        ..Default::default()
    };

    let cache = cache_over(factory);
    let columns = cache.get_columns("logs", "events").await.unwrap();

    assert_eq!(columns.len(), 2);

    assert_eq!(columns[0].table, "logs.events");
    assert_eq!(columns[0].name, "id");
    assert_eq!(columns[0].type_name, "bigint");
    assert!(!columns[0].is_partition_key);
    assert!(!columns[0].is_nullable);

    assert_eq!(columns[1].name, "ds");
    assert_eq!(columns[1].type_name, "varchar");
    assert!(columns[1].is_partition_key);
    assert!(!columns[1].is_nullable);
}

#[tokio::test]
async fn test_get_partitions_pivots_pages_column_wise() {
    let factory = ScriptedFactory {
        pages: vec![ResultPage {
            columns: vec![ColumnDescriptor::new("ds", "varchar")],
            rows: vec![vec![json!("2021-01-01")], vec![json!("2021-01-02")]],
        }],
        ..Default::default()
    };

    let cache = cache_over(factory);
    let partitions = cache.get_partitions("logs", "events").await.unwrap();

    assert_eq!(partitions.len(), 1);
    assert_eq!(partitions[0].name, "ds");
    assert_eq!(partitions[0].type_name, "varchar");
    assert_eq!(
        partitions[0].values,
        vec![json!("2021-01-01"), json!("2021-01-02")]
    );
}

#[tokio::test]
async fn test_partitions_accumulate_across_pages() {
    let factory = ScriptedFactory {
        pages: vec![
            ResultPage {
                columns: vec![ColumnDescriptor::new("ds", "varchar")],
                rows: vec![vec![json!("2021-01-01")]],
            },
            ResultPage {
                columns: vec![ColumnDescriptor::new("ds", "varchar")],
                rows: vec![vec![json!("2021-01-02")], vec![json!("2021-01-03")]],
            },
        ],
        ..Default::default()
    };

    let cache = cache_over(factory);
    let partitions = cache.get_partitions("logs", "events").await.unwrap();

    assert_eq!(partitions.len(), 1);
    assert_eq!(partitions[0].values.len(), 3);
}

#[tokio::test]
async fn test_unpartitioned_table_yields_empty_list() {
    // SHOW PARTITIONS returns no data for an unpartitioned table.
    let factory = ScriptedFactory::default();

    let cache = cache_over(factory);
    let partitions = cache.get_partitions("logs", "flat").await.unwrap();
    assert!(partitions.is_empty());
}

#[tokio::test]
async fn test_columns_are_cached_between_lookups() {
    let sessions_started = Arc::new(AtomicUsize::new(0));
    let factory = ScriptedFactory {
        pages: vec![ResultPage {
            columns: vec![ColumnDescriptor::new("Column", "varchar")],
            rows: vec![vec![json!("id"), json!("bigint"), json!("NULL")]],
        }],
        sessions_started: Arc::clone(&sessions_started),
        ..Default::default()
    };

    let cache = cache_over(factory);
    cache.get_columns("logs", "events").await.unwrap();
    cache.get_columns("logs", "events").await.unwrap();

    // Second lookup was served from cache: one introspection session only.
    assert_eq!(sessions_started.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_column_and_partition_caches_are_independent() {
    let sessions_started = Arc::new(AtomicUsize::new(0));
    let factory = ScriptedFactory {
        pages: vec![ResultPage {
            columns: vec![ColumnDescriptor::new("ds", "varchar")],
            rows: vec![vec![json!("ds"), json!("varchar"), json!("Partition Key")]],
        }],
        sessions_started: Arc::clone(&sessions_started),
        ..Default::default()
    };

    let cache = cache_over(factory);
    cache.get_columns("logs", "events").await.unwrap();
    cache.get_partitions("logs", "events").await.unwrap();

    // Same key, but each kind issued its own introspection query.
    assert_eq!(sessions_started.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_introspection_timeout_yields_empty_list_not_error() {
    let factory = ScriptedFactory {
        never_finish: true,
        advance_delay: Duration::from_millis(5),
        ..Default::default()
    };

    let cache = MetadataCache::new(
        Arc::new(factory),
        tokio::runtime::Handle::current(),
        &MetadataSettings {
            metadata_query_timeout_seconds: 0,
            ..Default::default()
        },
    );

    let columns = cache
        .get_columns("logs", "slow")
        .await
        .expect("timeout must resolve to empty metadata, not an error");
    assert!(columns.is_empty());
}

#[tokio::test]
async fn test_non_timeout_failure_propagates_and_permits_retry() {
    let sessions_started = Arc::new(AtomicUsize::new(0));
    let factory = ScriptedFactory {
        pages: vec![ResultPage::default()],
        fail_advance: true,
        sessions_started: Arc::clone(&sessions_started),
        ..Default::default()
    };

    let cache = cache_over(factory);

    let err = cache.get_columns("logs", "broken").await.unwrap_err();
    let MetadataError::Load { table, .. } = err;
    assert_eq!(table, "logs.broken");

    // The failed entry was evicted: a second lookup issues a fresh load.
    let _ = cache.get_columns("logs", "broken").await.unwrap_err();
    assert_eq!(sessions_started.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalidate_forces_refresh() {
    let sessions_started = Arc::new(AtomicUsize::new(0));
    let factory = ScriptedFactory {
        pages: vec![ResultPage {
            columns: vec![ColumnDescriptor::new("Column", "varchar")],
            rows: vec![vec![json!("id"), json!("bigint"), json!("NULL")]],
        }],
        sessions_started: Arc::clone(&sessions_started),
        ..Default::default()
    };

    let cache = cache_over(factory);
    cache.get_columns("logs", "events").await.unwrap();
    cache.invalidate("logs", "events");
    cache.get_columns("logs", "events").await.unwrap();

    assert_eq!(sessions_started.load(Ordering::SeqCst), 2);
}
