//! Session and result page types for the remote engine boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::EngineResult;

/// Descriptor for one column of a result page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name as reported by the engine.
    pub name: String,
    /// Declared type (e.g., "bigint", "varchar").
    pub type_name: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// One step's worth of remote output: column descriptors plus zero or more
/// rows of column-ordered values. Immutable once produced.
///
/// Early pages of a session may carry no columns yet; consumers must treat
/// empty `columns`/`rows` as "nothing here this step", not as an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultPage {
    /// Column descriptors, in result order. May be empty on early pages.
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
    /// Rows of column-ordered values. May be empty.
    #[serde(default)]
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl ResultPage {
    /// Whether this page carries any data rows.
    pub fn has_data(&self) -> bool {
        !self.columns.is_empty() && !self.rows.is_empty()
    }
}

/// Opaque per-invocation context handed from [`SessionFactory::create`] to
/// [`SessionFactory::start_session`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionHandle {
    /// User the session runs as.
    pub user: String,
    /// Default catalog for unqualified names.
    pub catalog: String,
    /// Default schema for unqualified names.
    pub schema: String,
}

/// One stateful, multi-step execution of a query against the remote engine.
///
/// A session is owned exclusively by one driver invocation. It must never be
/// advanced after `is_valid` returns false, and [`QuerySession::close`] is
/// called exactly once on every exit path of that invocation.
#[async_trait]
pub trait QuerySession: Send {
    /// Whether the session can still be advanced.
    fn is_valid(&self) -> bool;

    /// The current result page.
    fn current(&self) -> &ResultPage;

    /// The final result page. Meaningful only once the session has gone
    /// invalid.
    fn final_results(&self) -> ResultPage;

    /// Advance to the next page. Blocks on network I/O.
    async fn advance(&mut self) -> EngineResult<()>;

    /// Release the remote session. Called on every exit path.
    async fn close(&mut self);
}

/// Factory for remote query sessions.
///
/// Shared by concurrent driver invocations; each call to `start_session`
/// yields a session owned exclusively by its caller.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Produce the per-invocation session context.
    fn create(&self) -> SessionHandle;

    /// Open a new stateful session executing `query`.
    async fn start_session(
        &self,
        handle: SessionHandle,
        query: &str,
    ) -> EngineResult<Box<dyn QuerySession>>;
}
