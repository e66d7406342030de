//! Bounded query driver.
//!
//! [`QueryDriver`] drives one stateful remote query session to completion or
//! timeout. Each step applies a caller-supplied projection function to the
//! session, and the result of the *last* successful projection is returned.
//! Separating "what to do with each step" (the projection) from "how long
//! we're willing to wait" (the budget) lets one polling engine serve both
//! data-reading callers and fire-and-forget introspection queries.
//!
//! Guarantees per invocation:
//!
//! - exactly one session is opened, and it is closed on every exit path
//!   (normal completion, timeout, engine failure, projection failure);
//! - the session is never advanced after it reports itself invalid;
//! - a timeout is a typed [`DriverError::Timeout`] carrying the elapsed
//!   milliseconds, never retried internally;
//! - cancellation is cooperative: the token is checked at the top of each
//!   step, and a cancelled invocation simply stops and returns the last
//!   tentative result rather than raising a timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::OnceCell;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::engine::{EngineError, QuerySession, ResultPage, SessionFactory};

/// Default budget for interactive queries (5 hours).
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 5 * 60 * 60;

/// Result type for driver invocations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors surfaced by [`QueryDriver::execute_with`].
#[derive(Error, Debug)]
pub enum DriverError {
    /// Elapsed wall-clock time exceeded the configured budget.
    #[error("query exceeded its time budget after {elapsed_ms} ms")]
    Timeout {
        /// Milliseconds elapsed when the budget check fired.
        elapsed_ms: u64,
    },

    /// The remote session failed while opening, advancing, or projecting.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl DriverError {
    /// Whether this is a budget-exceeded timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Drives one remote query to completion under a hard wall-clock budget.
///
/// # Example
///
/// ```ignore
/// use stratus::driver::QueryDriver;
/// use tokio_util::sync::CancellationToken;
///
/// let driver = QueryDriver::with_budget(factory, "SELECT 1", Duration::from_secs(60));
/// let rows = driver
///     .execute_with(&CancellationToken::new(), |session| {
///         Ok(session.current().rows.len())
///     })
///     .await?;
/// let last_page = driver.final_results();
/// ```
pub struct QueryDriver {
    factory: Arc<dyn SessionFactory>,
    query: String,
    budget: Duration,
    /// Final result page, written exactly once on normal completion.
    final_results: OnceCell<ResultPage>,
}

impl QueryDriver {
    /// Create a driver with the default 5 hour budget.
    pub fn new(factory: Arc<dyn SessionFactory>, query: impl Into<String>) -> Self {
        Self::with_budget(
            factory,
            query,
            Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        )
    }

    /// Create a driver with an explicit time budget.
    pub fn with_budget(
        factory: Arc<dyn SessionFactory>,
        query: impl Into<String>,
        budget: Duration,
    ) -> Self {
        Self {
            factory,
            query: query.into(),
            budget,
            final_results: OnceCell::new(),
        }
    }

    /// The query text this driver executes.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The configured time budget.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Execute the query, applying `projection` to the session at each step.
    ///
    /// Returns the value produced by the last successful projection, or
    /// `None` if the session was invalid (or cancellation was raised) before
    /// the first step ran.
    ///
    /// # Errors
    ///
    /// - [`DriverError::Timeout`] once elapsed time exceeds the budget.
    /// - [`DriverError::Engine`] for any failure opening or advancing the
    ///   session, or raised by the projection itself.
    ///
    /// In every case the session has been released before the error returns.
    pub async fn execute_with<T, F>(
        &self,
        cancel: &CancellationToken,
        mut projection: F,
    ) -> DriverResult<Option<T>>
    where
        F: FnMut(&dyn QuerySession) -> Result<T, EngineError>,
    {
        let handle = self.factory.create();
        let mut session = self.factory.start_session(handle, &self.query).await?;
        let started = Instant::now();

        let outcome =
            Self::drive(session.as_mut(), cancel, self.budget, started, &mut projection).await;

        if outcome.is_ok() {
            // Normal exit only: capture the terminal page before release.
            let _ = self.final_results.set(session.final_results());
        }

        session.close().await;
        outcome
    }

    /// Final result page of the completed query.
    ///
    /// `Some` only after [`QueryDriver::execute_with`] has returned via
    /// normal completion; written once, safe to read concurrently.
    pub fn final_results(&self) -> Option<&ResultPage> {
        self.final_results.get()
    }

    /// The polling loop, separated so the caller can release the session on
    /// every exit path.
    async fn drive<T, F>(
        session: &mut dyn QuerySession,
        cancel: &CancellationToken,
        budget: Duration,
        started: Instant,
        projection: &mut F,
    ) -> DriverResult<Option<T>>
    where
        F: FnMut(&dyn QuerySession) -> Result<T, EngineError>,
    {
        let mut last = None;

        while session.is_valid() && !cancel.is_cancelled() {
            let elapsed = started.elapsed();
            if elapsed > budget {
                return Err(DriverError::Timeout {
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }

            last = Some(projection(&*session)?);
            session.advance().await?;
        }

        Ok(last)
    }
}
