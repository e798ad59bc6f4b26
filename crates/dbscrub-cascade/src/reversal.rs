use thiserror::Error;

use dbscrub_core::{SqlError, SqlExecutor};

/// An undo statement that failed during [`ReversalLog::revert`].
#[derive(Debug, Clone, Error)]
#[error("undo failed for `{statement}`: {error}")]
pub struct UndoFailure {
    pub statement: String,
    pub error: SqlError,
}

/// Outcome of a revert pass.
#[derive(Debug, Clone, Default)]
pub struct RevertReport {
    pub executed: usize,
    pub failures: Vec<UndoFailure>,
}

impl RevertReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Ordered undo statements for every structural change made in a run.
///
/// Entries are replayed last-added-first. A log dropped with entries still
/// pending reports them at error level so they can be applied by hand.
#[derive(Debug, Default)]
pub struct ReversalLog {
    entries: Vec<String>,
}

impl ReversalLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, undo_sql: impl Into<String>) {
        let undo_sql = undo_sql.into();
        if self.entries.is_empty() {
            tracing::debug!(event = "reversal_armed");
        }
        tracing::debug!(event = "undo_recorded", sql = %undo_sql);
        self.entries.push(undo_sql);
    }

    /// Withdraw the most recent entry when it is `undo_sql`.
    ///
    /// Used when the change it would undo was reported as not applied.
    pub fn retract(&mut self, undo_sql: &str) -> bool {
        if self.entries.last().map(String::as_str) != Some(undo_sql) {
            return false;
        }
        self.entries.pop();
        tracing::debug!(event = "undo_retracted", sql = %undo_sql);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pending undo statements in recording order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Run every undo statement in reverse order, then clear the log.
    ///
    /// A failing statement is logged and collected; the remaining ones still run.
    pub async fn revert<E>(&mut self, executor: &E) -> RevertReport
    where
        E: SqlExecutor + ?Sized,
    {
        let entries = std::mem::take(&mut self.entries);
        let mut report = RevertReport::default();

        for statement in entries.into_iter().rev() {
            match executor.execute(&statement, &[]).await {
                Ok(_) => {
                    report.executed += 1;
                    tracing::debug!(event = "undo_executed", sql = %statement);
                }
                Err(error) => {
                    tracing::warn!(event = "undo_failed", sql = %statement, error = %error);
                    report.failures.push(UndoFailure { statement, error });
                }
            }
        }

        if report.is_clean() {
            tracing::info!(event = "revert_finished", executed = report.executed);
        } else {
            tracing::warn!(
                event = "revert_incomplete",
                executed = report.executed,
                failures = report.failures.len()
            );
        }

        report
    }
}

impl Drop for ReversalLog {
    fn drop(&mut self) {
        if !self.entries.is_empty() {
            tracing::error!(
                event = "reversal_pending",
                count = self.entries.len(),
                statements = ?self.entries,
                "schema changes were not reverted"
            );
        }
    }
}
