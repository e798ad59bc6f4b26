use std::collections::BTreeSet;
use std::sync::Arc;

use dbscrub_core::{CleanOptions, Progress, Schema, SchemaLoader, SqlErrorKind, SqlExecutor};

use crate::error::{CascadeError, EdgeRejection};
use crate::heuristic::{RelationshipHeuristic, field_matches};
use crate::report::CascadeReport;
use crate::reversal::{ReversalLog, RevertReport};
use crate::statements;

/// Orphans are repaired only on tables with more than this many rows.
const MIN_REPAIRABLE_ROWS: u64 = 100;
/// Orphans are repaired only when fewer than `1 / ORPHAN_RATIO_DIVISOR` of rows.
const ORPHAN_RATIO_DIVISOR: u64 = 20;

/// True when a child table's orphaned rows may be deleted so a constraint can
/// be added: the table has more than 100 rows and under 5% are orphans.
pub fn orphans_repairable(mismatches: u64, total: u64) -> bool {
    total > MIN_REPAIRABLE_ROWS && mismatches.saturating_mul(ORPHAN_RATIO_DIVISOR) < total
}

/// State of one cascade run: visited tables, counters and the undo log.
///
/// Tables visited as a parent stay visited for the lifetime of the session,
/// so executing the same root twice mutates nothing the second time.
pub struct CascadeSession<'e, E: SqlExecutor + ?Sized> {
    executor: &'e E,
    options: CleanOptions,
    heuristic: RelationshipHeuristic,
    schema: Option<Arc<Schema>>,
    visited: BTreeSet<String>,
    unrelated: BTreeSet<String>,
    report: CascadeReport,
    log: ReversalLog,
    progress: Option<Progress>,
}

impl<'e, E: SqlExecutor + ?Sized> CascadeSession<'e, E> {
    pub fn new(executor: &'e E, options: CleanOptions) -> Self {
        let report = CascadeReport {
            dry_run: options.dry_run,
            ..CascadeReport::default()
        };
        Self {
            executor,
            options,
            heuristic: RelationshipHeuristic::default(),
            schema: None,
            visited: BTreeSet::new(),
            unrelated: BTreeSet::new(),
            report,
            log: ReversalLog::new(),
            progress: None,
        }
    }

    pub fn with_heuristic(mut self, heuristic: RelationshipHeuristic) -> Self {
        self.heuristic = heuristic;
        self
    }

    pub fn options(&self) -> &CleanOptions {
        &self.options
    }

    pub fn report(&self) -> &CascadeReport {
        &self.report
    }

    pub fn into_report(self) -> CascadeReport {
        self.report
    }

    pub fn reversal_log(&self) -> &ReversalLog {
        &self.log
    }

    pub fn is_visited(&self, table: &str) -> bool {
        self.visited.contains(table)
    }

    /// Load the schema (cached per version tag) and grow the graph from `root`.
    ///
    /// Only a schema load failure is returned as an error.
    pub async fn execute(&mut self, loader: &SchemaLoader, root: &str) -> Result<(), CascadeError> {
        let schema = loader.load_schema().await?;
        self.execute_with_schema(schema, root).await;
        Ok(())
    }

    /// Execute several roots in order within this session.
    pub async fn execute_all(
        &mut self,
        loader: &SchemaLoader,
        roots: &[&str],
    ) -> Result<(), CascadeError> {
        for root in roots {
            self.execute(loader, root).await?;
        }
        Ok(())
    }

    /// Grow the graph from `root` using an already loaded schema.
    pub async fn execute_with_schema(&mut self, schema: Arc<Schema>, root: &str) {
        if !schema.contains(root) {
            tracing::warn!(event = "root_not_in_schema", root = %root);
        }

        self.unrelated = schema
            .table_names()
            .filter(|name| *name != root)
            .map(str::to_string)
            .collect();
        self.progress = Some(Progress::new_task(
            format!("cascade:{root}"),
            schema.len() as u64,
        ));
        self.schema = Some(schema);

        self.walk(root, 0).await;

        if let Some(progress) = self.progress.take() {
            progress.done();
        }
        self.finish_root(root);
    }

    async fn walk(&mut self, root: &str, depth: usize) {
        if self.visited.contains(root) {
            tracing::debug!(event = "cascade_already_visited", table = %root, depth = depth);
            return;
        }
        if depth > self.options.max_depth {
            tracing::warn!(
                event = "cascade_depth_limited",
                table = %root,
                max_depth = self.options.max_depth
            );
            self.report.depth_limited.push(root.to_string());
            return;
        }

        let Some(schema) = self.schema.clone() else {
            return;
        };

        self.visited.insert(root.to_string());
        self.report.visited.push(root.to_string());
        if let Some(progress) = self.progress.as_mut() {
            progress.step(root);
        }
        tracing::info!(event = "cascade_parent", table = %root, depth = depth);

        self.ensure_id_index(root).await;

        let checks = self.heuristic.checks_for_parent(root);
        let mut worklist = Vec::new();

        for table in schema.tables().filter(|table| table.name != root) {
            for field in &table.fields {
                if !field_matches(&checks, &field.name) {
                    continue;
                }

                self.unrelated.remove(&table.name);

                let index_name = table
                    .single_field_index(&field.name)
                    .map(|index| index.name.clone())
                    .unwrap_or_else(|| format!("u_{root}"));

                if self.options.dry_run {
                    self.report.would_add_cascades += 1;
                    tracing::info!(
                        event = "cascade_would_add",
                        parent = %root,
                        child = %table.name,
                        field = %field.name
                    );
                    worklist.push(table.name.clone());
                    continue;
                }

                if self
                    .try_add_cascade_delete(root, &table.name, &field.name, &index_name)
                    .await
                {
                    worklist.push(table.name.clone());
                }
            }
        }

        for child in worklist {
            Box::pin(self.walk(&child, depth + 1)).await;
        }
    }

    /// Add a plain index on `table.id`, tolerating one that already exists.
    async fn ensure_id_index(&mut self, table: &str) {
        if self.options.dry_run {
            self.report.would_add_indexes += 1;
            return;
        }

        let statement = statements::create_id_index(&self.options, table);
        // Recorded before the apply is sent: an interrupted statement may still
        // commit server-side, and the undo is `IF EXISTS`.
        self.log.record(statement.undo.clone());
        match self.executor.execute(&statement.apply, &[]).await {
            Ok(_) => {
                tracing::info!(event = "index_added", table = %table);
                self.report.indexes_added += 1;
            }
            Err(err) if err.kind == SqlErrorKind::AlreadyExists => {
                self.log.retract(&statement.undo);
                tracing::debug!(event = "index_exists", table = %table);
            }
            Err(err) => {
                self.log.retract(&statement.undo);
                tracing::warn!(event = "index_failed", table = %table, error = %err);
            }
        }
    }

    /// Try to turn a candidate relationship into an `ON DELETE CASCADE` constraint.
    ///
    /// Returns false, without propagating anything, when the edge is rejected.
    pub async fn try_add_cascade_delete(
        &mut self,
        parent: &str,
        child: &str,
        field: &str,
        index_name: &str,
    ) -> bool {
        match self.add_cascade_delete(parent, child, field, index_name).await {
            Ok(()) => true,
            Err(rejection) => {
                self.report.rejections.record(&rejection);
                match &rejection {
                    EdgeRejection::Conflict(_) | EdgeRejection::Integrity { .. } => {
                        tracing::info!(
                            event = "cascade_skipped",
                            parent = %parent,
                            child = %child,
                            field = %field,
                            reason = %rejection
                        );
                    }
                    _ => {
                        tracing::warn!(
                            event = "cascade_rejected",
                            parent = %parent,
                            child = %child,
                            field = %field,
                            reason = %rejection
                        );
                    }
                }
                false
            }
        }
    }

    async fn add_cascade_delete(
        &mut self,
        parent: &str,
        child: &str,
        field: &str,
        index_name: &str,
    ) -> Result<(), EdgeRejection> {
        let mismatches = self
            .executor
            .count(&statements::count_orphans(&self.options, parent, child, field), &[])
            .await?;

        if mismatches > 0 {
            let total = self
                .executor
                .count(&statements::count_rows(&self.options, child), &[])
                .await?;
            if !orphans_repairable(mismatches, total) {
                return Err(EdgeRejection::Integrity { mismatches, total });
            }

            let deleted = self
                .executor
                .execute(
                    &statements::delete_orphans(&self.options, parent, child, field),
                    &[],
                )
                .await?;
            self.report.orphans_deleted += deleted;
            tracing::info!(
                event = "orphans_deleted",
                child = %child,
                field = %field,
                deleted = deleted,
                total = total
            );
        }

        let constraint = statements::constraint_name(parent, index_name);
        let statement =
            statements::add_cascade_constraint(&self.options, parent, child, field, &constraint);
        self.log.record(statement.undo.clone());
        if let Err(err) = self.executor.execute(&statement.apply, &[]).await {
            self.log.retract(&statement.undo);
            return Err(err.into());
        }

        tracing::info!(
            event = "cascade_added",
            parent = %parent,
            child = %child,
            field = %field,
            constraint = %constraint
        );
        self.report.cascades_added += 1;
        Ok(())
    }

    fn finish_root(&mut self, root: &str) {
        let unrelated: Vec<String> = self.unrelated.iter().cloned().collect();

        if self.options.verbose && !unrelated.is_empty() {
            tracing::info!(
                event = "unrelated_tables",
                root = %root,
                count = unrelated.len(),
                tables = ?unrelated
            );
        }

        if self.options.dry_run {
            tracing::info!(
                event = "cascade_dry_run_summary",
                root = %root,
                would_add_indexes = self.report.would_add_indexes,
                would_add_cascades = self.report.would_add_cascades
            );
        } else {
            tracing::info!(
                event = "cascade_summary",
                root = %root,
                indexes_added = self.report.indexes_added,
                cascades_added = self.report.cascades_added,
                undo_entries = self.log.len()
            );
        }

        self.report.unrelated.insert(root.to_string(), unrelated);
    }

    /// Undo every recorded structural change, newest first.
    pub async fn revert(&mut self) -> RevertReport {
        self.log.revert(self.executor).await
    }
}
