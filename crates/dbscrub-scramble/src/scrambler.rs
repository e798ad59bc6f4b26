use std::future::Future;

use dbscrub_core::{CleanOptions, Progress, SqlExecutor, SqlValue};

use crate::error::ScrambleError;
use crate::primes::get_prime_factors;
use crate::request::{ScrambleReport, ScrambleRequest};
use crate::statements::{self, Staged};

/// Staging slot each field reads for the row at `ordinal` out of `rows`.
///
/// Field `i` ranks the ordinals `0..rows` by `(ordinal % factors[i], ordinal)`.
/// The rank is a permutation of `0..rows`, so every staged value lands on
/// exactly one row. Distinct primes give distinct permutations.
pub fn combination_indexes(ordinal: u64, rows: u64, factors: &[u64]) -> Vec<u64> {
    factors
        .iter()
        .map(|prime| {
            let prime = (*prime).max(1);
            let residue = ordinal % prime;
            residue * (rows / prime) + residue.min(rows % prime) + ordinal / prime
        })
        .collect()
}

/// Scrambles columns of one table at a time through `executor`.
pub struct Scrambler<'e, E: SqlExecutor + ?Sized> {
    executor: &'e E,
    options: CleanOptions,
}

impl<'e, E: SqlExecutor + ?Sized> Scrambler<'e, E> {
    pub fn new(executor: &'e E, options: CleanOptions) -> Self {
        Self { executor, options }
    }

    pub fn options(&self) -> &CleanOptions {
        &self.options
    }

    /// Scramble the requested fields across every in-scope row.
    ///
    /// Staging tables are dropped whether or not the scramble succeeds. In
    /// dry-run mode only the row count is read and the factors reported.
    pub async fn execute(&self, request: &ScrambleRequest) -> Result<ScrambleReport, ScrambleError> {
        self.execute_until(request, std::future::pending::<()>()).await
    }

    /// Like [`Scrambler::execute`], but stops staging as soon as `shutdown`
    /// resolves, drops the staging tables and returns [`ScrambleError::Interrupted`].
    pub async fn execute_until<S>(
        &self,
        request: &ScrambleRequest,
        shutdown: S,
    ) -> Result<ScrambleReport, ScrambleError>
    where
        S: Future<Output = ()>,
    {
        request.validate()?;

        let filtered = request.change_only.is_some();
        let params: Vec<SqlValue> = request
            .change_only
            .iter()
            .map(|ids| SqlValue::IntList(ids.clone()))
            .collect();

        let rows = self
            .executor
            .count(
                &statements::count_rows(&self.options, &request.table, filtered),
                &params,
            )
            .await?;

        let mut report = ScrambleReport {
            table: request.table.clone(),
            dry_run: self.options.dry_run,
            rows,
            ..ScrambleReport::default()
        };

        if rows == 0 {
            tracing::info!(event = "scramble_empty", table = %request.table);
            return Ok(report);
        }

        report.factors = get_prime_factors(request.fields.len(), rows)?;

        if self.options.dry_run {
            tracing::info!(
                event = "scramble_dry_run",
                table = %request.table,
                rows = rows,
                factors = ?report.factors
            );
            return Ok(report);
        }

        let staging: Vec<String> = (0..request.fields.len())
            .map(|position| statements::staging_table_name(&self.options, &request.table, position))
            .collect();

        let outcome = tokio::select! {
            outcome = self.scramble(request, &report.factors, &staging, &params) => outcome,
            () = shutdown => {
                tracing::warn!(event = "scramble_interrupted", table = %request.table);
                Err(ScrambleError::Interrupted)
            }
        };
        self.drop_staging(&staging).await;

        let (distinct, updated) = outcome?;
        report.distinct_per_field = distinct;
        report.updated = updated;

        tracing::info!(
            event = "scramble_finished",
            table = %request.table,
            rows = rows,
            updated = updated,
            factors = ?report.factors,
            distinct = ?report.distinct_per_field
        );
        Ok(report)
    }

    async fn scramble(
        &self,
        request: &ScrambleRequest,
        factors: &[u64],
        staging: &[String],
        params: &[SqlValue],
    ) -> Result<(Vec<u64>, u64), ScrambleError> {
        let filtered = !params.is_empty();
        let mut progress = Progress::new_task(
            format!("scramble:{}", request.table),
            request.fields.len() as u64 + 1,
        );
        let mut distinct = Vec::with_capacity(request.fields.len());

        for ((field, prime), name) in request.fields.iter().zip(factors).zip(staging) {
            self.executor
                .execute(&statements::drop_staging(name), &[])
                .await?;
            self.executor
                .execute(
                    &statements::create_staging(&self.options, &request.table, field, name),
                    &[],
                )
                .await?;
            self.executor
                .execute(
                    &statements::fill_staging(
                        &self.options,
                        &request.table,
                        field,
                        name,
                        filtered,
                    ),
                    params,
                )
                .await?;
            let staged = self
                .executor
                .count(&statements::count_distinct_staged(name), &[])
                .await?;

            tracing::debug!(
                event = "scramble_staged",
                table = %request.table,
                field = %field,
                prime = *prime,
                distinct = staged
            );
            progress.step(field);
            distinct.push(staged);
        }

        let staged: Vec<Staged<'_>> = request
            .fields
            .iter()
            .zip(staging)
            .zip(factors)
            .map(|((field, table), prime)| Staged {
                field,
                table,
                prime: *prime,
            })
            .collect();

        let updated = self
            .executor
            .execute(
                &statements::recombine(&self.options, &request.table, &staged, filtered),
                params,
            )
            .await?;
        progress.step("recombine");
        progress.done();

        Ok((distinct, updated))
    }

    async fn drop_staging(&self, staging: &[String]) {
        for name in staging {
            if let Err(err) = self
                .executor
                .execute(&statements::drop_staging(name), &[])
                .await
            {
                tracing::warn!(event = "staging_drop_failed", table = %name, error = %err);
            }
        }
    }
}
