use std::future::Future;

use dbscrub_core::{CleanOptions, SchemaLoader, SqlExecutor};

use crate::error::CascadeError;
use crate::report::CascadeReport;
use crate::reversal::RevertReport;
use crate::session::CascadeSession;

/// Result of a scoped cascade run.
///
/// The report and revert summary are kept whether or not the work succeeded.
#[derive(Debug)]
pub struct CascadeOutcome<T, Er> {
    pub result: Result<T, Er>,
    pub report: CascadeReport,
    pub revert: RevertReport,
}

impl<T, Er> CascadeOutcome<T, Er> {
    pub fn into_result(self) -> Result<T, Er> {
        self.result
    }
}

/// Build cascades from `roots`, run `body`, then revert every schema change.
///
/// The revert runs whether the build or the body succeeds or fails.
pub async fn with_cascade_deletes<'e, E, T, Er, F, Fut>(
    executor: &'e E,
    loader: &SchemaLoader,
    options: CleanOptions,
    roots: &[&str],
    body: F,
) -> CascadeOutcome<T, Er>
where
    E: SqlExecutor + ?Sized,
    F: FnOnce(&'e E) -> Fut,
    Fut: Future<Output = Result<T, Er>>,
    Er: From<CascadeError>,
{
    with_cascade_deletes_until(
        executor,
        loader,
        options,
        roots,
        std::future::pending::<()>(),
        body,
    )
    .await
}

/// Like [`with_cascade_deletes`], but abandons the build or body as soon as
/// `shutdown` resolves; the outcome then carries [`CascadeError::Interrupted`].
pub async fn with_cascade_deletes_until<'e, E, T, Er, F, Fut, S>(
    executor: &'e E,
    loader: &SchemaLoader,
    options: CleanOptions,
    roots: &[&str],
    shutdown: S,
    body: F,
) -> CascadeOutcome<T, Er>
where
    E: SqlExecutor + ?Sized,
    F: FnOnce(&'e E) -> Fut,
    Fut: Future<Output = Result<T, Er>>,
    Er: From<CascadeError>,
    S: Future<Output = ()>,
{
    let mut session = CascadeSession::new(executor, options);

    let result = {
        let work = async {
            match session.execute_all(loader, roots).await {
                Ok(()) => body(executor).await,
                Err(err) => Err(Er::from(err)),
            }
        };

        tokio::select! {
            result = work => result,
            () = shutdown => {
                tracing::warn!(event = "cascade_interrupted");
                Err(Er::from(CascadeError::Interrupted))
            }
        }
    };

    let revert = session.revert().await;

    CascadeOutcome {
        result,
        report: session.into_report(),
        revert,
    }
}
