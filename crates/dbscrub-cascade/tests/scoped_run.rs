use anyhow::anyhow;
use async_trait::async_trait;

use dbscrub_cascade::{CascadeError, CascadeSession, with_cascade_deletes, with_cascade_deletes_until};
use dbscrub_core::testing::{RecordingExecutor, Response};
use dbscrub_core::{CleanOptions, SchemaLoader, SchemaSource, SqlExecutor, Table};

struct FixtureSource;

#[async_trait]
impl SchemaSource for FixtureSource {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn load(&self) -> dbscrub_core::Result<Vec<Table>> {
        Ok(vec![
            Table::new("user")
                .with_field("id", "bigint")
                .with_field("username", "text"),
            Table::new("post")
                .with_field("id", "bigint")
                .with_field("userid", "bigint"),
            Table::new("forum")
                .with_field("id", "bigint")
                .with_field("course", "bigint"),
            Table::new("forum_discussions")
                .with_field("id", "bigint")
                .with_field("forum", "bigint"),
        ])
    }
}

fn loader() -> SchemaLoader {
    SchemaLoader::new("fixture-v1").with_source(FixtureSource)
}

fn position(statements: &[String], needle: &str) -> usize {
    statements
        .iter()
        .position(|sql| sql.contains(needle))
        .unwrap_or_else(|| panic!("no statement containing {needle}"))
}

#[tokio::test]
async fn body_runs_between_build_and_revert() -> anyhow::Result<()> {
    let executor = RecordingExecutor::new();

    let outcome = with_cascade_deletes(
        &executor,
        &loader(),
        CleanOptions::default(),
        &["user", "forum"],
        |db| async move {
            let deleted = db.execute("DELETE FROM \"user\" WHERE id = 7", &[]).await?;
            Ok::<_, anyhow::Error>(deleted)
        },
    )
    .await;

    assert_eq!(outcome.result?, 0);
    assert_eq!(outcome.report.visited, vec!["user", "post", "forum", "forum_discussions"]);
    assert_eq!(outcome.report.cascades_added, 2);
    assert!(outcome.revert.is_clean());
    assert_eq!(outcome.revert.executed, 6);

    let statements = executor.statements();
    let body = position(&statements, "DELETE FROM \"user\" WHERE id = 7");
    assert!(position(&statements, "ADD CONSTRAINT \"forum_u_forum\"") < body);
    assert!(body < position(&statements, "DROP CONSTRAINT"));
    assert!(body < position(&statements, "DROP INDEX"));
    Ok(())
}

#[tokio::test]
async fn failing_body_still_reverts() {
    let executor = RecordingExecutor::new();

    let outcome = with_cascade_deletes(
        &executor,
        &loader(),
        CleanOptions::default(),
        &["user"],
        |_db| async move { Err::<(), _>(anyhow!("cleanup failed")) },
    )
    .await;

    assert_eq!(outcome.revert.executed, 3);
    assert_eq!(outcome.report.cascades_added, 1);
    let err = outcome.into_result().expect_err("body error is returned");
    assert_eq!(err.to_string(), "cleanup failed");
    assert_eq!(executor.statements_containing("DROP CONSTRAINT").len(), 1);
    assert_eq!(executor.statements_containing("DROP INDEX").len(), 2);
}

#[tokio::test]
async fn shutdown_interrupts_and_reverts() {
    let executor = RecordingExecutor::new();
    let shutdown = async {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    };

    let outcome = with_cascade_deletes_until(
        &executor,
        &loader(),
        CleanOptions::default(),
        &["user"],
        shutdown,
        |_db| async move {
            std::future::pending::<()>().await;
            Ok::<_, anyhow::Error>(())
        },
    )
    .await;

    let err = outcome.into_result().expect_err("shutdown interrupts the body");
    assert!(matches!(
        err.downcast_ref::<CascadeError>(),
        Some(CascadeError::Interrupted)
    ));
    assert_eq!(executor.statements_containing("ADD CONSTRAINT").len(), 1);
    assert_eq!(executor.statements_containing("DROP CONSTRAINT").len(), 1);
    assert_eq!(executor.statements_containing("DROP INDEX").len(), 2);
}

#[tokio::test]
async fn interrupted_constraint_apply_is_still_reverted() {
    let executor = RecordingExecutor::new();
    executor.on("ADD CONSTRAINT", Response::Pending);
    let shutdown = async {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    };

    let outcome = with_cascade_deletes_until(
        &executor,
        &loader(),
        CleanOptions::default(),
        &["user"],
        shutdown,
        |_db| async move { Ok::<_, anyhow::Error>(()) },
    )
    .await;

    assert!(matches!(
        outcome.result.as_ref().map_err(|err| err.downcast_ref::<CascadeError>()),
        Err(Some(CascadeError::Interrupted))
    ));
    assert_eq!(outcome.report.cascades_added, 0);
    assert_eq!(outcome.revert.executed, 2);

    let statements = executor.statements();
    let sent = position(&statements, "ADD CONSTRAINT \"user_u_user\"");
    let dropped = position(&statements, "DROP CONSTRAINT IF EXISTS \"user_u_user\"");
    assert!(sent < dropped);
    assert!(dropped < position(&statements, "DROP INDEX"));
}

#[tokio::test]
async fn failed_constraint_leaves_nothing_to_undo() {
    let executor = RecordingExecutor::new();
    executor.on(
        "ADD CONSTRAINT",
        Response::Fail(dbscrub_core::SqlError::type_mismatch("incompatible types")),
    );

    let outcome = with_cascade_deletes(
        &executor,
        &loader(),
        CleanOptions::default(),
        &["user"],
        |_db| async move { Ok::<_, anyhow::Error>(()) },
    )
    .await;

    assert!(outcome.result.is_ok());
    assert_eq!(outcome.report.rejections.type_mismatches, 1);
    assert_eq!(outcome.revert.executed, 1);
    assert!(executor.statements_containing("DROP CONSTRAINT").is_empty());
}

#[tokio::test]
async fn schema_load_failure_aborts_before_any_change() {
    let executor = RecordingExecutor::new();
    let empty = SchemaLoader::new("nothing");

    let outcome = with_cascade_deletes(
        &executor,
        &empty,
        CleanOptions::default(),
        &["user"],
        |_db| async move { Ok::<_, anyhow::Error>(()) },
    )
    .await;

    assert_eq!(outcome.revert.executed, 0);
    let err = outcome.into_result().expect_err("no sources configured");
    assert!(matches!(
        err.downcast_ref::<CascadeError>(),
        Some(CascadeError::Schema(_))
    ));
    assert!(executor.statements().is_empty());
}

#[tokio::test]
async fn session_reports_schema_errors_directly() {
    let executor = RecordingExecutor::new();
    let mut session = CascadeSession::new(&executor, CleanOptions::default());

    let err = session
        .execute(&SchemaLoader::new("nothing"), "user")
        .await
        .expect_err("no sources configured");

    assert!(err.to_string().contains("no schema sources configured"));
    assert!(session.report().visited.is_empty());
}

#[tokio::test]
async fn unknown_root_only_gets_an_id_index() {
    let executor = RecordingExecutor::new();
    let mut session = CascadeSession::new(&executor, CleanOptions::default());

    session.execute(&loader(), "missing_table").await.expect("schema loads");

    assert_eq!(session.report().cascades_added, 0);
    assert_eq!(
        session.report().unrelated.get("missing_table").map(Vec::len),
        Some(4)
    );
    session.revert().await;
}
