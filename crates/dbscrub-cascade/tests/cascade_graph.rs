use std::collections::BTreeSet;
use std::sync::Arc;

use dbscrub_cascade::CascadeSession;
use dbscrub_core::testing::{RecordingExecutor, Response};
use dbscrub_core::{CleanOptions, Schema, SqlError, SqlValue, Table};

fn moodle_schema() -> Arc<Schema> {
    Arc::new(Schema::new(
        "test",
        [
            Table::new("user")
                .with_field("id", "bigint")
                .with_field("username", "text"),
            Table::new("log")
                .with_field("id", "bigint")
                .with_field("userid", "bigint")
                .with_field("courseid", "bigint")
                .with_index("log_use_ix", &["userid"])
                .with_index("log_usecou_ix", &["userid", "courseid"]),
            Table::new("post")
                .with_field("id", "bigint")
                .with_field("userid", "bigint")
                .with_field("subject", "text"),
            Table::new("role_assignments")
                .with_field("id", "bigint")
                .with_field("userid", "bigint")
                .with_field("modifierid", "bigint"),
            Table::new("config")
                .with_field("id", "bigint")
                .with_field("name", "text"),
        ],
    ))
}

fn live() -> CleanOptions {
    CleanOptions::default()
}

/// Net set of indexes and constraints created by a statement history.
fn net_objects(statements: &[String]) -> BTreeSet<String> {
    let mut objects = BTreeSet::new();
    for sql in statements {
        let quoted: Vec<&str> = sql.split('"').collect();
        if sql.starts_with("CREATE INDEX") {
            objects.insert(format!("index:{}", quoted[1]));
        } else if sql.starts_with("DROP INDEX") {
            objects.remove(&format!("index:{}", quoted[1]));
        } else if sql.contains("ADD CONSTRAINT") {
            objects.insert(format!("constraint:{}.{}", quoted[1], quoted[3]));
        } else if sql.contains("DROP CONSTRAINT") {
            objects.remove(&format!("constraint:{}.{}", quoted[1], quoted[3]));
        }
    }
    objects
}

#[tokio::test]
async fn wires_user_children_with_cascades() {
    let executor = RecordingExecutor::new();
    let mut session = CascadeSession::new(&executor, live());

    session.execute_with_schema(moodle_schema(), "user").await;

    let report = session.report();
    assert_eq!(report.visited, vec!["user", "log", "post", "role_assignments"]);
    assert_eq!(report.cascades_added, 3);
    assert_eq!(report.indexes_added, 4);
    assert_eq!(
        report.unrelated.get("user"),
        Some(&vec!["config".to_string()])
    );

    let constraints = executor.statements_containing("ADD CONSTRAINT");
    assert_eq!(
        constraints,
        vec![
            "ALTER TABLE \"log\" ADD CONSTRAINT \"user_log_use_ix\" FOREIGN KEY (\"userid\") REFERENCES \"user\" (id) ON DELETE CASCADE",
            "ALTER TABLE \"post\" ADD CONSTRAINT \"user_u_user\" FOREIGN KEY (\"userid\") REFERENCES \"user\" (id) ON DELETE CASCADE",
            "ALTER TABLE \"role_assignments\" ADD CONSTRAINT \"user_u_user\" FOREIGN KEY (\"userid\") REFERENCES \"user\" (id) ON DELETE CASCADE",
        ]
    );
    assert_eq!(session.reversal_log().len(), 7);
    session.revert().await;
}

#[tokio::test]
async fn revert_restores_index_and_constraint_set() {
    let executor = RecordingExecutor::new();
    let mut session = CascadeSession::new(&executor, live());

    session.execute_with_schema(moodle_schema(), "user").await;
    assert!(!net_objects(&executor.statements()).is_empty());

    let revert = session.revert().await;

    assert!(revert.is_clean());
    assert_eq!(revert.executed, 7);
    assert!(net_objects(&executor.statements()).is_empty());
    assert!(session.reversal_log().is_empty());

    let statements = executor.statements();
    assert_eq!(
        statements.last().map(String::as_str),
        Some("DROP INDEX IF EXISTS \"user_id_cascade_ix\"")
    );
}

#[tokio::test]
async fn executing_same_root_twice_is_a_no_op() {
    let executor = RecordingExecutor::new();
    let mut session = CascadeSession::new(&executor, live());

    session.execute_with_schema(moodle_schema(), "user").await;
    let issued = executor.statements().len();

    session.execute_with_schema(moodle_schema(), "user").await;

    assert_eq!(executor.statements().len(), issued);
    assert_eq!(session.report().cascades_added, 3);
    session.revert().await;
}

#[tokio::test]
async fn cycles_terminate_and_visit_each_parent_once() {
    let schema = Arc::new(Schema::new(
        "test",
        [
            Table::new("context")
                .with_field("id", "bigint")
                .with_field("parentcontext_id", "bigint")
                .with_field("course", "bigint"),
            Table::new("course")
                .with_field("id", "bigint")
                .with_field("contextid", "bigint"),
        ],
    ));
    let executor = RecordingExecutor::new();
    let mut session = CascadeSession::new(&executor, live());

    session.execute_with_schema(schema, "context").await;

    assert_eq!(session.report().visited, vec!["context", "course"]);
    assert_eq!(
        executor
            .statements_containing("CREATE INDEX \"context_id_cascade_ix\"")
            .len(),
        1
    );
    assert!(executor.statements_containing("parentcontext_id").is_empty());
    assert_eq!(session.report().cascades_added, 2);
    session.revert().await;
}

#[tokio::test]
async fn repairs_few_orphans_on_large_tables() {
    let executor = RecordingExecutor::new();
    executor
        .on(
            "SELECT COUNT(*) FROM \"log\" c WHERE c.\"userid\"",
            Response::Value(SqlValue::Int(40)),
        )
        .on_exact(
            "SELECT COUNT(*) FROM \"log\"",
            Response::Value(SqlValue::Int(1000)),
        )
        .on("DELETE FROM \"log\"", Response::Affected(40));
    let mut session = CascadeSession::new(&executor, live());

    session.execute_with_schema(moodle_schema(), "user").await;

    assert_eq!(executor.statements_containing("DELETE FROM \"log\"").len(), 1);
    assert_eq!(
        executor
            .statements_containing("ALTER TABLE \"log\" ADD CONSTRAINT")
            .len(),
        1
    );
    assert_eq!(session.report().orphans_deleted, 40);
    assert!(session.is_visited("log"));
    session.revert().await;
}

#[tokio::test]
async fn drops_edges_with_too_many_orphans() {
    let executor = RecordingExecutor::new();
    executor
        .on(
            "SELECT COUNT(*) FROM \"log\" c WHERE c.\"userid\"",
            Response::Value(SqlValue::Int(60)),
        )
        .on_exact(
            "SELECT COUNT(*) FROM \"log\"",
            Response::Value(SqlValue::Int(1000)),
        );
    let mut session = CascadeSession::new(&executor, live());

    session.execute_with_schema(moodle_schema(), "user").await;

    assert!(executor.statements_containing("DELETE FROM").is_empty());
    assert!(
        executor
            .statements_containing("ALTER TABLE \"log\" ADD CONSTRAINT")
            .is_empty()
    );
    assert!(!session.is_visited("log"));
    assert_eq!(session.report().rejections.integrity, 1);
    assert_eq!(session.report().cascades_added, 2);
    session.revert().await;
}

#[tokio::test]
async fn never_repairs_small_tables() {
    let executor = RecordingExecutor::new();
    executor
        .on(
            "SELECT COUNT(*) FROM \"post\" c WHERE c.\"userid\"",
            Response::Value(SqlValue::Int(1)),
        )
        .on_exact(
            "SELECT COUNT(*) FROM \"post\"",
            Response::Value(SqlValue::Int(50)),
        );
    let mut session = CascadeSession::new(&executor, live());

    session.execute_with_schema(moodle_schema(), "user").await;

    assert!(executor.statements_containing("DELETE FROM").is_empty());
    assert!(
        executor
            .statements_containing("ALTER TABLE \"post\" ADD CONSTRAINT")
            .is_empty()
    );
    assert_eq!(session.report().rejections.integrity, 1);
    session.revert().await;
}

#[tokio::test]
async fn dry_run_never_touches_the_database() {
    let executor = RecordingExecutor::new();
    let options = CleanOptions {
        dry_run: true,
        verbose: true,
        ..CleanOptions::default()
    };
    let mut session = CascadeSession::new(&executor, options);

    session.execute_with_schema(moodle_schema(), "user").await;

    assert!(executor.mutating_statements().is_empty());
    assert!(executor.statements().is_empty());
    let report = session.report();
    assert!(report.dry_run);
    assert_eq!(report.would_add_cascades, 3);
    assert_eq!(report.would_add_indexes, 4);
    assert_eq!(report.cascades_added, 0);
    assert!(session.reversal_log().is_empty());
}

#[tokio::test]
async fn rejected_edges_do_not_grow_the_graph() {
    let executor = RecordingExecutor::new();
    executor
        .on(
            "ALTER TABLE \"log\" ADD CONSTRAINT",
            Response::Fail(SqlError::type_mismatch("foreign key types are incompatible")),
        )
        .on(
            "FROM \"post\" c",
            Response::Fail(SqlError::missing_relation("relation \"post\" does not exist")),
        )
        .on(
            "ALTER TABLE \"role_assignments\" ADD CONSTRAINT",
            Response::Fail(SqlError::already_exists("constraint already exists")),
        );
    let mut session = CascadeSession::new(&executor, live());

    session.execute_with_schema(moodle_schema(), "user").await;

    let report = session.report();
    assert_eq!(report.visited, vec!["user"]);
    assert_eq!(report.cascades_added, 0);
    assert_eq!(report.rejections.type_mismatches, 1);
    assert_eq!(report.rejections.missing_relations, 1);
    assert_eq!(report.rejections.conflicts, 1);
    assert_eq!(report.rejections.total(), 3);
    assert_eq!(session.reversal_log().entries(), ["DROP INDEX IF EXISTS \"user_id_cascade_ix\""]);
    session.revert().await;
}

#[tokio::test]
async fn existing_index_is_not_recorded_for_undo() {
    let executor = RecordingExecutor::new();
    executor
        .on(
            "CREATE INDEX \"user_id_cascade_ix\"",
            Response::Fail(SqlError::already_exists("relation already exists")),
        )
        .on(
            "CREATE INDEX \"log_id_cascade_ix\"",
            Response::Fail(SqlError::other("out of shared memory")),
        );
    let mut session = CascadeSession::new(&executor, live());

    session.execute_with_schema(moodle_schema(), "user").await;

    let log = session.reversal_log();
    assert!(
        log.entries()
            .iter()
            .all(|sql| !sql.contains("user_id_cascade_ix") && !sql.contains("log_id_cascade_ix"))
    );
    assert_eq!(session.report().indexes_added, 2);
    assert_eq!(session.report().cascades_added, 3);
    session.revert().await;
}

#[tokio::test]
async fn depth_limit_stops_the_walk() {
    let executor = RecordingExecutor::new();
    let options = CleanOptions {
        max_depth: 0,
        ..CleanOptions::default()
    };
    let mut session = CascadeSession::new(&executor, options);

    session.execute_with_schema(moodle_schema(), "user").await;

    let report = session.report();
    assert_eq!(report.visited, vec!["user"]);
    assert_eq!(report.depth_limited, vec!["log", "post", "role_assignments"]);
    assert_eq!(report.cascades_added, 3);
    session.revert().await;
}

#[tokio::test]
async fn table_prefix_is_applied_to_physical_names() {
    let executor = RecordingExecutor::new();
    let options = CleanOptions {
        table_prefix: "mdl_".to_string(),
        ..CleanOptions::default()
    };
    let mut session = CascadeSession::new(&executor, options);

    session.execute_with_schema(moodle_schema(), "user").await;

    assert_eq!(
        executor.statements().first().map(String::as_str),
        Some("CREATE INDEX \"mdl_user_id_cascade_ix\" ON \"mdl_user\" (id)")
    );
    assert!(
        executor
            .statements_containing("REFERENCES \"mdl_user\" (id)")
            .iter()
            .all(|sql| sql.contains("ALTER TABLE \"mdl_"))
    );
    session.revert().await;
}
