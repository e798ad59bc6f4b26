use std::str::FromStr;

use anyhow::{Context, Result};
use dbscrub_core::CleanOptions;
use dbscrub_introspect::PgExecutor;
use dbscrub_scramble::{ScrambleRequest, Scrambler};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

const NAMESPACE: &str = "dbscrub_it_scramble";

fn database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
}

async fn connect() -> Result<Option<PgPool>> {
    let Some(db_url) = database_url() else {
        eprintln!("skipping: set TEST_DATABASE_URL or DATABASE_URL for integration tests");
        return Ok(None);
    };
    let options = PgConnectOptions::from_str(&db_url)
        .context("parsing database url")?
        .options([("search_path", NAMESPACE)]);
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(10))
        .connect_with(options)
        .await
        .context("connecting to Postgres")?;
    Ok(Some(pool))
}

async fn reset_fixtures(pool: &PgPool) -> Result<()> {
    let script = format!(
        r#"
        drop schema if exists {NAMESPACE} cascade;
        create schema {NAMESPACE};
        create table {NAMESPACE}.people (id bigint primary key, firstname text, lastname text);
        insert into {NAMESPACE}.people values
          (1, 'Ann', 'Lee'), (2, 'Ann', 'Lee'), (3, 'Ann', 'Moe'), (4, 'Bob', 'Moe'),
          (5, 'Bob', 'Ng'), (6, 'Bob', 'Ng'), (7, 'Cy', 'Zed'), (8, 'Cy', 'Zed');
        create table {NAMESPACE}.crew (id bigint primary key, firstname text, lastname text);
        insert into {NAMESPACE}.crew values
          (1, 'Ann', 'Ng'), (2, 'Ann', 'Ng'), (3, 'Ann', 'Moe'), (4, 'Ann', 'Moe'),
          (5, 'Ann', 'Lee'), (6, 'Bob', 'Lee')
        "#
    );
    for statement in script.split(';') {
        let sql = statement.trim();
        if sql.is_empty() {
            continue;
        }
        sqlx::query(sql)
            .execute(pool)
            .await
            .with_context(|| format!("executing fixture statement: {sql}"))?;
    }
    Ok(())
}

async fn rows_of(pool: &PgPool, table: &str) -> Result<Vec<(i64, String, String)>> {
    Ok(
        sqlx::query_as(&format!("select id, firstname, lastname from {table} order by id"))
            .fetch_all(pool)
            .await?,
    )
}

fn sorted(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values
}

#[tokio::test]
async fn scrambles_only_requested_rows() -> Result<()> {
    let Some(pool) = connect().await? else {
        return Ok(());
    };
    reset_fixtures(&pool).await?;
    let before = rows_of(&pool, "people").await?;

    let executor = PgExecutor::new(pool.clone());
    let request = ScrambleRequest::new("people", ["firstname", "lastname"]).change_only(1..=6);
    let report = Scrambler::new(&executor, CleanOptions::default())
        .execute(&request)
        .await?;

    assert_eq!(report.rows, 6);
    assert_eq!(report.factors, vec![2, 3]);
    assert_eq!(report.distinct_per_field, vec![2, 3]);
    assert_eq!(report.updated, 6);

    let after = rows_of(&pool, "people").await?;
    assert_eq!(&after[6..], &before[6..]);

    let column = |rows: &[(i64, String, String)], pick: fn(&(i64, String, String)) -> String| {
        sorted(rows[..6].iter().map(pick).collect())
    };
    assert_eq!(column(&before, |row| row.1.clone()), column(&after, |row| row.1.clone()));
    assert_eq!(column(&before, |row| row.2.clone()), column(&after, |row| row.2.clone()));
    assert_ne!(&after[..6], &before[..6]);

    let crew_before = rows_of(&pool, "crew").await?;
    let report = Scrambler::new(&executor, CleanOptions::default())
        .execute(&ScrambleRequest::new("crew", ["firstname", "lastname"]))
        .await?;
    assert_eq!(report.distinct_per_field, vec![2, 3]);
    assert_eq!(report.updated, 6);

    let crew_after = rows_of(&pool, "crew").await?;
    let all = |rows: &[(i64, String, String)], pick: fn(&(i64, String, String)) -> String| {
        sorted(rows.iter().map(pick).collect())
    };
    assert_eq!(all(&crew_before, |row| row.1.clone()), all(&crew_after, |row| row.1.clone()));
    assert_eq!(all(&crew_before, |row| row.2.clone()), all(&crew_after, |row| row.2.clone()));
    assert_eq!(crew_after[5], (6, "Bob".to_string(), "Ng".to_string()));

    let leftovers: i64 = sqlx::query_scalar(
        "select count(*) from pg_tables where schemaname = $1 and tablename like '%\\_scramble\\_%'",
    )
    .bind(NAMESPACE)
    .fetch_one(&pool)
    .await?;
    assert_eq!(leftovers, 0);
    Ok(())
}
