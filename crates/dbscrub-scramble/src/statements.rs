//! SQL text for the scramble phases.

use dbscrub_core::{CleanOptions, quote_ident, truncate_identifier};

/// One staged field: its staging table and the prime ordering its slots.
pub struct Staged<'a> {
    pub field: &'a str,
    pub table: &'a str,
    pub prime: u64,
}

pub fn staging_table_name(options: &CleanOptions, table: &str, position: usize) -> String {
    truncate_identifier(&format!("{}_scramble_{position}", options.physical_name(table)))
}

fn id_filter(filtered: bool) -> &'static str {
    if filtered { " WHERE id = ANY($1)" } else { "" }
}

pub fn count_rows(options: &CleanOptions, table: &str, filtered: bool) -> String {
    format!(
        "SELECT COUNT(*) FROM {}{}",
        options.table_ident(table),
        id_filter(filtered)
    )
}

pub fn drop_staging(staging: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(staging))
}

/// Empty staging table typed after the source column.
pub fn create_staging(options: &CleanOptions, table: &str, field: &str, staging: &str) -> String {
    format!(
        "CREATE UNLOGGED TABLE {} AS SELECT 0::bigint AS idx, {} AS value FROM {} WITH NO DATA",
        quote_ident(staging),
        quote_ident(field),
        options.table_ident(table)
    )
}

/// Stage every in-scope value, duplicates included, numbered from 0 in
/// value order (ties broken by id).
pub fn fill_staging(
    options: &CleanOptions,
    table: &str,
    field: &str,
    staging: &str,
    filtered: bool,
) -> String {
    let field = quote_ident(field);
    format!(
        "INSERT INTO {} (idx, value) SELECT ROW_NUMBER() OVER (ORDER BY {field}, id) - 1, {field} FROM {}{}",
        quote_ident(staging),
        options.table_ident(table),
        id_filter(filtered)
    )
}

pub fn count_distinct_staged(staging: &str) -> String {
    format!("SELECT COUNT(DISTINCT value) FROM {}", quote_ident(staging))
}

/// Rewrite every in-scope row with the staged values at its slots.
///
/// Field `i` orders the row ordinals by `(rn % prime_i, rn)`; a row's rank in
/// that order is the slot it reads. Each ordering is a permutation of the
/// ordinals, so every staged value is written exactly once.
pub fn recombine(options: &CleanOptions, table: &str, staged: &[Staged<'_>], filtered: bool) -> String {
    let target = options.table_ident(table);
    let assignments = staged
        .iter()
        .enumerate()
        .map(|(i, stage)| format!("{} = s{i}.value", quote_ident(stage.field)))
        .collect::<Vec<_>>()
        .join(", ");
    let slots = staged
        .iter()
        .enumerate()
        .map(|(i, stage)| {
            format!(
                ", ROW_NUMBER() OVER (ORDER BY rn % {}, rn) - 1 AS slot{i}",
                stage.prime.max(1)
            )
        })
        .collect::<String>();
    let joins = staged
        .iter()
        .enumerate()
        .map(|(i, stage)| format!(" JOIN {} s{i} ON s{i}.idx = o.slot{i}", quote_ident(stage.table)))
        .collect::<String>();

    format!(
        "UPDATE {target} t SET {assignments} FROM (SELECT id{slots} FROM (SELECT id, ROW_NUMBER() OVER (ORDER BY id) - 1 AS rn FROM {target}{}) r) o{joins} WHERE t.id = o.id",
        id_filter(filtered)
    )
}
