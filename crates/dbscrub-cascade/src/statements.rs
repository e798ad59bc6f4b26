//! SQL text for every statement the builder issues.

use dbscrub_core::{CleanOptions, quote_ident, truncate_identifier};

/// A forward statement paired with the statement that undoes it.
pub struct Reversible {
    pub apply: String,
    pub undo: String,
}

pub fn id_index_name(options: &CleanOptions, table: &str) -> String {
    truncate_identifier(&format!("{}_id_cascade_ix", options.physical_name(table)))
}

pub fn create_id_index(options: &CleanOptions, table: &str) -> Reversible {
    let index = quote_ident(&id_index_name(options, table));
    Reversible {
        apply: format!("CREATE INDEX {index} ON {} (id)", options.table_ident(table)),
        undo: format!("DROP INDEX IF EXISTS {index}"),
    }
}

/// Rows of `child` whose non-null `field` matches no `parent.id`.
fn orphan_predicate(options: &CleanOptions, parent: &str, field: &str) -> String {
    let field = quote_ident(field);
    format!(
        "c.{field} IS NOT NULL AND NOT EXISTS (SELECT 1 FROM {} p WHERE p.id = c.{field})",
        options.table_ident(parent)
    )
}

pub fn count_orphans(options: &CleanOptions, parent: &str, child: &str, field: &str) -> String {
    format!(
        "SELECT COUNT(*) FROM {} c WHERE {}",
        options.table_ident(child),
        orphan_predicate(options, parent, field)
    )
}

pub fn count_rows(options: &CleanOptions, table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", options.table_ident(table))
}

pub fn delete_orphans(options: &CleanOptions, parent: &str, child: &str, field: &str) -> String {
    format!(
        "DELETE FROM {} c WHERE {}",
        options.table_ident(child),
        orphan_predicate(options, parent, field)
    )
}

pub fn constraint_name(parent: &str, index_name: &str) -> String {
    truncate_identifier(&format!("{parent}_{index_name}"))
}

pub fn add_cascade_constraint(
    options: &CleanOptions,
    parent: &str,
    child: &str,
    field: &str,
    constraint: &str,
) -> Reversible {
    let child_ident = options.table_ident(child);
    let constraint = quote_ident(constraint);
    Reversible {
        apply: format!(
            "ALTER TABLE {child_ident} ADD CONSTRAINT {constraint} FOREIGN KEY ({}) REFERENCES {} (id) ON DELETE CASCADE",
            quote_ident(field),
            options.table_ident(parent)
        ),
        undo: format!("ALTER TABLE {child_ident} DROP CONSTRAINT IF EXISTS {constraint}"),
    }
}
