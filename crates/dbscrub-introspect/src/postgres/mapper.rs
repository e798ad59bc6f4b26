use dbscrub_core::{Field, Index};

use crate::options::IntrospectOptions;

use super::queries::{RawColumn, RawIndex, RawTable};

/// A catalog table selected for loading.
pub struct SelectedTable {
    pub physical_name: String,
    pub logical_name: String,
}

/// Keep prefixed tables (and partitioned ones when enabled), stripping the prefix.
pub fn filter_tables(raw: Vec<RawTable>, opts: &IntrospectOptions) -> Vec<SelectedTable> {
    raw.into_iter()
        .filter(|table| opts.include_partitioned || table.relkind != "p")
        .filter_map(|table| {
            let logical = table.name.strip_prefix(opts.table_prefix.as_str())?;
            if logical.is_empty() {
                return None;
            }
            Some(SelectedTable {
                logical_name: logical.to_string(),
                physical_name: table.name,
            })
        })
        .collect()
}

pub fn map_fields(raw: Vec<RawColumn>) -> Vec<Field> {
    raw.into_iter()
        .map(|column| Field {
            name: column.name,
            field_type: column.data_type,
        })
        .collect()
}

/// Map plain column indexes; expression indexes cannot back a foreign key.
pub fn map_indexes(raw: Vec<RawIndex>) -> Vec<Index> {
    raw.into_iter()
        .filter(|index| !index.has_expression && !index.columns.is_empty())
        .map(|index| Index {
            name: index.name,
            fields: index.columns,
            unique: index.is_unique,
        })
        .collect()
}
