use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::EdgeRejection;

/// Count of rejected candidate relationships by cause.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RejectionCounts {
    pub conflicts: u64,
    pub type_mismatches: u64,
    pub missing_relations: u64,
    pub integrity: u64,
    pub db_errors: u64,
}

impl RejectionCounts {
    pub fn record(&mut self, rejection: &EdgeRejection) {
        let counter = match rejection {
            EdgeRejection::Conflict(_) => &mut self.conflicts,
            EdgeRejection::TypeMismatch(_) => &mut self.type_mismatches,
            EdgeRejection::MissingRelation(_) => &mut self.missing_relations,
            EdgeRejection::Integrity { .. } => &mut self.integrity,
            EdgeRejection::Db(_) => &mut self.db_errors,
        };
        *counter += 1;
    }

    pub fn total(&self) -> u64 {
        self.conflicts + self.type_mismatches + self.missing_relations + self.integrity + self.db_errors
    }
}

/// Summary of a cascade session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CascadeReport {
    pub dry_run: bool,
    /// Tables processed as a parent, in visiting order.
    pub visited: Vec<String>,
    /// Tables left unconnected, per top-level root.
    pub unrelated: BTreeMap<String, Vec<String>>,
    /// Tables not walked because the depth limit was reached.
    pub depth_limited: Vec<String>,
    pub indexes_added: u64,
    pub cascades_added: u64,
    pub would_add_indexes: u64,
    pub would_add_cascades: u64,
    pub orphans_deleted: u64,
    pub rejections: RejectionCounts,
}
