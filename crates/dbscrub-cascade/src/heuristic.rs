use std::collections::BTreeMap;

/// Known alternative names child tables use when referencing a parent.
const DEFAULT_ALIASES: &[(&str, &[&str])] = &[
    ("user", &["student", "appraiser", "manager", "reportsto"]),
    ("course", &["courses"]),
    ("assign", &["assignment"]),
    ("course_sections", &["section"]),
    ("course_modules", &["coursemodule"]),
    ("grade_grades", &["grade"]),
    ("context", &["parentcontext"]),
];

/// Suffixes a child field may append to a parent name.
const FIELD_SUFFIXES: [&str; 3] = ["id", "instance", "_id"];

/// Table-name to field-name alias map used to spot candidate foreign keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipHeuristic {
    aliases: BTreeMap<String, Vec<String>>,
}

impl Default for RelationshipHeuristic {
    fn default() -> Self {
        let aliases = DEFAULT_ALIASES
            .iter()
            .map(|(parent, names)| {
                (
                    parent.to_string(),
                    names.iter().map(|name| name.to_string()).collect(),
                )
            })
            .collect();
        Self { aliases }
    }
}

impl RelationshipHeuristic {
    /// Heuristic with no aliases at all: fields must be named after the parent.
    pub fn without_aliases() -> Self {
        Self {
            aliases: BTreeMap::new(),
        }
    }

    /// Accept `alias` as another base name for fields referencing `parent`.
    pub fn with_alias(mut self, parent: impl Into<String>, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        let entry = self.aliases.entry(parent.into()).or_default();
        if !entry.contains(&alias) {
            entry.push(alias);
        }
        self
    }

    /// Base names a child field referencing `parent` may be named after.
    pub fn checks_for_parent(&self, parent: &str) -> Vec<String> {
        let mut checks = vec![parent.to_string()];
        if let Some(aliases) = self.aliases.get(parent) {
            checks.extend(aliases.iter().cloned());
        }
        checks
    }
}

/// [`RelationshipHeuristic::checks_for_parent`] with the default aliases.
pub fn checks_for_parent(parent: &str) -> Vec<String> {
    RelationshipHeuristic::default().checks_for_parent(parent)
}

/// True iff `field` is exactly a check, or a check followed by `id`,
/// `instance` or `_id`. Case-sensitive.
pub fn field_matches(checks: &[String], field: &str) -> bool {
    checks.iter().any(|check| match field.strip_prefix(check.as_str()) {
        Some("") => true,
        Some(rest) => FIELD_SUFFIXES.contains(&rest),
        None => false,
    })
}
