//! Automatic cascade-delete graph builder.
//!
//! Starting from a root table, the builder infers likely foreign keys from
//! field naming conventions, verifies referential integrity, adds real
//! `ON DELETE CASCADE` constraints and spreads through the schema graph.
//! Every structural change is recorded in a [`ReversalLog`] so it can be
//! undone once the bulk deletes relying on the cascades have run.

pub mod error;
pub mod heuristic;
pub mod report;
pub mod reversal;
pub mod scope;
pub mod session;
mod statements;

pub use error::{CascadeError, EdgeRejection};
pub use heuristic::{RelationshipHeuristic, checks_for_parent, field_matches};
pub use report::{CascadeReport, RejectionCounts};
pub use reversal::{ReversalLog, RevertReport, UndoFailure};
pub use scope::{CascadeOutcome, with_cascade_deletes, with_cascade_deletes_until};
pub use session::{CascadeSession, orphans_repairable};
