//! Day / ISO week / quarter scopes for a notes and tasks tracker, and the
//! stapler that groups scope-tagged records into a collapsible report tree.

pub mod errors;
pub mod models;
pub mod navigator;
pub mod outline;
pub mod stapler;
pub mod telemetry;
pub mod time_scope;

pub use errors::{ScopeError, ScopeResult};
pub use models::{note_stapler, Note, NoteKind, NoteOrder};
pub use navigator::{ancestor_at, children, lineage, minimize, next, parent, prev};
pub use outline::render_outline;
pub use stapler::{PlacementWarning, ScopeNode, ScopeSource, ScopeTree, Stapler, StaplerConfig};
pub use telemetry::init_tracing;
pub use time_scope::{Granularity, TimeScope};
