//! # Notewell Document Model
//!
//! Immutable document tree plus the machinery for changing it: positions,
//! slices, the generic replace algorithm, and transactions that record
//! every step with a position map.
//!
//! ```text
//!
//!  Transaction ──▶ Step ──▶ replace() ──▶ new Node tree
//!       │           │
//!       │           └──▶ StepMap (position carrying)
//!       │
//!       └──▶ Selection / stored marks / metadata
//!
//!  Schema validates every rebuilt parent, so an invalid document can
//!  never escape a step.
//!
//! ```
//!
//! Documents are persistent: a step rebuilds the spine above the edit and
//! shares every untouched branch with the previous version, so keeping
//! old versions around (undo history, per-step snapshots) is cheap.

pub mod error;
pub mod id;
pub mod node;
pub mod position;
pub mod replace;
pub mod schema;
pub mod selection;
pub mod slice;
pub mod step;
pub mod transaction;

pub use error::ModelError;
pub use id::{session_seed, IdGenerator};
pub use node::{Attrs, Fragment, Mark, Node, NodeBody, ID_ATTR};
pub use position::{resolve, ResolvedPos};
pub use schema::{attrs, marks, types, ContentRule, ListKind, NodeKind, Schema};
pub use selection::Selection;
pub use slice::{slice_range, Slice};
pub use step::{Assoc, Step, StepMap};
pub use transaction::Transaction;
