#![forbid(unsafe_code)]

//! Threadfold public facade.
//!
//! Re-exports the per-level fold operations from `threadfold-core` and adds
//! [`ThreadView`], which drives one fold store per visible level of a reply
//! tree and flattens the result into render rows.

pub mod error;
#[cfg(feature = "tracing-json")]
pub mod telemetry;
pub mod view;

pub use error::{Error, Recovery, Result};
pub use view::{Row, ThreadView};

// --- Core re-exports -------------------------------------------------------

pub use threadfold_core::{
    AllocParams, Budget, ConfigError, FoldConfig, FoldError, FoldPersistState, FoldStore,
    InvariantViolation, Node, NodeId, NodeState, allocate, check_invariants, collapse,
    ensure_unique_ids, expand, expand_with, hidden_total, reconcile, visible_total,
};

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Budget, Error, FoldConfig, FoldStore, Node, NodeId, NodeState, Result, Row, ThreadView,
    };
}
