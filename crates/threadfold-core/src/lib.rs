#![forbid(unsafe_code)]

//! Render-budget allocation for large reply trees.
//!
//! Given one level of sibling replies and a budget of visible nodes, the
//! allocator decides which siblings are shown (and how deep), and which are
//! folded into "show N more" groups. Interaction is handled by [`collapse`]
//! and [`expand`]; structural changes to the sibling list go through
//! [`reconcile`], which keeps earlier decisions by id.
//!
//! Every operation is a pure function from one state array to the next.
//! [`FoldStore`] holds the current array for a level.

pub mod allocate;
pub mod collapse;
pub mod config;
pub mod error;
pub mod expand;
pub mod node;
pub mod reconcile;
pub mod state;
pub mod store;

pub use allocate::{allocate, ensure_unique_ids};
pub use collapse::collapse;
pub use config::FoldConfig;
pub use error::{ConfigError, FoldError};
pub use expand::{expand, expand_with};
pub use node::{Node, NodeId, own_size, total_size};
pub use reconcile::reconcile;
pub use state::{
    AllocParams, Budget, InvariantViolation, NodeState, check_invariants, hidden_total,
    visible_total,
};
pub use store::{FoldPersistState, FoldStore};
