//! Validation and configuration errors.
//!
//! Normal interaction never fails: unknown ids are no-ops and pin conflicts
//! relax the budget by one. Errors here are caller contract violations,
//! rejected before any state is produced.

use crate::node::NodeId;
use std::fmt;

/// Rejected sibling input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoldError {
    /// Two siblings in one level share an id.
    DuplicateId {
        id: NodeId,
        first: usize,
        second: usize,
    },
    /// Two nodes in different levels of one thread share an id. `None`
    /// parents are roots.
    DuplicateThreadId {
        id: NodeId,
        first_parent: Option<NodeId>,
        second_parent: Option<NodeId>,
    },
}

struct ParentLabel<'a>(&'a Option<NodeId>);

impl fmt::Display for ParentLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "'{id}'"),
            None => f.write_str("the root level"),
        }
    }
}

impl fmt::Display for FoldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId { id, first, second } => write!(
                f,
                "duplicate sibling id '{id}' at positions {first} and {second}"
            ),
            Self::DuplicateThreadId {
                id,
                first_parent,
                second_parent,
            } => write!(
                f,
                "duplicate thread id '{id}' under {} and {}",
                ParentLabel(first_parent),
                ParentLabel(second_parent)
            ),
        }
    }
}

impl std::error::Error for FoldError {}

/// Rejected configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A key was set to a value that cannot be used.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value '{value}' for {key}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
