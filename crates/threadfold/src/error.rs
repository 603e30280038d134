//! Threadfold error model.
//!
//! Interaction on a well-formed thread never fails. The errors below are
//! contract violations by the tree supplier or bad configuration, and each
//! one maps to a [`Recovery`] so the caller can keep the page up.

use std::fmt;
use threadfold_core::{ConfigError, FoldError};

/// Top-level error type.
#[derive(Debug)]
pub enum Error {
    /// A sibling list broke the input contract.
    Fold(FoldError),
    /// A configuration value was rejected.
    Config(ConfigError),
    /// The logging backend could not be installed.
    Telemetry(String),
}

/// What a caller should do instead of failing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Keep showing the previous view state.
    KeepPreviousView,
    /// Fall back to default configuration.
    UseDefaults,
    /// Continue without structured logs.
    ContinueUnlogged,
}

impl Error {
    #[must_use]
    pub fn recovery(&self) -> Recovery {
        match self {
            Self::Fold(FoldError::DuplicateId { .. } | FoldError::DuplicateThreadId { .. }) => {
                Recovery::KeepPreviousView
            }
            Self::Config(ConfigError::InvalidValue { .. }) => Recovery::UseDefaults,
            Self::Telemetry(_) => Recovery::ContinueUnlogged,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fold(err) => write!(f, "fold error: {err}"),
            Self::Config(err) => write!(f, "config error: {err}"),
            Self::Telemetry(msg) => write!(f, "telemetry error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Fold(err) => Some(err),
            Self::Config(err) => Some(err),
            Self::Telemetry(_) => None,
        }
    }
}

impl From<FoldError> for Error {
    fn from(err: FoldError) -> Self {
        Self::Fold(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

/// Standard result type for threadfold APIs.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use threadfold_core::NodeId;

    #[test]
    fn fold_errors_keep_previous_view() {
        let err: Error = FoldError::DuplicateId {
            id: NodeId::from("x"),
            first: 1,
            second: 2,
        }
        .into();
        assert_eq!(err.recovery(), Recovery::KeepPreviousView);
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("fold error: duplicate sibling id 'x'"));
    }

    #[test]
    fn config_errors_use_defaults() {
        let err: Error = ConfigError::InvalidValue {
            key: "THREADFOLD_BUDGET",
            value: "lots".into(),
            reason: "expected a non-negative integer or 'unlimited'",
        }
        .into();
        assert_eq!(err.recovery(), Recovery::UseDefaults);
    }

    #[test]
    fn telemetry_errors_have_no_source() {
        let err = Error::Telemetry("already installed".into());
        assert_eq!(err.recovery(), Recovery::ContinueUnlogged);
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "telemetry error: already installed");
    }
}
