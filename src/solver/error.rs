//! Configuration-time error taxonomy.
//!
//! Every failure is detected eagerly while the experiment configuration is
//! being derived, before anything reaches the external solver. Errors carry
//! enough context to locate the offending node or parameter; none of them is
//! fatal to the process — a caller may rebuild a run with corrected inputs.

use std::fmt;

use crate::solver::units::Dim;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A physical input was non-positive, non-finite, or otherwise outside
    /// its domain (also covers definition-text parse failures).
    InvalidParameter { name: String, detail: String },
    /// A derived quantity would divide by a degenerate value.
    DivisionByZero { name: &'static str },
    /// An expression-node identifier was added twice.
    DuplicateIdentifier { id: String },
    /// A node definition reads an identifier that was never added.
    UndefinedReference { node: String, missing: String },
    /// The expression-reference graph contains a cycle.
    CyclicDependency { cycle: Vec<String> },
    /// Two expressions of incompatible physical dimension were composed,
    /// or a node's inferred dimension disagrees with its declared one.
    DimensionMismatch {
        context: String,
        expected: Dim,
        found: Dim,
    },
    /// A run-plan phase was skipped or re-entered after completion.
    InvalidStateTransition {
        from: &'static str,
        to: &'static str,
    },
    /// The external solver rejected a name or handle. Never retried: the
    /// configuration calls are not idempotent against partial solver state.
    ExternalCollaborator { call: String, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidParameter { name, detail } => {
                write!(f, "invalid parameter {name}: {detail}")
            }
            ConfigError::DivisionByZero { name } => {
                write!(f, "division by zero deriving {name}")
            }
            ConfigError::DuplicateIdentifier { id } => {
                write!(f, "duplicate expression identifier '{id}'")
            }
            ConfigError::UndefinedReference { node, missing } => {
                write!(f, "node '{node}' references undefined '{missing}'")
            }
            ConfigError::CyclicDependency { cycle } => {
                write!(f, "cyclic expression dependency: {}", cycle.join(" -> "))
            }
            ConfigError::DimensionMismatch {
                context,
                expected,
                found,
            } => write!(
                f,
                "dimension mismatch in {context}: expected {expected}, found {found}"
            ),
            ConfigError::InvalidStateTransition { from, to } => {
                write!(f, "invalid run-plan transition {from} -> {to}")
            }
            ConfigError::ExternalCollaborator { call, message } => {
                write!(f, "solver rejected {call}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl ConfigError {
    pub fn invalid(name: impl Into<String>, detail: impl Into<String>) -> Self {
        ConfigError::InvalidParameter {
            name: name.into(),
            detail: detail.into(),
        }
    }
}
