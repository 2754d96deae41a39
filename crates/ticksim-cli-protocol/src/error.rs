//! Error types for the console protocol.

use thiserror::Error;

/// Errors produced while parsing an operator line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CliError {
    /// The line was blank.
    #[error("empty command")]
    Empty,

    /// A known verb with malformed or out-of-range arguments.
    #[error("Usage: {usage}")]
    Usage {
        /// Argument synopsis for the verb, e.g. `show <node_id>`.
        usage: &'static str,
    },

    /// The verb is not recognised.
    #[error("Unknown command. Try: {}", crate::VERBS.join(", "))]
    UnknownCommand(String),

    /// The startup node count was not an integer between 1 and `u32::MAX`.
    #[error("invalid node count: {0:?}")]
    InvalidNodeCount(String),
}

/// Result type alias for console parsing.
pub type CliResult<T> = Result<T, CliError>;
