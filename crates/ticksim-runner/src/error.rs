//! Error types for the runner.

use std::collections::TryReserveError;
use std::path::PathBuf;
use thiserror::Error;
use ticksim_cli_protocol::CliError;
use ticksim_registry::RegistryError;

/// Errors returned by [`MessageQueue`](crate::MessageQueue).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Inserting would make the tail collide with the head.
    #[error("Message queue full! ({held} messages pending)")]
    Full {
        /// Number of messages the queue can hold (capacity minus the reserved slot).
        held: usize,
    },

    /// The ring slots could not be allocated.
    #[error("failed to allocate a message queue of {capacity} slots: {source}")]
    Alloc {
        /// Requested number of slots.
        capacity: usize,
        /// Underlying error.
        #[source]
        source: TryReserveError,
    },
}

/// Errors from starting or stopping the tick scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The OS refused to create a thread.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        /// Thread name.
        name: &'static str,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The scheduler thread panicked outside of a message handler.
    #[error("scheduler thread panicked: {0}")]
    Panicked(String),
}

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid YAML for [`SimConfig`](crate::SimConfig).
    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Fatal errors that end the process.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The startup node count could not be parsed.
    #[error(transparent)]
    Cli(#[from] CliError),

    /// The node table could not be built.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The message queue could not be built.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Scheduler failure.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Console I/O failure.
    #[error("console I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The Ctrl-C handler could not be installed.
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}
