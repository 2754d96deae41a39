//! Simulation configuration.
//!
//! Settings come from three layers, later layers overriding earlier ones:
//!
//! 1. Built-in defaults ([`SimConfig::default`])
//! 2. An optional YAML file (`--config sim.yaml`)
//! 3. Command-line flags
//!
//! ## YAML Format
//!
//! ```yaml
//! nodes: 3
//! tick_ms: 10
//! queue_capacity: 100
//! inbox_capacity: 10
//! watchdog_ms: 250
//! ```
//!
//! Every key is optional. When `nodes` is absent from both the file and the
//! command line, the console prompts for it at startup.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use ticksim_registry::{DEFAULT_INBOX_CAPACITY, MAX_NODES};

use crate::error::ConfigError;
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use crate::scheduler::{SchedulerConfig, DEFAULT_TICK_QUANTUM};

/// Simulation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Number of nodes. `None` means ask the operator.
    pub nodes: Option<usize>,
    /// Wall-clock milliseconds per tick.
    pub tick_ms: u64,
    /// Ring slots in the message queue (one is kept free).
    pub queue_capacity: usize,
    /// Messages each inbox holds.
    pub inbox_capacity: usize,
    /// Slow-handler warning threshold in milliseconds.
    pub watchdog_ms: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            nodes: None,
            tick_ms: DEFAULT_TICK_QUANTUM.as_millis() as u64,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            watchdog_ms: None,
        }
    }
}

impl SimConfig {
    /// Parse a config from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a config from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.nodes {
            Some(0) => return Err(ConfigError::Invalid("nodes must be at least 1".to_string())),
            Some(n) if n > MAX_NODES => {
                return Err(ConfigError::Invalid(format!(
                    "nodes must be at most {}, got {}",
                    MAX_NODES, n
                )))
            }
            _ => {}
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick_ms must be at least 1".to_string()));
        }
        if self.queue_capacity < 2 {
            return Err(ConfigError::Invalid(format!(
                "queue_capacity must be at least 2, got {}",
                self.queue_capacity
            )));
        }
        if self.inbox_capacity == 0 {
            return Err(ConfigError::Invalid("inbox_capacity must be at least 1".to_string()));
        }
        if self.watchdog_ms == Some(0) {
            return Err(ConfigError::Invalid("watchdog_ms must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Wall-clock length of one tick.
    pub fn tick_quantum(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Scheduler settings derived from this config.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let config = SchedulerConfig::with_quantum(self.tick_quantum());
        match self.watchdog_ms {
            Some(ms) => config.with_watchdog(Duration::from_millis(ms)),
            None => config,
        }
    }
}

/// Command-line arguments for the `ticksim` binary.
#[derive(Debug, Parser)]
#[command(name = "ticksim", version, about = "Discrete-tick node network simulator")]
pub struct Cli {
    /// Number of nodes to spawn (prompted for if omitted).
    #[arg(short, long)]
    pub nodes: Option<usize>,

    /// Milliseconds per tick.
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Ring slots in the message queue.
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Messages each inbox holds.
    #[arg(long)]
    pub inbox_capacity: Option<usize>,

    /// Warn when a message handler runs longer than this many milliseconds.
    #[arg(long)]
    pub watchdog_ms: Option<u64>,

    /// YAML config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Build the effective config: file values overridden by flags.
    pub fn resolve(&self) -> Result<SimConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => SimConfig::load(path)?,
            None => SimConfig::default(),
        };

        if let Some(nodes) = self.nodes {
            config.nodes = Some(nodes);
        }
        if let Some(tick_ms) = self.tick_ms {
            config.tick_ms = tick_ms;
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        if let Some(capacity) = self.inbox_capacity {
            config.inbox_capacity = capacity;
        }
        if let Some(ms) = self.watchdog_ms {
            config.watchdog_ms = Some(ms);
        }

        config.validate()?;
        Ok(config)
    }

    /// Default log filter for the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.nodes, None);
        assert_eq!(config.tick_ms, 10);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.inbox_capacity, 10);
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler_config(), SchedulerConfig::default());
    }

    #[test]
    fn test_yaml_partial() {
        let config = SimConfig::from_yaml_str("nodes: 3\nwatchdog_ms: 250\n").unwrap();
        assert_eq!(config.nodes, Some(3));
        assert_eq!(config.tick_ms, 10);
        assert_eq!(
            config.scheduler_config().watchdog_timeout,
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_yaml_unknown_key_rejected() {
        let err = SimConfig::from_yaml_str("nodez: 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            SimConfig { nodes: Some(0), ..Default::default() },
            SimConfig { nodes: Some(usize::MAX), ..Default::default() },
            SimConfig { tick_ms: 0, ..Default::default() },
            SimConfig { queue_capacity: 1, ..Default::default() },
            SimConfig { inbox_capacity: 0, ..Default::default() },
            SimConfig { watchdog_ms: Some(0), ..Default::default() },
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "expected {:?} to be invalid",
                config
            );
        }
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from(["ticksim", "--nodes", "4", "--tick-ms", "5", "-vv"]).unwrap();
        let config = cli.resolve().unwrap();
        assert_eq!(config.nodes, Some(4));
        assert_eq!(config.tick_quantum(), Duration::from_millis(5));
        assert_eq!(cli.log_filter(), "trace");
    }

    #[test]
    fn test_cli_rejects_invalid_capacity() {
        let cli = Cli::try_parse_from(["ticksim", "--queue-capacity", "1"]).unwrap();
        assert!(matches!(cli.resolve(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_cli_rejects_node_count_beyond_id_range() {
        let cli = Cli::try_parse_from(["ticksim", "--nodes", "18446744073709551615"]).unwrap();
        let err = cli.resolve().unwrap_err();
        assert!(err.to_string().contains("nodes must be at most"));
    }

    #[test]
    fn test_missing_config_file() {
        let cli = Cli::try_parse_from(["ticksim", "--config", "/nonexistent/ticksim.yaml"]).unwrap();
        assert!(matches!(cli.resolve(), Err(ConfigError::Io { .. })));
    }
}
