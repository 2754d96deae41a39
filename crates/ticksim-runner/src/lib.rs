//! Tick-driven node network simulator.
//!
//! Commands typed at the [`Console`] become [`Message`]s in a bounded
//! [`MessageQueue`]. A scheduler thread advances a global tick every quantum
//! and delivers each message due on that tick to a [`Dispatcher`], which in
//! the full simulation applies it to the node registry.
//!
//! ## Example
//!
//! ```no_run
//! use ticksim_runner::{ConsoleSink, SimConfig, Simulation};
//!
//! let config = SimConfig::default();
//! let sim = Simulation::start(&config, 3, ConsoleSink::new(std::io::stdout())).unwrap();
//! sim.console().run(std::io::stdin().lock(), std::io::stdout()).unwrap();
//! let summary = sim.shutdown().unwrap();
//! println!("stopped at tick {}", summary.final_tick);
//! ```
//!
//! [`Message`]: ticksim_common::Message

pub mod config;
pub mod console;
pub mod dispatch;
pub mod error;
pub mod queue;
pub mod scheduler;
pub mod simulation;
pub mod watchdog;

pub use config::{Cli, SimConfig};
pub use console::{enqueue_command, Console, LineOutcome, PROMPT};
pub use dispatch::{ConsoleSink, Dispatcher, RegistryDispatcher, Report, ReportSink};
pub use error::{ConfigError, QueueError, RunnerError, SchedulerError};
pub use queue::{MessageQueue, DEFAULT_QUEUE_CAPACITY};
pub use scheduler::{
    spawn_scheduler, SchedulerConfig, SchedulerHandle, SchedulerState, DEFAULT_TICK_QUANTUM,
};
pub use simulation::{SharedSimulation, ShutdownSummary, Simulation};
pub use watchdog::{DeliveryInfo, Watchdog, WatchdogState};
