//! A running simulation: node registry, message queue and tick scheduler
//! wired together.

use parking_lot::Mutex;
use std::io::{BufRead, Write};
use std::sync::Arc;
use ticksim_common::Tick;
use ticksim_registry::NodeRegistry;
use tracing::info;

use crate::config::SimConfig;
use crate::console::Console;
use crate::dispatch::{RegistryDispatcher, ReportSink};
use crate::error::{RunnerError, SchedulerError};
use crate::queue::MessageQueue;
use crate::scheduler::{spawn_scheduler, SchedulerHandle};

/// State left behind by a stopped simulation.
#[derive(Debug)]
pub struct ShutdownSummary {
    /// Final node state.
    pub registry: NodeRegistry,
    /// Tick the scheduler stopped on.
    pub final_tick: Tick,
    /// Messages that were queued but never delivered.
    pub pending: usize,
}

/// A simulation whose scheduler thread is running.
pub struct Simulation<S: ReportSink + 'static> {
    queue: Arc<MessageQueue>,
    scheduler: SchedulerHandle<RegistryDispatcher<S>>,
    node_count: usize,
}

impl<S: ReportSink + 'static> Simulation<S> {
    /// Create `node_count` nodes and start ticking.
    ///
    /// Delivery reports go to `sink`. A node table or queue too large to
    /// allocate is reported as an error.
    pub fn start(config: &SimConfig, node_count: usize, sink: S) -> Result<Self, RunnerError> {
        let registry = NodeRegistry::try_new(node_count, config.inbox_capacity)?;
        let queue = Arc::new(MessageQueue::try_new(config.queue_capacity)?);
        let dispatcher = RegistryDispatcher::new(registry, sink);
        let scheduler = spawn_scheduler(Arc::clone(&queue), dispatcher, config.scheduler_config())?;

        info!(
            nodes = node_count,
            queue_capacity = queue.capacity(),
            tick_ms = config.tick_ms,
            "simulation started"
        );

        Ok(Simulation {
            queue,
            scheduler,
            node_count,
        })
    }

    /// The shared message queue.
    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.queue
    }

    /// A console that feeds this simulation's queue.
    pub fn console(&self) -> Console {
        Console::new(Arc::clone(&self.queue), self.node_count)
    }

    /// Stop the scheduler, wait for its thread, and hand back the final
    /// node state.
    pub fn shutdown(self) -> Result<ShutdownSummary, SchedulerError> {
        let dispatcher = self.scheduler.shutdown()?;
        let (registry, _sink) = dispatcher.into_parts();
        let summary = ShutdownSummary {
            registry,
            final_tick: self.queue.current_tick(),
            pending: self.queue.len(),
        };
        info!(
            final_tick = %summary.final_tick,
            pending = summary.pending,
            "simulation stopped"
        );
        Ok(summary)
    }
}

/// A simulation that more than one party may stop, such as the console and
/// a Ctrl-C handler. Whoever stops it first gets the summary; later calls
/// find it already stopped.
pub struct SharedSimulation<S: ReportSink + 'static> {
    slot: Arc<Mutex<Option<Simulation<S>>>>,
}

impl<S: ReportSink + 'static> Clone for SharedSimulation<S> {
    fn clone(&self) -> Self {
        SharedSimulation {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<S: ReportSink + 'static> SharedSimulation<S> {
    /// Share a running simulation.
    pub fn new(sim: Simulation<S>) -> Self {
        SharedSimulation {
            slot: Arc::new(Mutex::new(Some(sim))),
        }
    }

    /// Stop the simulation and wait for the scheduler thread.
    ///
    /// Returns `None` if it was already stopped.
    pub fn stop(&self) -> Option<Result<ShutdownSummary, SchedulerError>> {
        let taken = self.slot.lock().take();
        taken.map(Simulation::shutdown)
    }

    /// Run the console loop, then stop the simulation however the loop
    /// ended, including on I/O errors.
    ///
    /// Returns `None` if something else stopped the simulation first.
    pub fn run_console<R: BufRead, W: Write>(
        &self,
        input: R,
        output: W,
    ) -> Result<Option<ShutdownSummary>, RunnerError> {
        let console = match self.slot.lock().as_ref() {
            Some(sim) => sim.console(),
            None => return Ok(None),
        };

        let ran = console.run(input, output);
        let stopped = self.stop().transpose();
        ran?;
        Ok(stopped?)
    }
}
