//! Tick scheduler: the consumer side of the message queue.
//!
//! The scheduler runs on its own thread. Every tick quantum it advances the
//! global tick counter and drains due messages from the [`MessageQueue`] into
//! a [`Dispatcher`].
//!
//! ## State Machine
//!
//! ```text
//! Running --shutdown()--> Stopping --loop exits--> Stopped
//! ```
//!
//! The loop waits on both a ticker and a shutdown channel, so a shutdown
//! request is seen immediately rather than after the next tick. The state is
//! also checked at the top of each iteration, so no tick starts once a
//! shutdown has been requested. A delivery that is already in progress always
//! runs to completion.
//!
//! ## Handler Failures
//!
//! Each handler call is wrapped in `catch_unwind`. A panicking handler is
//! logged and counted, and delivery continues with the next message; the
//! panicking message is not retried.

use crossbeam_channel::{select, tick, Receiver, Sender};
use metrics::{counter, histogram};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use ticksim_common::{Message, Tick};
use ticksim_metrics::metric_defs;
use tracing::{debug, error, info, trace};

use crate::dispatch::Dispatcher;
use crate::error::SchedulerError;
use crate::queue::MessageQueue;
use crate::watchdog::{Watchdog, WatchdogState};

/// Default wall-clock length of one tick.
pub const DEFAULT_TICK_QUANTUM: Duration = Duration::from_millis(10);

/// Configuration for the tick scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Wall-clock time per tick.
    pub tick_quantum: Duration,
    /// Warn when a single handler runs longer than this. `None` disables the
    /// watchdog.
    pub watchdog_timeout: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            tick_quantum: DEFAULT_TICK_QUANTUM,
            watchdog_timeout: None,
        }
    }
}

impl SchedulerConfig {
    /// Create a config with the given tick quantum.
    pub fn with_quantum(tick_quantum: Duration) -> Self {
        assert!(!tick_quantum.is_zero(), "Tick quantum must be positive");
        SchedulerConfig {
            tick_quantum,
            ..Default::default()
        }
    }

    /// Enable the slow-handler watchdog.
    pub fn with_watchdog(mut self, timeout: Duration) -> Self {
        self.watchdog_timeout = Some(timeout);
        self
    }
}

/// Lifecycle of the scheduler thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerState {
    /// Ticking and delivering.
    Running = 0,
    /// Shutdown requested; the loop has not exited yet.
    Stopping = 1,
    /// The loop has exited.
    Stopped = 2,
}

impl SchedulerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SchedulerState::Running,
            1 => SchedulerState::Stopping,
            _ => SchedulerState::Stopped,
        }
    }
}

/// State shared between the handle and the scheduler thread.
#[derive(Debug)]
struct Shared {
    state: AtomicU8,
}

impl Shared {
    fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Move Running -> Stopping. Returns false if already past Running.
    fn request_stop(&self) -> bool {
        self.state
            .compare_exchange(
                SchedulerState::Running as u8,
                SchedulerState::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

/// Handle to a running tick scheduler.
///
/// Dropping the handle requests shutdown but does not wait for the thread;
/// call [`SchedulerHandle::shutdown`] to stop and join it.
pub struct SchedulerHandle<D> {
    shared: Arc<Shared>,
    shutdown_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<D>>,
    watchdog: Option<Watchdog>,
}

impl<D> SchedulerHandle<D> {
    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.shared.state()
    }

    /// Request shutdown without waiting.
    pub fn request_shutdown(&mut self) {
        if self.shared.request_stop() {
            debug!("scheduler shutdown requested");
        }
        // Disconnecting the channel wakes the loop immediately.
        self.shutdown_tx.take();
    }

    /// Stop the scheduler and wait for its thread to exit.
    ///
    /// Returns the dispatcher so the caller can reclaim whatever state it
    /// owns. Messages still in the queue are left undelivered.
    pub fn shutdown(mut self) -> Result<D, SchedulerError> {
        self.request_shutdown();
        let thread = self
            .thread
            .take()
            .ok_or_else(|| SchedulerError::Panicked("scheduler already joined".to_string()))?;
        let result = thread
            .join()
            .map_err(|payload| SchedulerError::Panicked(panic_message(payload.as_ref())));

        if let Some(watchdog) = self.watchdog.take() {
            watchdog.stop();
        }
        result
    }
}

impl<D> Drop for SchedulerHandle<D> {
    fn drop(&mut self) {
        self.request_shutdown();
    }
}

/// Spawn the tick scheduler thread.
///
/// The scheduler starts in [`SchedulerState::Running`] and delivers messages
/// from `queue` to `dispatcher` until shut down.
pub fn spawn_scheduler<D>(
    queue: Arc<MessageQueue>,
    dispatcher: D,
    config: SchedulerConfig,
) -> Result<SchedulerHandle<D>, SchedulerError>
where
    D: Dispatcher + 'static,
{
    let watchdog = config
        .watchdog_timeout
        .map(Watchdog::new)
        .transpose()
        .map_err(|source| SchedulerError::Spawn {
            name: "watchdog",
            source,
        })?;
    let watchdog_state = watchdog.as_ref().map(|w| Arc::clone(w.state()));

    let shared = Arc::new(Shared {
        state: AtomicU8::new(SchedulerState::Running as u8),
    });
    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

    let thread_shared = Arc::clone(&shared);
    let thread = thread::Builder::new()
        .name("ticksim-scheduler".to_string())
        .spawn(move || {
            scheduler_main(
                queue,
                dispatcher,
                config.tick_quantum,
                shutdown_rx,
                thread_shared,
                watchdog_state,
            )
        })
        .map_err(|source| SchedulerError::Spawn {
            name: "scheduler",
            source,
        })?;

    Ok(SchedulerHandle {
        shared,
        shutdown_tx: Some(shutdown_tx),
        thread: Some(thread),
        watchdog,
    })
}

/// Main function for the scheduler thread.
fn scheduler_main<D: Dispatcher>(
    queue: Arc<MessageQueue>,
    mut dispatcher: D,
    quantum: Duration,
    shutdown_rx: Receiver<()>,
    shared: Arc<Shared>,
    watchdog: Option<Arc<WatchdogState>>,
) -> D {
    info!(quantum_ms = quantum.as_millis() as u64, "tick scheduler started");
    let ticker = tick(quantum);

    while shared.state() == SchedulerState::Running {
        select! {
            recv(shutdown_rx) -> _ => break,
            recv(ticker) -> _ => {
                let now = queue.advance_tick();
                counter!(metric_defs::SCHEDULER_TICKS.name).increment(1);
                trace!(tick = %now, "tick");

                let delivered = queue.drain_due(now, |message| {
                    deliver(&mut dispatcher, now, message, watchdog.as_deref());
                });
                if delivered > 0 {
                    debug!(tick = %now, delivered, "delivered due messages");
                }
            }
        }
    }

    shared.set_state(SchedulerState::Stopped);
    info!(
        tick = %queue.current_tick(),
        pending = queue.len(),
        "tick scheduler stopped"
    );
    dispatcher
}

/// Hand one message to the dispatcher, isolating panics.
fn deliver<D: Dispatcher>(
    dispatcher: &mut D,
    now: Tick,
    message: &Message,
    watchdog: Option<&WatchdogState>,
) {
    if let Some(w) = watchdog {
        w.begin(now, message);
    }
    let started = Instant::now();

    let result = panic::catch_unwind(AssertUnwindSafe(|| dispatcher.dispatch(now, message)));

    histogram!(metric_defs::DISPATCH_HANDLER_TIME.name)
        .record(started.elapsed().as_micros() as f64);
    if let Some(w) = watchdog {
        w.end();
    }

    match result {
        Ok(()) => {
            counter!(metric_defs::SCHEDULER_DELIVERED.name, "kind" => message.kind().as_str())
                .increment(1);
        }
        Err(payload) => {
            counter!(metric_defs::SCHEDULER_HANDLER_PANICS.name).increment(1);
            error!(
                tick = %now,
                kind = %message.kind(),
                from = %message.from_id(),
                "message handler panicked: {}",
                panic_message(payload.as_ref())
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
