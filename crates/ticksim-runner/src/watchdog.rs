//! Watchdog thread for spotting slow message handlers.
//!
//! The scheduler records the message it is currently dispatching in a shared
//! [`WatchdogState`]. The watchdog thread samples that state periodically and,
//! if one handler has been running longer than the configured timeout, logs a
//! warning describing the message. Each delivery is reported at most once.

use crossbeam_channel::{select, tick, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use ticksim_common::{Message, MessageKind, NodeId, Tick};
use tracing::warn;

/// Shortest interval between watchdog samples.
const MIN_CHECK_INTERVAL: Duration = Duration::from_millis(1);

/// Information about the delivery currently in progress.
#[derive(Debug, Clone)]
pub struct DeliveryInfo {
    /// Sequential delivery number.
    pub sequence: u64,
    /// Tick the message is being delivered on.
    pub tick: Tick,
    /// Source node.
    pub from: NodeId,
    /// Destination node, if any.
    pub to: Option<NodeId>,
    /// Requested operation.
    pub kind: MessageKind,
    /// When the handler was entered.
    pub started_at: Instant,
}

/// Shared state between the scheduler thread and the watchdog thread.
#[derive(Debug, Default)]
pub struct WatchdogState {
    current: Mutex<Option<DeliveryInfo>>,
    next_sequence: AtomicU64,
    alert_count: AtomicU64,
}

impl WatchdogState {
    /// Create an idle watchdog state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `message` is being handed to a handler.
    pub fn begin(&self, tick: Tick, message: &Message) {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        *self.current.lock() = Some(DeliveryInfo {
            sequence,
            tick,
            from: message.from_id(),
            to: message.to_id(),
            kind: message.kind(),
            started_at: Instant::now(),
        });
    }

    /// Record that the handler returned.
    pub fn end(&self) {
        *self.current.lock() = None;
    }

    /// The delivery in progress, if any.
    pub fn current(&self) -> Option<DeliveryInfo> {
        self.current.lock().clone()
    }

    /// Number of alerts raised so far.
    pub fn alert_count(&self) -> u64 {
        self.alert_count.load(Ordering::Relaxed)
    }

    fn increment_alert_count(&self) -> u64 {
        self.alert_count.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Watchdog thread handle.
pub struct Watchdog {
    state: Arc<WatchdogState>,
    stop_tx: Option<Sender<()>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Create and start a watchdog that alerts on handlers slower than `timeout`.
    pub fn new(timeout: Duration) -> std::io::Result<Self> {
        let state = Arc::new(WatchdogState::new());
        let watchdog_state = Arc::clone(&state);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let check_interval = (timeout / 4).max(MIN_CHECK_INTERVAL);

        let thread_handle = thread::Builder::new()
            .name("ticksim-watchdog".to_string())
            .spawn(move || {
                let ticker = tick(check_interval);
                let mut last_alerted: Option<u64> = None;

                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            if let Some(info) = watchdog_state.current() {
                                let elapsed = info.started_at.elapsed();
                                // Only alert once per delivery (don't spam)
                                if elapsed >= timeout && last_alerted != Some(info.sequence) {
                                    last_alerted = Some(info.sequence);
                                    let alert = watchdog_state.increment_alert_count();
                                    warn!(
                                        alert,
                                        tick = %info.tick,
                                        kind = %info.kind,
                                        from = %info.from,
                                        to = ?info.to,
                                        elapsed_ms = elapsed.as_millis() as u64,
                                        "message handler is taking too long"
                                    );
                                }
                            }
                        }
                    }
                }
            })?;

        Ok(Watchdog {
            state,
            stop_tx: Some(stop_tx),
            thread_handle: Some(thread_handle),
        })
    }

    /// Shared state for the scheduler to update.
    pub fn state(&self) -> &Arc<WatchdogState> {
        &self.state
    }

    /// Stop the watchdog thread and wait for it to finish.
    pub fn stop(mut self) {
        self.stop_tx.take();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        // Disconnecting the channel wakes the thread; don't wait for it here.
        self.stop_tx.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticksim_common::Payload;

    fn message() -> Message {
        Message::new(
            NodeId(0),
            Some(NodeId(1)),
            MessageKind::Send,
            Some(Payload::from("slow")),
            Tick(3),
        )
    }

    #[test]
    fn test_state_tracks_current_delivery() {
        let state = WatchdogState::new();
        assert!(state.current().is_none());

        state.begin(Tick(3), &message());
        let info = state.current().unwrap();
        assert_eq!(info.sequence, 0);
        assert_eq!(info.kind, MessageKind::Send);
        assert_eq!(info.to, Some(NodeId(1)));

        state.end();
        assert!(state.current().is_none());

        state.begin(Tick(4), &message());
        assert_eq!(state.current().unwrap().sequence, 1);
    }

    #[test]
    fn test_slow_handler_alerts_once() {
        let watchdog = Watchdog::new(Duration::from_millis(20)).unwrap();
        let state = Arc::clone(watchdog.state());

        state.begin(Tick(3), &message());
        thread::sleep(Duration::from_millis(150));
        state.end();

        assert_eq!(state.alert_count(), 1);
        watchdog.stop();
    }

    #[test]
    fn test_fast_handler_no_alert() {
        let watchdog = Watchdog::new(Duration::from_millis(500)).unwrap();
        let state = Arc::clone(watchdog.state());

        state.begin(Tick(1), &message());
        state.end();
        thread::sleep(Duration::from_millis(20));

        assert_eq!(state.alert_count(), 0);
        watchdog.stop();
    }
}
