//! Bounded message queue shared by the console and the tick scheduler.
//!
//! The queue is a ring buffer of fixed capacity `C` with a head index (next
//! slot to consume) and a tail index (next slot to produce into). One slot is
//! always left empty so that `head == tail` means empty and
//! `advance(tail) == head` means full; at most `C - 1` messages are pending.
//!
//! ## Locking
//!
//! A single mutex guards the slots, both indices and the global tick counter.
//! Producers read the tick and insert under the same lock, so a message is
//! always stamped with the tick that was current when it entered the queue.
//!
//! [`MessageQueue::drain_due`] releases that lock while a handler runs and
//! re-acquires it before advancing the head. A slow handler therefore never
//! blocks producers for longer than the queue bookkeeping takes. The slot
//! being delivered stays occupied until the handler returns, so producers
//! cannot overwrite it.

use metrics::{counter, gauge};
use parking_lot::{Mutex, MutexGuard};
use ticksim_common::{Message, MessageKind, NodeId, Payload, Tick};
use ticksim_metrics::metric_defs;
use tracing::{debug, trace};

use crate::error::QueueError;

/// Default number of ring slots.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Ring buffer state. Only ever touched with the queue lock held.
#[derive(Debug)]
struct Ring {
    slots: Vec<Option<Message>>,
    head: usize,
    tail: usize,
    tick: Tick,
}

impl Ring {
    fn advance(&self, index: usize) -> usize {
        (index + 1) % self.slots.len()
    }

    /// Undelivered messages. The head slot may hold a message already handed
    /// to a handler (in flight, or abandoned by an unwinding handler); it
    /// still occupies its slot but is not counted.
    fn len(&self) -> usize {
        let occupied = (self.tail + self.slots.len() - self.head) % self.slots.len();
        let head_delivered = occupied > 0
            && self.slots[self.head]
                .as_ref()
                .is_some_and(Message::is_delivered);
        occupied - usize::from(head_delivered)
    }
}

/// Bounded FIFO of pending messages with a logical clock.
#[derive(Debug)]
pub struct MessageQueue {
    ring: Mutex<Ring>,
    /// Serializes consumers; held for the whole of a drain.
    consumer: Mutex<()>,
}

impl MessageQueue {
    /// Create a queue with `capacity` ring slots (`capacity - 1` usable).
    ///
    /// # Panics
    ///
    /// Panics if `capacity < 2`.
    pub fn new(capacity: usize) -> Self {
        Self::with_slots(vec![None; capacity])
    }

    /// Like [`MessageQueue::new`], but reports a failed allocation as
    /// [`QueueError::Alloc`] instead of aborting.
    ///
    /// # Panics
    ///
    /// Panics if `capacity < 2`.
    pub fn try_new(capacity: usize) -> Result<Self, QueueError> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|source| QueueError::Alloc { capacity, source })?;
        slots.resize(capacity, None);
        Ok(Self::with_slots(slots))
    }

    fn with_slots(slots: Vec<Option<Message>>) -> Self {
        assert!(slots.len() >= 2, "Queue capacity must be at least 2");
        MessageQueue {
            ring: Mutex::new(Ring {
                slots,
                head: 0,
                tail: 0,
                tick: Tick::ZERO,
            }),
            consumer: Mutex::new(()),
        }
    }

    /// Number of ring slots, including the reserved one.
    pub fn capacity(&self) -> usize {
        self.ring.lock().slots.len()
    }

    /// Number of messages pending delivery.
    pub fn len(&self) -> usize {
        self.ring.lock().len()
    }

    /// Whether no messages are pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current value of the global tick counter.
    pub fn current_tick(&self) -> Tick {
        self.ring.lock().tick
    }

    /// Advance the global tick counter by one and return the new value.
    ///
    /// Only the tick scheduler calls this.
    pub fn advance_tick(&self) -> Tick {
        let mut ring = self.ring.lock();
        ring.tick = ring.tick.next();
        ring.tick
    }

    /// Queue a message stamped with the current tick.
    ///
    /// Never blocks beyond the queue bookkeeping: a full queue fails
    /// immediately with [`QueueError::Full`]. Returns the tick the message is
    /// scheduled for.
    pub fn enqueue(
        &self,
        from_id: NodeId,
        to_id: Option<NodeId>,
        kind: MessageKind,
        payload: Option<Payload>,
    ) -> Result<Tick, QueueError> {
        let mut ring = self.ring.lock();
        let next_tail = ring.advance(ring.tail);
        if next_tail == ring.head {
            let held = ring.slots.len() - 1;
            drop(ring);
            counter!(metric_defs::QUEUE_REJECTED.name).increment(1);
            debug!(from = %from_id, %kind, "message queue full, dropping message");
            return Err(QueueError::Full { held });
        }

        let tick = ring.tick;
        let tail = ring.tail;
        ring.slots[tail] = Some(Message::new(from_id, to_id, kind, payload, tick));
        ring.tail = next_tail;
        let depth = ring.len();
        drop(ring);

        counter!(metric_defs::QUEUE_ENQUEUED.name, "kind" => kind.as_str()).increment(1);
        gauge!(metric_defs::QUEUE_DEPTH.name).set(depth as f64);
        debug!(from = %from_id, %kind, %tick, depth, "message queued");
        Ok(tick)
    }

    /// Deliver every due message to `handler`, in FIFO order.
    ///
    /// Starting at the head, each message whose scheduled tick is at or before
    /// `current_tick` is marked delivered, handed to `handler` with the queue
    /// lock released, and then consumed. Draining stops at the first message
    /// that is not yet due; later messages were stamped no earlier, so none of
    /// them can be due either.
    ///
    /// A message is handed to a handler at most once. If a handler unwinds,
    /// the lock is re-acquired by the guard and the message stays marked
    /// delivered; the next drain consumes it without calling a handler.
    ///
    /// Returns the number of handler invocations.
    pub fn drain_due<F>(&self, current_tick: Tick, mut handler: F) -> usize
    where
        F: FnMut(&Message),
    {
        let _consumer = self.consumer.lock();
        let mut ring = self.ring.lock();
        let mut handled = 0;

        while ring.head != ring.tail {
            let head = ring.head;
            let message = match ring.slots[head].as_mut() {
                Some(message) if message.is_delivered() => {
                    // A previous handler unwound before the head moved on.
                    trace!(slot = head, "skipping abandoned delivery");
                    ring.head = ring.advance(head);
                    continue;
                }
                Some(message) if message.is_due(current_tick) => {
                    message.mark_delivered();
                    message.clone()
                }
                _ => break,
            };

            MutexGuard::unlocked(&mut ring, || handler(&message));

            ring.head = ring.advance(head);
            handled += 1;
        }

        if handled > 0 {
            gauge!(metric_defs::QUEUE_DEPTH.name).set(ring.len() as f64);
        }
        handled
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
