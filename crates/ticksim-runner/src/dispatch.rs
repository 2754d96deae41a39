//! Dispatch of delivered messages into the node registry.
//!
//! The tick scheduler hands each due message to a [`Dispatcher`]. The standard
//! dispatcher, [`RegistryDispatcher`], applies the message to a
//! [`NodeRegistry`] and describes the outcome as a [`Report`], which it passes
//! to a [`ReportSink`]:
//!
//! - [`ConsoleSink`] renders reports as operator text, re-emitting the prompt
//! - a `crossbeam_channel::Sender<Report>` forwards them to another thread

use crossbeam_channel::Sender;
use metrics::counter;
use std::fmt;
use std::io::Write;
use ticksim_common::{Message, MessageKind, NodeId, Tick};
use ticksim_metrics::metric_defs;
use ticksim_registry::{NodeError, NodeRegistry};
use tracing::{debug, warn};

use crate::console::PROMPT;

/// Receives messages from the tick scheduler.
///
/// `dispatch` runs on the scheduler thread with the queue lock released.
pub trait Dispatcher: Send {
    /// Handle one delivered message.
    fn dispatch(&mut self, tick: Tick, message: &Message);
}

impl<F> Dispatcher for F
where
    F: FnMut(Tick, &Message) + Send,
{
    fn dispatch(&mut self, tick: Tick, message: &Message) {
        self(tick, message)
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Outcome of delivering a message, as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// A message is about to be applied.
    Delivering {
        /// Tick of delivery.
        tick: Tick,
        /// Source node.
        from: NodeId,
        /// Destination node, if any.
        to: Option<NodeId>,
        /// Requested operation.
        kind: MessageKind,
        /// Payload text (empty if none).
        text: String,
    },
    /// Text landed in the destination inbox.
    Sent {
        /// Source node.
        from: NodeId,
        /// Destination node.
        to: NodeId,
        /// Delivered text.
        text: String,
    },
    /// Inbox contents of a node.
    Inbox {
        /// Inspected node.
        node: NodeId,
        /// Messages in arrival order.
        entries: Vec<String>,
    },
    /// The node was crashed.
    Crashed {
        /// Affected node.
        node: NodeId,
    },
    /// The node was restarted.
    Restarted {
        /// Affected node.
        node: NodeId,
    },
    /// The node's inbox was emptied.
    Cleared {
        /// Affected node.
        node: NodeId,
    },
    /// Liveness of a node.
    Status {
        /// Queried node.
        node: NodeId,
        /// Whether it is alive.
        alive: bool,
    },
    /// The registry rejected the operation; no state changed.
    Rejected {
        /// Requested operation.
        kind: MessageKind,
        /// Why it was rejected.
        error: NodeError,
    },
}

impl Report {
    /// Whether this report closes out the delivery of a message.
    pub fn is_outcome(&self) -> bool {
        !matches!(self, Report::Delivering { .. })
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Delivering {
                tick,
                from,
                to,
                kind,
                text,
            } => match to {
                Some(to) => write!(
                    f,
                    "[Tick {}] Delivering message from {} to {}: {}",
                    tick, from, to, text
                ),
                None => write!(f, "[Tick {}] Delivering {} for node {}", tick, kind, from),
            },
            Report::Sent { from, to, text } => {
                write!(f, "Message sent from Node {} to Node {}: \"{}\"", from, to, text)
            }
            Report::Inbox { node, entries } => {
                write!(f, "Inbox of Node {}", node)?;
                if entries.is_empty() {
                    return write!(f, "\n(empty)");
                }
                for (i, entry) in entries.iter().enumerate() {
                    write!(f, "\n[{}] {}", i + 1, entry)?;
                }
                Ok(())
            }
            Report::Crashed { node } => write!(f, "Node {} has been crashed", node),
            Report::Restarted { node } => write!(f, "Node {} has been restarted", node),
            Report::Cleared { node } => write!(f, "Inbox of Node {} has been cleared.", node),
            Report::Status { node, alive } => {
                if *alive {
                    write!(f, "Node {} is alive", node)
                } else {
                    write!(f, "Node {} is not alive", node)
                }
            }
            Report::Rejected { kind, error } => write!(f, "{} failed: {}", kind, error),
        }
    }
}

// ============================================================================
// Sinks
// ============================================================================

/// Destination for delivery reports.
pub trait ReportSink: Send {
    /// Accept one report.
    fn report(&mut self, report: Report);
}

impl ReportSink for Sender<Report> {
    fn report(&mut self, report: Report) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.send(report);
    }
}

/// Writes reports as operator text.
///
/// After each outcome the prompt is printed again, because delivery output
/// interrupts whatever the operator was typing.
pub struct ConsoleSink<W> {
    out: W,
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Create a sink writing to `out`.
    pub fn new(out: W) -> Self {
        ConsoleSink { out }
    }

    fn write_report(&mut self, report: &Report) -> std::io::Result<()> {
        writeln!(self.out, "{}", report)?;
        if report.is_outcome() {
            write!(self.out, "{}", PROMPT)?;
        }
        self.out.flush()
    }
}

impl<W: Write + Send> ReportSink for ConsoleSink<W> {
    fn report(&mut self, report: Report) {
        if let Err(e) = self.write_report(&report) {
            warn!("failed to write report: {}", e);
        }
    }
}

// ============================================================================
// Registry Dispatcher
// ============================================================================

/// Applies delivered messages to a [`NodeRegistry`].
pub struct RegistryDispatcher<S> {
    registry: NodeRegistry,
    sink: S,
}

impl<S: ReportSink> RegistryDispatcher<S> {
    /// Create a dispatcher owning `registry`.
    pub fn new(registry: NodeRegistry, sink: S) -> Self {
        RegistryDispatcher { registry, sink }
    }

    /// Consume the dispatcher, returning the registry and the sink.
    pub fn into_parts(self) -> (NodeRegistry, S) {
        (self.registry, self.sink)
    }

    fn apply(&mut self, message: &Message) -> Result<Report, NodeError> {
        let node = message.from_id();
        match message.kind() {
            MessageKind::Send => {
                let to = message.to_id().ok_or(NodeError::NoDestination(node))?;
                self.registry.send(node, to, message.text())?;
                Ok(Report::Sent {
                    from: node,
                    to,
                    text: message.text().to_string(),
                })
            }
            MessageKind::Show => Ok(Report::Inbox {
                node,
                entries: self.registry.show(node)?.to_vec(),
            }),
            MessageKind::Crash => {
                self.registry.crash(node)?;
                Ok(Report::Crashed { node })
            }
            MessageKind::Restart => {
                self.registry.restart(node)?;
                Ok(Report::Restarted { node })
            }
            MessageKind::Clear => {
                self.registry.clear(node)?;
                Ok(Report::Cleared { node })
            }
            MessageKind::Status => Ok(Report::Status {
                node,
                alive: self.registry.status(node)?,
            }),
        }
    }
}

impl<S: ReportSink> Dispatcher for RegistryDispatcher<S> {
    fn dispatch(&mut self, tick: Tick, message: &Message) {
        self.sink.report(Report::Delivering {
            tick,
            from: message.from_id(),
            to: message.to_id(),
            kind: message.kind(),
            text: message.text().to_string(),
        });

        let report = match self.apply(message) {
            Ok(report) => report,
            Err(error) => {
                counter!(metric_defs::NODE_REJECTED.name, "reason" => error.reason()).increment(1);
                debug!(%tick, kind = %message.kind(), "registry rejected message: {}", error);
                Report::Rejected {
                    kind: message.kind(),
                    error,
                }
            }
        };
        self.sink.report(report);
    }
}
