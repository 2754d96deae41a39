//! Operator console: the producer side of the message queue.
//!
//! The console reads one command per line, validates it against the size of
//! the network, and queues it for the tick scheduler. It never touches node
//! state directly; results appear later, when the scheduler delivers the
//! message.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use ticksim_cli_protocol::{CliError, Command};
use ticksim_common::{MessageKind, Tick};
use tracing::debug;

use crate::error::QueueError;
use crate::queue::MessageQueue;

/// Prompt printed before each command.
pub const PROMPT: &str = ">> ";

/// What happened to one console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// The command was queued for delivery.
    Queued {
        /// Requested operation.
        kind: MessageKind,
        /// Tick the message is scheduled for.
        tick: Tick,
    },
    /// The line was blank.
    Ignored,
    /// The command was rejected; the text explains why.
    Rejected(String),
    /// The operator asked to stop.
    Exit,
}

/// Queue the message for `command`.
///
/// Returns the scheduled tick, or `None` for `exit`, which queues nothing.
pub fn enqueue_command(queue: &MessageQueue, command: &Command) -> Result<Option<Tick>, QueueError> {
    let tick = match command {
        Command::Send { from, to, text } => {
            queue.enqueue(*from, Some(*to), MessageKind::Send, Some(text.clone()))?
        }
        Command::Show { node } => queue.enqueue(*node, None, MessageKind::Show, None)?,
        Command::Crash { node } => queue.enqueue(*node, None, MessageKind::Crash, None)?,
        Command::Restart { node } => queue.enqueue(*node, None, MessageKind::Restart, None)?,
        Command::Clear { node } => queue.enqueue(*node, None, MessageKind::Clear, None)?,
        Command::Status { node } => queue.enqueue(*node, None, MessageKind::Status, None)?,
        Command::Exit => return Ok(None),
    };
    Ok(Some(tick))
}

/// Line-oriented command loop.
#[derive(Debug, Clone)]
pub struct Console {
    queue: Arc<MessageQueue>,
    node_count: usize,
}

impl Console {
    /// Create a console feeding `queue` for a network of `node_count` nodes.
    pub fn new(queue: Arc<MessageQueue>, node_count: usize) -> Self {
        Console { queue, node_count }
    }

    /// Parse and queue a single line.
    pub fn handle_line(&self, line: &str) -> LineOutcome {
        let command = match Command::parse(line, self.node_count) {
            Ok(command) => command,
            Err(CliError::Empty) => return LineOutcome::Ignored,
            Err(e) => return LineOutcome::Rejected(e.to_string()),
        };

        let Some(kind) = command.message_kind() else {
            return LineOutcome::Exit;
        };
        match enqueue_command(&self.queue, &command) {
            Ok(Some(tick)) => {
                debug!(command = %command.to_command_string(), %tick, "command queued");
                LineOutcome::Queued { kind, tick }
            }
            Ok(None) => LineOutcome::Exit,
            Err(e) => LineOutcome::Rejected(e.to_string()),
        }
    }

    /// Run until `exit` or end of input.
    pub fn run<R: BufRead, W: Write>(&self, mut input: R, mut output: W) -> io::Result<()> {
        let mut line = String::new();
        loop {
            write!(output, "{}", PROMPT)?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                debug!("console input closed");
                writeln!(output)?;
                return Ok(());
            }

            match self.handle_line(&line) {
                LineOutcome::Exit => return Ok(()),
                LineOutcome::Rejected(text) => writeln!(output, "{}", text)?,
                LineOutcome::Queued { .. } | LineOutcome::Ignored => {}
            }
        }
    }
}
