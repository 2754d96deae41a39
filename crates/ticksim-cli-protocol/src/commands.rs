//! Operator commands accepted by the console.
//!
//! Every command except `exit` becomes one queued message. Node ids are
//! validated against the size of the network at parse time, so a command that
//! reaches the queue always names existing nodes.

use crate::error::{CliError, CliResult};
use ticksim_common::{MessageKind, NodeId, Payload};

/// Verbs accepted on the console, in help order.
pub const VERBS: [&str; 7] = ["send", "show", "crash", "restart", "clear", "status", "exit"];

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Queue a text message from one node to another.
    Send {
        /// Source node.
        from: NodeId,
        /// Destination node.
        to: NodeId,
        /// Message text.
        text: Payload,
    },

    /// Queue a request to print a node's inbox.
    Show {
        /// Node to inspect.
        node: NodeId,
    },

    /// Queue a crash of a node.
    Crash {
        /// Node to crash.
        node: NodeId,
    },

    /// Queue a restart of a node.
    Restart {
        /// Node to restart.
        node: NodeId,
    },

    /// Queue clearing a node's inbox.
    Clear {
        /// Node whose inbox is emptied.
        node: NodeId,
    },

    /// Queue a liveness query.
    Status {
        /// Node to query.
        node: NodeId,
    },

    /// Stop the simulation.
    Exit,
}

impl Command {
    /// Parse one console line for a network of `node_count` nodes.
    pub fn parse(line: &str, node_count: usize) -> CliResult<Command> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim_start()),
            None => (line, ""),
        };

        match verb {
            "" => Err(CliError::Empty),
            "send" => parse_send(rest, node_count),
            "show" => parse_single(rest, node_count, "show <node_id>")
                .map(|node| Command::Show { node }),
            "crash" => parse_single(rest, node_count, "crash <node_id>")
                .map(|node| Command::Crash { node }),
            "restart" => parse_single(rest, node_count, "restart <node_id>")
                .map(|node| Command::Restart { node }),
            "clear" => parse_single(rest, node_count, "clear <node_id>")
                .map(|node| Command::Clear { node }),
            "status" => parse_single(rest, node_count, "status <node_id>")
                .map(|node| Command::Status { node }),
            "exit" if rest.is_empty() => Ok(Command::Exit),
            _ => Err(CliError::UnknownCommand(line.to_string())),
        }
    }

    /// The message kind this command enqueues, or `None` for `exit`.
    pub fn message_kind(&self) -> Option<MessageKind> {
        match self {
            Command::Send { .. } => Some(MessageKind::Send),
            Command::Show { .. } => Some(MessageKind::Show),
            Command::Crash { .. } => Some(MessageKind::Crash),
            Command::Restart { .. } => Some(MessageKind::Restart),
            Command::Clear { .. } => Some(MessageKind::Clear),
            Command::Status { .. } => Some(MessageKind::Status),
            Command::Exit => None,
        }
    }

    /// Get the command string as an operator would type it.
    pub fn to_command_string(&self) -> String {
        match self {
            Command::Send { from, to, text } => format!("send {} {} {}", from, to, text),
            Command::Show { node } => format!("show {}", node),
            Command::Crash { node } => format!("crash {}", node),
            Command::Restart { node } => format!("restart {}", node),
            Command::Clear { node } => format!("clear {}", node),
            Command::Status { node } => format!("status {}", node),
            Command::Exit => "exit".to_string(),
        }
    }
}

const SEND_USAGE: &str = "send <from_id> <to_id> <message>";

fn parse_send(args: &str, node_count: usize) -> CliResult<Command> {
    let usage = CliError::Usage { usage: SEND_USAGE };

    let (from, rest) = args.split_once(char::is_whitespace).ok_or(usage.clone())?;
    let (to, text) = rest
        .trim_start()
        .split_once(char::is_whitespace)
        .ok_or(usage.clone())?;
    let text = text.trim();
    if text.is_empty() {
        return Err(usage);
    }

    let from = parse_node_id(from, node_count).ok_or(usage.clone())?;
    let to = parse_node_id(to, node_count).ok_or(usage)?;

    Ok(Command::Send {
        from,
        to,
        text: Payload::new(text),
    })
}

fn parse_single(args: &str, node_count: usize, usage: &'static str) -> CliResult<NodeId> {
    let mut parts = args.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(id), None) => parse_node_id(id, node_count).ok_or(CliError::Usage { usage }),
        _ => Err(CliError::Usage { usage }),
    }
}

fn parse_node_id(token: &str, node_count: usize) -> Option<NodeId> {
    let id: u32 = token.parse().ok()?;
    ((id as usize) < node_count).then_some(NodeId(id))
}

/// Parse the node count typed at the startup prompt.
///
/// Node ids are 32-bit, so the count must be between 1 and `u32::MAX`.
pub fn parse_node_count(line: &str) -> CliResult<usize> {
    let trimmed = line.trim();
    match trimmed.parse::<u32>() {
        Ok(count) if count > 0 => Ok(count as usize),
        _ => Err(CliError::InvalidNodeCount(trimmed.to_string())),
    }
}
