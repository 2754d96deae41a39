//! Common types shared by the ticksim crates.
//!
//! This crate defines the identifiers and the message record that flow from the
//! operator console, through the message queue, into the node registry:
//!
//! - [`NodeId`]: stable identity of a simulated node (`0..N`)
//! - [`Tick`]: one step of the logical clock
//! - [`MessageKind`]: the closed set of operations a message can request
//! - [`Payload`]: capacity-bounded UTF-8 message text
//! - [`Message`]: a queued request with its scheduled delivery tick

use std::fmt;

// ============================================================================
// Identifiers and Time
// ============================================================================

/// Identity of a simulated node.
///
/// Node ids are assigned at startup and are dense: a network of `N` nodes uses
/// ids `0..N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Index of this node in a dense node table.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point on the logical clock.
///
/// The clock starts at [`Tick::ZERO`] and is only ever advanced by the tick
/// scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Tick(pub u64);

impl Tick {
    /// The first tick.
    pub const ZERO: Tick = Tick(0);

    /// The tick following this one.
    pub const fn next(self) -> Self {
        Tick(self.0 + 1)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Message Kind
// ============================================================================

/// The operation a queued message asks the registry to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Append the payload to the destination node's inbox.
    Send,
    /// Report the inbox of the source node.
    Show,
    /// Mark the source node dead.
    Crash,
    /// Mark the source node alive.
    Restart,
    /// Empty the source node's inbox.
    Clear,
    /// Report whether the source node is alive.
    Status,
}

impl MessageKind {
    /// The lowercase verb used for this kind on the console.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Send => "send",
            MessageKind::Show => "show",
            MessageKind::Crash => "crash",
            MessageKind::Restart => "restart",
            MessageKind::Clear => "clear",
            MessageKind::Status => "status",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Maximum payload length in bytes.
pub const MAX_PAYLOAD_BYTES: usize = 255;

/// Message text, bounded to [`MAX_PAYLOAD_BYTES`].
///
/// Longer input is truncated on a UTF-8 character boundary rather than
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Payload(String);

impl Payload {
    /// Build a payload, truncating to [`MAX_PAYLOAD_BYTES`].
    pub fn new(text: impl Into<String>) -> Self {
        let mut text = text.into();
        if text.len() > MAX_PAYLOAD_BYTES {
            let mut end = MAX_PAYLOAD_BYTES;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            text.truncate(end);
        }
        Payload(text)
    }

    /// The payload text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::new(text)
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::new(text)
    }
}

// ============================================================================
// Message
// ============================================================================

/// A request queued by the console for delivery by the tick scheduler.
///
/// `to_id` is `None` for kinds that only operate on `from_id`; only
/// [`MessageKind::Send`] addresses a second node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    from_id: NodeId,
    to_id: Option<NodeId>,
    kind: MessageKind,
    payload: Option<Payload>,
    scheduled_tick: Tick,
    delivered: bool,
}

impl Message {
    /// Create an undelivered message scheduled for `scheduled_tick`.
    pub fn new(
        from_id: NodeId,
        to_id: Option<NodeId>,
        kind: MessageKind,
        payload: Option<Payload>,
        scheduled_tick: Tick,
    ) -> Self {
        Message {
            from_id,
            to_id,
            kind,
            payload,
            scheduled_tick,
            delivered: false,
        }
    }

    /// Source node.
    pub fn from_id(&self) -> NodeId {
        self.from_id
    }

    /// Destination node, if this message targets one.
    pub fn to_id(&self) -> Option<NodeId> {
        self.to_id
    }

    /// Requested operation.
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Message text, if any.
    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Payload text, or the empty string.
    pub fn text(&self) -> &str {
        self.payload.as_ref().map(Payload::as_str).unwrap_or("")
    }

    /// Tick at or after which the message may be delivered.
    pub fn scheduled_tick(&self) -> Tick {
        self.scheduled_tick
    }

    /// Whether the message has been handed to a handler.
    pub fn is_delivered(&self) -> bool {
        self.delivered
    }

    /// Whether the message may be delivered at `current`.
    pub fn is_due(&self, current: Tick) -> bool {
        !self.delivered && self.scheduled_tick <= current
    }

    /// Mark the message delivered.
    ///
    /// Returns `true` if this call performed the transition, `false` if the
    /// message was already delivered.
    pub fn mark_delivered(&mut self) -> bool {
        !std::mem::replace(&mut self.delivered, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_truncates_on_char_boundary() {
        // 'é' is two bytes, so 200 of them cannot be cut exactly at 255
        let text: String = std::iter::repeat('é').take(200).collect();
        let payload = Payload::new(text);
        assert!(payload.as_str().len() <= MAX_PAYLOAD_BYTES);
        assert_eq!(payload.as_str().len(), 254);
        assert!(payload.as_str().chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_payload_short_text_unchanged() {
        assert_eq!(Payload::from("hello").as_str(), "hello");
    }

    #[test]
    fn test_mark_delivered_once() {
        let mut msg = Message::new(NodeId(0), None, MessageKind::Show, None, Tick(3));
        assert!(!msg.is_delivered());
        assert!(msg.mark_delivered());
        assert!(!msg.mark_delivered());
        assert!(msg.is_delivered());
    }

    #[test]
    fn test_is_due() {
        let msg = Message::new(NodeId(0), Some(NodeId(1)), MessageKind::Send, None, Tick(5));
        assert!(!msg.is_due(Tick(4)));
        assert!(msg.is_due(Tick(5)));
        assert!(msg.is_due(Tick(6)));
    }

    #[test]
    fn test_untargeted_message() {
        let msg = Message::new(NodeId(2), None, MessageKind::Crash, None, Tick::ZERO);
        assert_eq!(msg.to_id(), None);
        assert_eq!(msg.text(), "");
    }

    #[test]
    fn test_kind_verbs() {
        let verbs: Vec<&str> = [
            MessageKind::Send,
            MessageKind::Show,
            MessageKind::Crash,
            MessageKind::Restart,
            MessageKind::Clear,
            MessageKind::Status,
        ]
        .iter()
        .map(|k| k.as_str())
        .collect();
        assert_eq!(verbs, ["send", "show", "crash", "restart", "clear", "status"]);
    }
}
