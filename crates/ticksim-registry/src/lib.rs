//! Node registry for the ticksim simulator.
//!
//! The registry owns a fixed table of [`Node`] records, created once at startup.
//! It has no locking of its own: all operations run on the tick scheduler's
//! consumer thread, which is the only place messages are delivered.
//!
//! Rejected operations (dead nodes, full inboxes) return a [`NodeError`] and
//! leave every node unchanged.

mod error;
mod inbox;

pub use error::*;
pub use inbox::*;

use ticksim_common::NodeId;

/// Largest network the registry will build; every id must fit in a `u32`.
pub const MAX_NODES: usize = u32::MAX as usize;

/// A simulated node.
#[derive(Debug, Clone)]
pub struct Node {
    inbox: Inbox,
    alive: bool,
}

impl Node {
    fn new(inbox_capacity: usize) -> Self {
        Node {
            inbox: Inbox::bounded(inbox_capacity),
            alive: true,
        }
    }

    /// The node's inbox.
    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    /// Whether the node accepts and originates messages.
    pub fn is_alive(&self) -> bool {
        self.alive
    }
}

/// Fixed-size table of nodes, indexed by [`NodeId`].
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    nodes: Vec<Node>,
}

impl NodeRegistry {
    /// Create `count` live nodes with ids `0..count`.
    ///
    /// Fails instead of aborting when the table cannot be allocated.
    pub fn try_new(count: usize, inbox_capacity: usize) -> Result<Self, RegistryError> {
        if count > MAX_NODES {
            return Err(RegistryError::TooManyNodes { count });
        }
        let mut nodes = reserve_table(count)?;
        nodes.extend((0..count).map(|_| Node::new(inbox_capacity)));
        Ok(NodeRegistry { nodes })
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the registry has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node.
    pub fn node(&self, id: NodeId) -> NodeResult<&Node> {
        let count = self.nodes.len();
        self.nodes
            .get(id.index())
            .ok_or(NodeError::UnknownNode { node: id, count })
    }

    fn node_mut(&mut self, id: NodeId) -> NodeResult<&mut Node> {
        let count = self.nodes.len();
        self.nodes
            .get_mut(id.index())
            .ok_or(NodeError::UnknownNode { node: id, count })
    }

    /// Deliver `text` from `from_id` into the inbox of `to_id`.
    ///
    /// Both nodes must be alive and the destination inbox must have room.
    pub fn send(&mut self, from_id: NodeId, to_id: NodeId, text: &str) -> NodeResult<()> {
        let from_alive = self.node(from_id)?.is_alive();
        let to_alive = self.node(to_id)?.is_alive();

        match (from_alive, to_alive) {
            (false, false) => {
                return Err(NodeError::BothNotAlive {
                    from: from_id,
                    to: to_id,
                })
            }
            (_, false) => return Err(NodeError::NotAlive(to_id)),
            (false, _) => return Err(NodeError::NotAlive(from_id)),
            (true, true) => {}
        }

        let dest = self.node_mut(to_id)?;
        let capacity = dest.inbox.capacity();
        dest.inbox
            .push(text.to_string())
            .map_err(|_| NodeError::InboxFull {
                node: to_id,
                capacity,
            })
    }

    /// Inbox contents of a live node.
    pub fn show(&self, node_id: NodeId) -> NodeResult<&[String]> {
        let node = self.node(node_id)?;
        if !node.alive {
            return Err(NodeError::NotAlive(node_id));
        }
        Ok(node.inbox.entries())
    }

    /// Mark a node dead. Idempotent.
    pub fn crash(&mut self, node_id: NodeId) -> NodeResult<()> {
        self.node_mut(node_id)?.alive = false;
        Ok(())
    }

    /// Mark a node alive. Idempotent; the inbox is kept.
    pub fn restart(&mut self, node_id: NodeId) -> NodeResult<()> {
        self.node_mut(node_id)?.alive = true;
        Ok(())
    }

    /// Empty a node's inbox, whether or not it is alive.
    pub fn clear(&mut self, node_id: NodeId) -> NodeResult<()> {
        self.node_mut(node_id)?.inbox.clear();
        Ok(())
    }

    /// Whether a node is alive.
    pub fn status(&self, node_id: NodeId) -> NodeResult<bool> {
        Ok(self.node(node_id)?.alive)
    }
}

fn reserve_table<T>(count: usize) -> Result<Vec<T>, RegistryError> {
    let mut table = Vec::new();
    table
        .try_reserve_exact(count)
        .map_err(|source| RegistryError::Alloc { count, source })?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(count: usize) -> NodeRegistry {
        NodeRegistry::try_new(count, DEFAULT_INBOX_CAPACITY).unwrap()
    }

    #[test]
    fn test_new_registry_all_alive() {
        let reg = registry(3);
        assert_eq!(reg.len(), 3);
        for id in 0..3 {
            let node = reg.node(NodeId(id)).unwrap();
            assert!(node.is_alive() && node.inbox().is_empty());
        }
        assert!(reg.node(NodeId(3)).is_err());
    }

    #[test]
    fn test_send_appends_to_destination() {
        let mut reg = registry(3);
        reg.send(NodeId(0), NodeId(1), "hello").unwrap();
        assert_eq!(reg.show(NodeId(1)).unwrap(), ["hello"]);
        assert!(reg.show(NodeId(0)).unwrap().is_empty());
    }

    #[test]
    fn test_send_to_crashed_node_is_rejected() {
        let mut reg = registry(2);
        reg.crash(NodeId(1)).unwrap();
        assert_eq!(
            reg.send(NodeId(0), NodeId(1), "hi"),
            Err(NodeError::NotAlive(NodeId(1)))
        );
        assert!(reg.node(NodeId(1)).unwrap().inbox().is_empty());
    }

    #[test]
    fn test_send_from_crashed_node_is_rejected() {
        let mut reg = registry(2);
        reg.crash(NodeId(0)).unwrap();
        assert_eq!(
            reg.send(NodeId(0), NodeId(1), "hi"),
            Err(NodeError::NotAlive(NodeId(0)))
        );
        assert!(reg.node(NodeId(1)).unwrap().inbox().is_empty());
    }

    #[test]
    fn test_send_between_crashed_nodes() {
        let mut reg = registry(2);
        reg.crash(NodeId(0)).unwrap();
        reg.crash(NodeId(1)).unwrap();
        assert_eq!(
            reg.send(NodeId(0), NodeId(1), "hi"),
            Err(NodeError::BothNotAlive {
                from: NodeId(0),
                to: NodeId(1)
            })
        );
    }

    #[test]
    fn test_inbox_bound() {
        let mut reg = registry(2);
        let mut failures = 0;
        for i in 0..11 {
            if let Err(e) = reg.send(NodeId(0), NodeId(1), &format!("msg {}", i)) {
                assert_eq!(
                    e,
                    NodeError::InboxFull {
                        node: NodeId(1),
                        capacity: 10
                    }
                );
                failures += 1;
            }
        }
        assert_eq!(failures, 1);
        let inbox = reg.show(NodeId(1)).unwrap();
        assert_eq!(inbox.len(), 10);
        assert_eq!(inbox[9], "msg 9");
    }

    #[test]
    fn test_show_crashed_node() {
        let mut reg = registry(1);
        reg.crash(NodeId(0)).unwrap();
        assert_eq!(reg.show(NodeId(0)), Err(NodeError::NotAlive(NodeId(0))));
    }

    #[test]
    fn test_crash_restart_idempotent() {
        let mut reg = registry(1);
        reg.crash(NodeId(0)).unwrap();
        reg.crash(NodeId(0)).unwrap();
        assert_eq!(reg.status(NodeId(0)), Ok(false));
        reg.restart(NodeId(0)).unwrap();
        reg.restart(NodeId(0)).unwrap();
        assert_eq!(reg.status(NodeId(0)), Ok(true));
    }

    #[test]
    fn test_clear_works_on_dead_node() {
        let mut reg = registry(2);
        reg.send(NodeId(0), NodeId(1), "hello").unwrap();
        reg.crash(NodeId(1)).unwrap();
        reg.clear(NodeId(1)).unwrap();
        assert!(reg.node(NodeId(1)).unwrap().inbox().is_empty());
    }

    #[test]
    fn test_restart_keeps_inbox() {
        let mut reg = registry(2);
        reg.send(NodeId(0), NodeId(1), "hello").unwrap();
        reg.crash(NodeId(1)).unwrap();
        reg.restart(NodeId(1)).unwrap();
        assert_eq!(reg.show(NodeId(1)).unwrap(), ["hello"]);
    }

    #[test]
    fn test_unknown_node() {
        let mut reg = registry(2);
        let err = reg.crash(NodeId(5)).unwrap_err();
        assert_eq!(
            err,
            NodeError::UnknownNode {
                node: NodeId(5),
                count: 2
            }
        );
        assert_eq!(err.reason(), "unknown_node");
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_too_many_nodes() {
        assert_eq!(
            NodeRegistry::try_new(MAX_NODES + 1, DEFAULT_INBOX_CAPACITY).unwrap_err(),
            RegistryError::TooManyNodes {
                count: MAX_NODES + 1
            }
        );
        assert!(NodeRegistry::try_new(usize::MAX, DEFAULT_INBOX_CAPACITY).is_err());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_table_allocation_failure_is_an_error() {
        // 2^30 entries of 2^40 bytes overflows the address space, so the
        // reservation fails without touching memory.
        let err = reserve_table::<[u8; 1 << 40]>(1 << 30).unwrap_err();
        assert!(matches!(err, RegistryError::Alloc { count, .. } if count == 1 << 30));
        assert!(err.to_string().starts_with("failed to allocate the node table"));
    }
}
