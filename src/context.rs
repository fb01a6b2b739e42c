//! Reference-identity tracking for one (de)serialize call

use std::collections::HashMap;

use crate::graph::NodeId;

/// Per-root-object state: id assignment plus the bidirectional map between
/// node identity and serialized integer id. Only reference-typed nodes are
/// tracked; value-typed data never enters these maps. One context is
/// created per top-level call and discarded afterward, never shared.
#[derive(Debug, Default)]
pub struct SerializationContext {
    next_id: u64,
    ids_by_node: HashMap<NodeId, u64>,
    nodes_by_id: HashMap<u64, NodeId>,
    dependency_depth: u32,
}

impl SerializationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize direction: the id already assigned to a node, if any
    pub fn id_of(&self, node: NodeId) -> Option<u64> {
        self.ids_by_node.get(&node).copied()
    }

    /// Serialize direction: assign the next id to a fresh node
    pub fn assign(&mut self, node: NodeId) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.ids_by_node.insert(node, id);
        self.nodes_by_id.insert(id, node);
        id
    }

    /// Deserialize direction: the node already registered under an id
    pub fn resolve(&self, id: u64) -> Option<NodeId> {
        self.nodes_by_id.get(&id).copied()
    }

    /// Deserialize direction: register a shell node under its written id.
    ///
    /// Must happen before the node's fields are populated so that back
    /// references inside those fields resolve to the shell instead of
    /// recursing forever.
    pub fn register(&mut self, id: u64, node: NodeId) {
        self.nodes_by_id.insert(id, node);
        self.ids_by_node.insert(node, id);
        if id >= self.next_id {
            self.next_id = id + 1;
        }
    }

    /// Open a dependency bracket: the enclosing object has registered its
    /// own id and is about to recurse into children.
    pub fn begin_dependencies(&mut self) {
        self.dependency_depth += 1;
    }

    pub fn end_dependencies(&mut self) {
        debug_assert!(self.dependency_depth > 0);
        self.dependency_depth -= 1;
    }

    /// Whether a dependency bracket is currently open
    pub fn in_dependencies(&self) -> bool {
        self.dependency_depth > 0
    }

    pub fn tracked(&self) -> usize {
        self.ids_by_node.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let mut ctx = SerializationContext::new();
        assert_eq!(ctx.assign(NodeId(0)), 0);
        assert_eq!(ctx.assign(NodeId(1)), 1);
        assert_eq!(ctx.id_of(NodeId(0)), Some(0));
        assert_eq!(ctx.id_of(NodeId(9)), None);
    }

    #[test]
    fn register_updates_counter() {
        let mut ctx = SerializationContext::new();
        ctx.register(5, NodeId(0));
        assert_eq!(ctx.resolve(5), Some(NodeId(0)));
        assert_eq!(ctx.assign(NodeId(1)), 6);
    }

    #[test]
    fn dependency_bracket_nests() {
        let mut ctx = SerializationContext::new();
        assert!(!ctx.in_dependencies());
        ctx.begin_dependencies();
        ctx.begin_dependencies();
        ctx.end_dependencies();
        assert!(ctx.in_dependencies());
        ctx.end_dependencies();
        assert!(!ctx.in_dependencies());
    }
}
