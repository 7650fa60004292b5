//! The resolved instrument tree.
//!
//! Nodes live in an arena owned by [`DocumentTree`] and refer to each other
//! by [`NodeId`]. The parent's child list owns the structure; the parent
//! index is only used for navigation. Removing a subtree detaches it from
//! its parent, after which it is unreachable from the root and ignored by
//! every query.

use std::collections::BTreeMap;
use std::fmt;

use crate::schema::{HeaderKind, Opcode};

/// Index of a node in its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// One header block of the instrument with its opcodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentNode {
    pub kind: HeaderKind,
    pub opcodes: BTreeMap<Opcode, String>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl DocumentNode {
    pub fn new(kind: HeaderKind) -> Self {
        Self::with_opcodes(kind, BTreeMap::new())
    }

    pub fn with_opcodes(kind: HeaderKind, opcodes: BTreeMap<Opcode, String>) -> Self {
        Self {
            kind,
            opcodes,
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn get(&self, opcode: &Opcode) -> Option<&str> {
        self.opcodes.get(opcode).map(String::as_str)
    }

    pub fn set(&mut self, opcode: Opcode, value: impl Into<String>) -> Option<String> {
        self.opcodes.insert(opcode, value.into())
    }

    pub fn remove(&mut self, opcode: &Opcode) -> Option<String> {
        self.opcodes.remove(opcode)
    }

    pub fn contains(&self, opcode: &Opcode) -> bool {
        self.opcodes.contains_key(opcode)
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena-backed tree of [`DocumentNode`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTree {
    nodes: Vec<DocumentNode>,
    root: NodeId,
}

impl DocumentTree {
    /// A tree holding a single empty node of `root_kind`.
    pub fn new(root_kind: HeaderKind) -> Self {
        Self {
            nodes: vec![DocumentNode::new(root_kind)],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Make a detached node the root.
    pub(crate) fn set_root(&mut self, id: NodeId) {
        self.detach(id);
        self.root = id;
    }

    pub fn node(&self, id: NodeId) -> &DocumentNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut DocumentNode {
        &mut self.nodes[id.0]
    }

    /// Add a node to the arena without attaching it anywhere.
    pub fn add_node(&mut self, node: DocumentNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Add a node as the last child of `parent`.
    pub fn push_child(&mut self, parent: NodeId, node: DocumentNode) -> NodeId {
        let id = self.add_node(node);
        self.append_child(parent, id);
        id
    }

    /// Move `child` to the end of `parent`'s children.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let len = self.nodes[parent.0].children.len();
        self.insert_child(parent, len, child);
    }

    /// Move `child` into `parent`'s children at `index`.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(index, child);
    }

    /// Unlink a node (and with it its subtree) from its parent.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != id);
        }
    }

    /// Replace a node by its children in its parent's child list.
    ///
    /// Returns false when the node has no parent.
    pub fn splice_into_parent(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.nodes[id.0].parent else {
            return false;
        };
        let position = self.nodes[parent.0]
            .children
            .iter()
            .position(|child| *child == id)
            .unwrap_or(self.nodes[parent.0].children.len());
        let children = std::mem::take(&mut self.nodes[id.0].children);

        self.detach(id);
        for (offset, child) in children.into_iter().enumerate() {
            self.nodes[child.0].parent = None;
            self.insert_child(parent, position + offset, child);
        }
        true
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Every reachable node in depth-first pre-order.
    pub fn walk(&self) -> Vec<NodeId> {
        self.walk_from(self.root)
    }

    /// The subtree rooted at `id` in depth-first pre-order.
    pub fn walk_from(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            order.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        order
    }

    /// Reachable nodes of one kind, in document order.
    pub fn nodes_of_kind(&self, kind: HeaderKind) -> Vec<NodeId> {
        self.walk()
            .into_iter()
            .filter(|id| self.node(*id).kind == kind)
            .collect()
    }

    /// Whether any node strictly below `id` has the given kind.
    pub fn has_descendant_of_kind(&self, id: NodeId, kind: HeaderKind) -> bool {
        self.walk_from(id)
            .into_iter()
            .skip(1)
            .any(|descendant| self.node(descendant).kind == kind)
    }

    /// Header kinds from the root down to `id`.
    pub fn path_kinds(&self, id: NodeId) -> Vec<HeaderKind> {
        let mut kinds = vec![self.node(id).kind];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            kinds.push(self.node(parent).kind);
            current = parent;
        }
        kinds.reverse();
        kinds
    }

    /// Number of levels on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        self.walk()
            .into_iter()
            .filter(|id| self.node(*id).is_leaf())
            .map(|leaf| self.path_kinds(leaf).len())
            .max()
            .unwrap_or(0)
    }

    fn fmt_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, indent: usize) -> fmt::Result {
        let node = self.node(id);
        write!(f, "{:indent$}{}", "", node.kind, indent = indent * 2)?;
        for (opcode, value) in &node.opcodes {
            write!(f, " {}={}", opcode, value)?;
        }
        writeln!(f)?;
        for child in self.children(id) {
            self.fmt_node(f, *child, indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for DocumentTree {
    /// Render the tree in SFZ syntax, one header per line, indented by depth.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(f, self.root, 0)
    }
}
