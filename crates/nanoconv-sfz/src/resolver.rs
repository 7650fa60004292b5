//! Opcode resolver: moves every opcode to a level of the hierarchy that is
//! allowed to carry it.
//!
//! Two passes run in order:
//!
//! 1. **Push-down** (pre-order). Opcodes a node may not carry, and that no
//!    coarser level may carry either, are handed to every child. A child's
//!    own value wins over an inherited one.
//! 2. **Pull-up** (finest level first). Opcodes a node may not carry move to
//!    its parent. The parent's existing value wins over the escalated one.
//!
//! Opcodes that find no legal level are dropped and reported as
//! [`SchemaViolation`]s. After [`Resolver::resolve`] every node carries only
//! opcodes from its kind's whitelist, so a second run changes nothing.

use std::collections::BTreeMap;
use std::fmt;

use crate::schema::{HeaderKind, Opcode, Schema};
use crate::tree::{DocumentTree, NodeId};

/// An opcode dropped because no level of the target format accepts it
/// where it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Kind of the node the opcode was removed from
    pub kind: HeaderKind,
    pub opcode: Opcode,
    pub value: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}={}", self.kind, self.opcode, self.value)
    }
}

pub struct Resolver {
    schema: &'static Schema,
}

impl Resolver {
    pub fn new(schema: &'static Schema) -> Self {
        Self { schema }
    }

    /// Run push-down then pull-up.
    pub fn resolve(&self, tree: &mut DocumentTree) -> Vec<SchemaViolation> {
        let mut violations = self.push_down(tree);
        violations.extend(self.pull_up(tree));

        for violation in &violations {
            log::debug!("Dropped {}", violation);
        }
        violations
    }

    pub fn push_down(&self, tree: &mut DocumentTree) -> Vec<SchemaViolation> {
        let mut violations = Vec::new();
        self.push_down_node(tree, tree.root(), BTreeMap::new(), &mut violations);
        violations
    }

    fn push_down_node(
        &self,
        tree: &mut DocumentTree,
        id: NodeId,
        inherited: BTreeMap<Opcode, String>,
        violations: &mut Vec<SchemaViolation>,
    ) {
        let children = tree.children(id).to_vec();
        let node = tree.node_mut(id);
        let kind = node.kind;

        let mut received = Vec::new();
        for (opcode, value) in inherited {
            if !node.contains(&opcode) {
                received.push(opcode.clone());
                node.set(opcode, value);
            }
        }

        if children.is_empty() {
            for opcode in received {
                if !self.schema.is_legal(kind, &opcode) {
                    if let Some(value) = node.remove(&opcode) {
                        violations.push(SchemaViolation {
                            kind,
                            opcode,
                            value,
                        });
                    }
                }
            }
            return;
        }

        let carried: Vec<Opcode> = node
            .opcodes
            .keys()
            .filter(|opcode| {
                !self.schema.is_legal(kind, opcode) && !self.schema.is_legal_above(kind, opcode)
            })
            .cloned()
            .collect();
        let mut carry = BTreeMap::new();
        for opcode in carried {
            if let Some(value) = node.remove(&opcode) {
                log::debug!("Pushing {}={} down from {}", opcode, value, kind);
                carry.insert(opcode, value);
            }
        }

        for child in children {
            self.push_down_node(tree, child, carry.clone(), violations);
        }
    }

    pub fn pull_up(&self, tree: &mut DocumentTree) -> Vec<SchemaViolation> {
        let mut violations = Vec::new();

        for kind in HeaderKind::ALL.iter().rev() {
            for id in tree.nodes_of_kind(*kind) {
                let illegal: Vec<Opcode> = tree
                    .node(id)
                    .opcodes
                    .keys()
                    .filter(|opcode| !self.schema.is_legal(*kind, opcode))
                    .cloned()
                    .collect();
                if illegal.is_empty() {
                    continue;
                }

                let parent = tree.parent(id);
                for opcode in illegal {
                    let Some(value) = tree.node_mut(id).remove(&opcode) else {
                        continue;
                    };
                    match parent {
                        Some(parent) => {
                            let target = tree.node_mut(parent);
                            if target.contains(&opcode) {
                                log::debug!(
                                    "Discarding {}={} from {}, {} already sets it",
                                    opcode,
                                    value,
                                    kind,
                                    target.kind
                                );
                            } else {
                                log::debug!("Pulling {}={} up from {}", opcode, value, kind);
                                target.set(opcode, value);
                            }
                        }
                        None => violations.push(SchemaViolation {
                            kind: *kind,
                            opcode,
                            value,
                        }),
                    }
                }
            }
        }

        violations
    }
}
