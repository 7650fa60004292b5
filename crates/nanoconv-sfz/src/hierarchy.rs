//! Hierarchy builder: turns the flat block sequence into a complete
//! control > global > group > region tree.

use crate::lexer::AttributeBlock;
use crate::schema::HeaderKind;
use crate::tree::{DocumentNode, DocumentTree, NodeId};

/// Nest blocks by header precedence and materialize omitted levels.
///
/// Each block becomes a child of the most recent open block of a coarser
/// kind; a block closes every open block of its own or a finer kind.
/// Afterwards every run of children that skips a level is wrapped in one
/// synthesized empty node of the missing kind, so every root-to-leaf path
/// walks through all kinds in order. Several top-level `<control>` blocks
/// are merged into the first one; the opcodes of a later control only reach
/// the nodes that followed it.
pub fn build(blocks: Vec<AttributeBlock>) -> DocumentTree {
    // The placeholder root stands for the document itself and is discarded.
    let mut tree = DocumentTree::new(HeaderKind::Control);
    let document = tree.root();
    let mut open: [Option<NodeId>; 4] = [None; 4];

    for block in blocks {
        let depth = block.kind.depth();
        let parent = open[..depth]
            .iter()
            .rev()
            .find_map(|id| *id)
            .unwrap_or(document);

        let id = tree.push_child(parent, DocumentNode::with_opcodes(block.kind, block.opcodes));
        open[depth] = Some(id);
        for slot in open.iter_mut().skip(depth + 1) {
            *slot = None;
        }
    }

    materialize(&mut tree, document, HeaderKind::Control);

    let controls = tree.children(document).to_vec();
    let Some((&first, rest)) = controls.split_first() else {
        return DocumentTree::new(HeaderKind::Control);
    };
    for &other in rest {
        merge_control(&mut tree, first, other);
    }
    tree.set_root(first);

    log::debug!("Built hierarchy with depth {}", tree.depth());
    tree
}

/// Wrap runs of too-fine children of `parent` in nodes of `level`, then
/// recurse into the children.
fn materialize(tree: &mut DocumentTree, parent: NodeId, level: HeaderKind) {
    let mut runs: Vec<Vec<NodeId>> = Vec::new();
    let mut in_run = false;
    for &child in tree.children(parent) {
        if tree.node(child).kind > level {
            if !in_run {
                runs.push(Vec::new());
                in_run = true;
            }
            if let Some(run) = runs.last_mut() {
                run.push(child);
            }
        } else {
            in_run = false;
        }
    }

    for run in runs {
        let position = tree
            .children(parent)
            .iter()
            .position(|child| *child == run[0])
            .unwrap_or(0);
        let wrapper = tree.add_node(DocumentNode::new(level));
        tree.insert_child(parent, position, wrapper);
        log::debug!("Synthesized {} around {} node(s)", level, run.len());
        for member in run {
            tree.append_child(wrapper, member);
        }
    }

    for child in tree.children(parent).to_vec() {
        if let Some(finer) = tree.node(child).kind.finer() {
            materialize(tree, child, finer);
        }
    }
}

/// Fold a later top-level control into the first.
///
/// Its opcodes are handed to its own children first, where a child's value
/// wins, so only the structure is merged.
fn merge_control(tree: &mut DocumentTree, into: NodeId, other: NodeId) {
    log::debug!("Merging additional {} into the first one", HeaderKind::Control);
    let opcodes = std::mem::take(&mut tree.node_mut(other).opcodes);
    for child in tree.children(other).to_vec() {
        let node = tree.node_mut(child);
        for (opcode, value) in &opcodes {
            node.opcodes
                .entry(opcode.clone())
                .or_insert_with(|| value.clone());
        }
        tree.append_child(into, child);
    }
    tree.detach(other);
}
