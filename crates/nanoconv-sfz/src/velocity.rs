//! Velocity-layer manager.
//!
//! The target sampler maps every `<group>` to one velocity layer and only
//! supports a few non-overlapping layers with a bounded number of zones each.
//! [`VelocityLayers::apply`] cuts the resolved tree down to that shape.

use crate::schema::{HeaderKind, Opcode};
use crate::tree::{DocumentTree, NodeId};

pub const MIN_VELOCITY: u8 = 0;
pub const MAX_VELOCITY: u8 = 127;

/// Velocity range of one `<group>` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VelocityZone {
    pub node: NodeId,
    pub low: u8,
    pub high: u8,
}

impl VelocityZone {
    /// Read the bounds of a group, defaulting missing or unparseable ones.
    pub fn of(tree: &DocumentTree, node: NodeId) -> Self {
        let group = tree.node(node);
        Self {
            node,
            low: velocity(group.get(&Opcode::LoVel), MIN_VELOCITY),
            high: velocity(group.get(&Opcode::HiVel), MAX_VELOCITY),
        }
    }

    pub fn overlaps(&self, other: &VelocityZone) -> bool {
        self.low <= other.high && other.low <= self.high
    }
}

fn velocity(value: Option<&str>, default: u8) -> u8 {
    match value.map(|v| v.trim().parse::<i64>()) {
        None => default,
        Some(Ok(v)) => v.clamp(MIN_VELOCITY as i64, MAX_VELOCITY as i64) as u8,
        Some(Err(_)) => {
            log::warn!(
                "Ignoring velocity '{}', using {}",
                value.unwrap_or_default(),
                default
            );
            default
        }
    }
}

pub struct VelocityLayers {
    max_zones: usize,
    max_regions: usize,
}

impl VelocityLayers {
    pub fn new(max_zones: usize, max_regions: usize) -> Self {
        Self {
            max_zones,
            max_regions,
        }
    }

    /// Run every step: bounds defaulting, overlap elimination, zone capping,
    /// range extension, region capping and structural flattening.
    pub fn apply(&self, tree: &mut DocumentTree) {
        for parent in group_parents(tree) {
            let zones = self.default_bounds(tree, parent);
            let zones = self.eliminate_overlaps(tree, zones);
            let zones = self.cap_zones(tree, zones);
            self.extend_range(tree, &zones);
            for zone in &zones {
                self.cap_regions(tree, zone.node);
            }
        }
        flatten(tree);
    }

    /// Write explicit bounds on every group under `parent`.
    pub fn default_bounds(&self, tree: &mut DocumentTree, parent: NodeId) -> Vec<VelocityZone> {
        let groups: Vec<NodeId> = tree
            .children(parent)
            .iter()
            .copied()
            .filter(|child| tree.node(*child).kind == HeaderKind::Group)
            .collect();

        groups
            .into_iter()
            .map(|group| {
                let zone = VelocityZone::of(tree, group);
                write_bounds(tree, &zone);
                zone
            })
            .collect()
    }

    /// Delete every zone that overlaps an earlier surviving one.
    pub fn eliminate_overlaps(
        &self,
        tree: &mut DocumentTree,
        zones: Vec<VelocityZone>,
    ) -> Vec<VelocityZone> {
        let mut survivors: Vec<VelocityZone> = Vec::new();
        for zone in zones {
            if let Some(kept) = survivors.iter().find(|kept| kept.overlaps(&zone)) {
                log::info!(
                    "Dropping velocity layer {}-{}: overlaps {}-{}",
                    zone.low,
                    zone.high,
                    kept.low,
                    kept.high
                );
                tree.detach(zone.node);
            } else {
                survivors.push(zone);
            }
        }
        survivors
    }

    pub fn cap_zones(&self, tree: &mut DocumentTree, mut zones: Vec<VelocityZone>) -> Vec<VelocityZone> {
        if zones.len() > self.max_zones {
            log::info!(
                "Keeping {} of {} velocity layers",
                self.max_zones,
                zones.len()
            );
            for zone in zones.drain(self.max_zones..) {
                tree.detach(zone.node);
            }
        }
        zones
    }

    /// Stretch the outermost zones to cover the full velocity range.
    ///
    /// Gaps between zones stay open.
    pub fn extend_range(&self, tree: &mut DocumentTree, zones: &[VelocityZone]) {
        if let Some(lowest) = zones.iter().min_by_key(|zone| zone.low) {
            tree.node_mut(lowest.node)
                .set(Opcode::LoVel, MIN_VELOCITY.to_string());
        }
        if let Some(highest) = zones.iter().max_by_key(|zone| zone.high) {
            tree.node_mut(highest.node)
                .set(Opcode::HiVel, MAX_VELOCITY.to_string());
        }
    }

    /// Keep the first `max_regions` regions of a group.
    pub fn cap_regions(&self, tree: &mut DocumentTree, group: NodeId) {
        let regions: Vec<NodeId> = tree
            .children(group)
            .iter()
            .copied()
            .filter(|child| tree.node(*child).kind == HeaderKind::Region)
            .collect();
        if regions.len() <= self.max_regions {
            return;
        }

        log::info!(
            "Keeping {} of {} regions in one velocity layer",
            self.max_regions,
            regions.len()
        );
        for region in &regions[self.max_regions..] {
            tree.detach(*region);
        }
    }
}

fn write_bounds(tree: &mut DocumentTree, zone: &VelocityZone) {
    let node = tree.node_mut(zone.node);
    node.set(Opcode::LoVel, zone.low.to_string());
    node.set(Opcode::HiVel, zone.high.to_string());
}

/// Distinct parents of group nodes, in document order.
fn group_parents(tree: &DocumentTree) -> Vec<NodeId> {
    let mut parents = Vec::new();
    for group in tree.nodes_of_kind(HeaderKind::Group) {
        if let Some(parent) = tree.parent(group) {
            if !parents.contains(&parent) {
                parents.push(parent);
            }
        }
    }
    parents
}

/// Remove controls that hold no velocity layer.
///
/// A nested control is replaced by its children. A root control with a
/// single child hands the root over to that child.
pub fn flatten(tree: &mut DocumentTree) {
    for control in tree.nodes_of_kind(HeaderKind::Control) {
        if tree.has_descendant_of_kind(control, HeaderKind::Group) {
            continue;
        }
        if tree.splice_into_parent(control) {
            log::debug!("Flattened a {} without velocity layers", HeaderKind::Control);
        } else if let [only] = tree.children(control) {
            let only = *only;
            log::debug!("Promoting {} to root", tree.node(only).kind);
            tree.set_root(only);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::DocumentNode;

    fn layered_tree(ranges: &[(Option<&str>, Option<&str>)], regions: usize) -> DocumentTree {
        let mut tree = DocumentTree::new(HeaderKind::Control);
        let root = tree.root();
        let global = tree.push_child(root, DocumentNode::new(HeaderKind::Global));
        for (low, high) in ranges {
            let mut group = DocumentNode::new(HeaderKind::Group);
            if let Some(low) = low {
                group.set(Opcode::LoVel, *low);
            }
            if let Some(high) = high {
                group.set(Opcode::HiVel, *high);
            }
            let group = tree.push_child(global, group);
            for index in 0..regions {
                let mut region = DocumentNode::new(HeaderKind::Region);
                region.set(Opcode::Sample, format!("{}.wav", index));
                tree.push_child(group, region);
            }
        }
        tree
    }

    fn bounds(tree: &DocumentTree) -> Vec<(String, String)> {
        tree.nodes_of_kind(HeaderKind::Group)
            .into_iter()
            .map(|id| {
                let node = tree.node(id);
                (
                    node.get(&Opcode::LoVel).unwrap_or("-").to_string(),
                    node.get(&Opcode::HiVel).unwrap_or("-").to_string(),
                )
            })
            .collect()
    }

    fn pairs(values: &[(&str, &str)]) -> Vec<(String, String)> {
        values
            .iter()
            .map(|(lo, hi)| (lo.to_string(), hi.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_bounds_are_defaulted() {
        let mut tree = layered_tree(&[(None, None)], 1);
        VelocityLayers::new(3, 32).apply(&mut tree);
        assert_eq!(bounds(&tree), pairs(&[("0", "127")]));
    }

    #[test]
    fn test_overlapping_layers_first_wins() {
        let mut tree = layered_tree(
            &[
                (Some("0"), Some("63")),
                (Some("40"), Some("100")),
                (Some("90"), Some("127")),
            ],
            1,
        );
        VelocityLayers::new(3, 32).apply(&mut tree);
        assert_eq!(bounds(&tree), pairs(&[("0", "63"), ("90", "127")]));
    }

    #[test]
    fn test_range_is_extended_to_full_scale() {
        let mut tree = layered_tree(&[(Some("10"), Some("63")), (Some("64"), Some("100"))], 1);
        VelocityLayers::new(3, 32).apply(&mut tree);
        assert_eq!(bounds(&tree), pairs(&[("0", "63"), ("64", "127")]));
    }

    #[test]
    fn test_zone_cap() {
        let mut tree = layered_tree(
            &[
                (Some("0"), Some("31")),
                (Some("32"), Some("63")),
                (Some("64"), Some("95")),
                (Some("96"), Some("127")),
            ],
            1,
        );
        VelocityLayers::new(3, 32).apply(&mut tree);
        assert_eq!(
            bounds(&tree),
            pairs(&[("0", "31"), ("32", "63"), ("64", "127")])
        );
        assert_eq!(tree.nodes_of_kind(HeaderKind::Region).len(), 3);
    }

    #[test]
    fn test_region_cap_keeps_first_in_order() {
        let mut tree = layered_tree(&[(None, None)], 40);
        VelocityLayers::new(3, 32).apply(&mut tree);

        let samples: Vec<String> = tree
            .nodes_of_kind(HeaderKind::Region)
            .into_iter()
            .map(|id| tree.node(id).get(&Opcode::Sample).unwrap().to_string())
            .collect();
        let expected: Vec<String> = (0..32).map(|i| format!("{}.wav", i)).collect();
        assert_eq!(samples, expected);
    }

    #[test]
    fn test_bad_velocity_is_treated_as_missing() {
        let mut tree = layered_tree(&[(Some("soft"), Some("300"))], 1);
        VelocityLayers::new(3, 32).apply(&mut tree);
        assert_eq!(bounds(&tree), pairs(&[("0", "127")]));
    }

    #[test]
    fn test_control_without_layers_is_flattened() {
        let mut tree = DocumentTree::new(HeaderKind::Control);
        let root = tree.root();
        let global = tree.push_child(root, DocumentNode::new(HeaderKind::Global));
        VelocityLayers::new(3, 32).apply(&mut tree);
        assert_eq!(tree.root(), global);
        assert_eq!(tree.walk(), vec![global]);

        let mut tree = layered_tree(&[(None, None)], 1);
        let root = tree.root();
        flatten(&mut tree);
        assert_eq!(tree.root(), root);
    }
}
