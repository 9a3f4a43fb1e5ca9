//! Spatial index (spec §4.3): add/remove/move points, query an axis-aligned
//! box.
//!
//! Grounded in `lobotomy/quadtree.py`'s `QuadTree`/`Region`/`Point` shape —
//! a region splits past 4 points and merges back at <= 4, points carry a
//! back-reference to their current leaf for O(depth) removal/move — but
//! re-architected per the "Polymorphism" and "Cyclic references" design
//! notes: points are opaque handles (indices into an arena) rather than
//! objects with parent pointers, and the tree owns its nodes in a flat
//! `Vec` instead of a `parent`-linked object graph, so there is nothing to
//! leak or borrow-check around. `PointId` is the opaque handle spec §4.3
//! describes; `payload` is the caller's own identifier for the point
//! (LoBotomy threads a `PlayerId` through it).

use crate::geometry::{Point, Rect};

pub type PointId = usize;
type NodeId = usize;

/// A quadtree node's children, in top-left/top-right/bottom-left/bottom-right
/// order.
const SPLIT_THRESHOLD: usize = 4;

enum NodeState {
    Leaf(Vec<PointId>),
    Branch([NodeId; 4]),
}

struct Node {
    bounds: Rect,
    parent: Option<NodeId>,
    state: NodeState,
}

struct Slot<T> {
    x: f64,
    y: f64,
    leaf: NodeId,
    payload: T,
}

/// A point in the quadtree: `(x, y)` plus a caller-supplied payload.
pub struct QuadTree<T> {
    nodes: Vec<Option<Node>>,
    free_nodes: Vec<NodeId>,
    points: Vec<Option<Slot<T>>>,
    free_points: Vec<PointId>,
    root: NodeId,
}

impl<T: Copy> QuadTree<T> {
    pub fn new(bounds: Rect) -> Self {
        let root_node = Node {
            bounds,
            parent: None,
            state: NodeState::Leaf(Vec::new()),
        };
        Self {
            nodes: vec![Some(root_node)],
            free_nodes: Vec::new(),
            points: Vec::new(),
            free_points: Vec::new(),
            root: 0,
        }
    }

    fn node(&self, id: NodeId) -> &Node {
        self.nodes[id].as_ref().expect("dangling node id")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id].as_mut().expect("dangling node id")
    }

    fn alloc_node(&mut self, node: Node) -> NodeId {
        if let Some(id) = self.free_nodes.pop() {
            self.nodes[id] = Some(node);
            id
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn free_node(&mut self, id: NodeId) {
        self.nodes[id] = None;
        self.free_nodes.push(id);
    }

    fn alloc_point(&mut self, slot: Slot<T>) -> PointId {
        if let Some(id) = self.free_points.pop() {
            self.points[id] = Some(slot);
            id
        } else {
            self.points.push(Some(slot));
            self.points.len() - 1
        }
    }

    fn find_leaf(&self, x: f64, y: f64) -> NodeId {
        let mut current = self.root;
        loop {
            match &self.node(current).state {
                NodeState::Leaf(_) => return current,
                NodeState::Branch(children) => {
                    let child = children
                        .iter()
                        .copied()
                        .find(|&c| self.node(c).bounds.contains(Point::new(x, y)))
                        .expect("point outside all quadrants of a branch node");
                    current = child;
                }
            }
        }
    }

    /// Adds `(x, y)` with the given payload, returning its handle.
    pub fn add(&mut self, x: f64, y: f64, payload: T) -> PointId {
        let leaf = self.find_leaf(x, y);
        let id = self.alloc_point(Slot { x, y, leaf, payload });
        match &mut self.node_mut(leaf).state {
            NodeState::Leaf(points) => points.push(id),
            NodeState::Branch(_) => unreachable!("find_leaf never returns a branch"),
        }
        self.maybe_split(leaf);
        id
    }

    fn quadrants(bounds: Rect) -> [Rect; 4] {
        let mx = (bounds.x1 + bounds.x2) / 2.0;
        let my = (bounds.y1 + bounds.y2) / 2.0;
        [
            Rect::new(bounds.x1, bounds.y1, mx, my),
            Rect::new(mx, bounds.y1, bounds.x2, my),
            Rect::new(bounds.x1, my, mx, bounds.y2),
            Rect::new(mx, my, bounds.x2, bounds.y2),
        ]
    }

    fn maybe_split(&mut self, node_id: NodeId) {
        let points = match &self.node(node_id).state {
            NodeState::Leaf(points) if points.len() > SPLIT_THRESHOLD => points.clone(),
            _ => return,
        };

        let bounds = self.node(node_id).bounds;
        let quadrants = Self::quadrants(bounds);
        let mut child_ids = [0usize; 4];
        let mut child_points: [Vec<PointId>; 4] = Default::default();

        for &id in &points {
            let (x, y) = {
                let slot = self.points[id].as_ref().unwrap();
                (slot.x, slot.y)
            };
            let q = quadrants
                .iter()
                .position(|r| r.contains(Point::new(x, y)))
                .expect("point outside its own region's quadrants");
            child_points[q].push(id);
        }

        for i in 0..4 {
            let child_id = self.alloc_node(Node {
                bounds: quadrants[i],
                parent: Some(node_id),
                state: NodeState::Leaf(std::mem::take(&mut child_points[i])),
            });
            child_ids[i] = child_id;
            let point_ids: Vec<PointId> = match &self.node(child_id).state {
                NodeState::Leaf(p) => p.clone(),
                NodeState::Branch(_) => unreachable!(),
            };
            for pid in point_ids {
                self.points[pid].as_mut().unwrap().leaf = child_id;
            }
        }

        self.node_mut(node_id).state = NodeState::Branch(child_ids);
    }

    /// Attempts to merge `node_id` (and recursively, its children) back into
    /// a leaf once its total point count falls to the threshold.
    fn maybe_merge(&mut self, node_id: NodeId) {
        let children = match &self.node(node_id).state {
            NodeState::Branch(children) => *children,
            NodeState::Leaf(_) => return,
        };

        for &child in &children {
            self.maybe_merge(child);
        }

        let mut collected = Vec::new();
        let mut all_leaves = true;
        for &child in &children {
            match &self.node(child).state {
                NodeState::Leaf(points) => collected.extend(points.iter().copied()),
                NodeState::Branch(_) => all_leaves = false,
            }
        }

        if all_leaves && collected.len() <= SPLIT_THRESHOLD {
            for &id in &collected {
                self.points[id].as_mut().unwrap().leaf = node_id;
            }
            for &child in &children {
                self.free_node(child);
            }
            self.node_mut(node_id).state = NodeState::Leaf(collected);
        }
    }

    /// Removes a previously added point.
    pub fn remove(&mut self, id: PointId) {
        let slot = self.points[id].take().expect("double remove of point");
        match &mut self.node_mut(slot.leaf).state {
            NodeState::Leaf(points) => {
                let pos = points.iter().position(|&p| p == id).expect("point not in its leaf");
                points.swap_remove(pos);
            }
            NodeState::Branch(_) => unreachable!("slot.leaf always references a leaf"),
        }
        self.free_points.push(id);
        if let Some(parent) = self.node(slot.leaf).parent {
            self.maybe_merge(parent);
        }
    }

    /// Moves a previously added point to `(new_x, new_y)`.
    pub fn move_point(&mut self, id: PointId, new_x: f64, new_y: f64) {
        let old_leaf = self.points[id].as_ref().expect("moving a removed point").leaf;

        if self.node(old_leaf).bounds.contains(Point::new(new_x, new_y)) {
            let slot = self.points[id].as_mut().unwrap();
            slot.x = new_x;
            slot.y = new_y;
            return;
        }

        match &mut self.node_mut(old_leaf).state {
            NodeState::Leaf(points) => {
                let pos = points.iter().position(|&p| p == id).expect("point not in its leaf");
                points.swap_remove(pos);
            }
            NodeState::Branch(_) => unreachable!(),
        }
        if let Some(parent) = self.node(old_leaf).parent {
            self.maybe_merge(parent);
        }

        let new_leaf = self.find_leaf(new_x, new_y);
        {
            let slot = self.points[id].as_mut().unwrap();
            slot.x = new_x;
            slot.y = new_y;
            slot.leaf = new_leaf;
        }
        match &mut self.node_mut(new_leaf).state {
            NodeState::Leaf(points) => points.push(id),
            NodeState::Branch(_) => unreachable!("find_leaf never returns a branch"),
        }
        self.maybe_split(new_leaf);
    }

    fn collect(&self, node_id: NodeId, query: &Rect, out: &mut Vec<PointId>) {
        let node = self.node(node_id);
        if !node.bounds.intersects(query) {
            return;
        }
        match &node.state {
            NodeState::Leaf(points) => {
                for &id in points {
                    let slot = self.points[id].as_ref().unwrap();
                    if query.contains(Point::new(slot.x, slot.y)) {
                        out.push(id);
                    }
                }
            }
            NodeState::Branch(children) => {
                for &child in children {
                    self.collect(child, query, out);
                }
            }
        }
    }

    /// Returns the handles of every added point whose `(x, y)` lies in
    /// `[x1, x2) x [y1, y2)`, in no particular order, with no duplicates.
    pub fn find_in_box(&self, query: Rect) -> Vec<PointId> {
        let mut out = Vec::new();
        self.collect(self.root, &query, &mut out);
        out
    }

    pub fn position(&self, id: PointId) -> Point {
        let slot = self.points[id].as_ref().expect("dangling point id");
        Point::new(slot.x, slot.y)
    }

    pub fn payload(&self, id: PointId) -> T {
        self.points[id].as_ref().expect("dangling point id").payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> Rect {
        Rect::new(0.0, 0.0, 2.0, 2.0)
    }

    #[test]
    fn find_in_box_returns_contained_points_only() {
        let mut tree: QuadTree<u32> = QuadTree::new(field());
        let a = tree.add(0.1, 0.1, 1);
        let _b = tree.add(1.9, 1.9, 2);
        let found = tree.find_in_box(Rect::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(found, vec![a]);
    }

    #[test]
    fn find_in_box_excludes_upper_bound_edge() {
        let mut tree: QuadTree<u32> = QuadTree::new(field());
        tree.add(1.0, 1.0, 1);
        let found = tree.find_in_box(Rect::new(0.0, 0.0, 1.0, 1.0));
        assert!(found.is_empty());
    }

    #[test]
    fn split_and_merge_round_trip() {
        let mut tree: QuadTree<u32> = QuadTree::new(field());
        let ids: Vec<_> = (0..8)
            .map(|i| tree.add(0.01 * i as f64, 0.01 * i as f64, i))
            .collect();

        // with 8 points clustered near the origin the root must have split
        assert_eq!(tree.find_in_box(field()).len(), 8);

        for &id in &ids[..6] {
            tree.remove(id);
        }

        // down to 2 points, tree should have merged back without losing data
        let remaining = tree.find_in_box(field());
        assert_eq!(remaining.len(), 2);
    }

    #[test]
    fn move_across_quadrant_boundary_is_found_at_new_location() {
        let mut tree: QuadTree<u32> = QuadTree::new(field());
        let id = tree.add(0.1, 0.1, 42);
        tree.move_point(id, 1.9, 1.9);

        assert!(tree.find_in_box(Rect::new(0.0, 0.0, 1.0, 1.0)).is_empty());
        let found = tree.find_in_box(Rect::new(1.5, 1.5, 2.0, 2.0));
        assert_eq!(found, vec![id]);
        assert_eq!(tree.payload(id), 42);
    }

    #[test]
    fn no_duplicates_across_many_points() {
        let mut tree: QuadTree<u32> = QuadTree::new(field());
        for i in 0..50 {
            let x = (i as f64 * 0.037) % 2.0;
            let y = (i as f64 * 0.071) % 2.0;
            tree.add(x, y, i);
        }
        let all = tree.find_in_box(field());
        let mut sorted = all.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(all.len(), sorted.len());
        assert_eq!(all.len(), 50);
    }
}
