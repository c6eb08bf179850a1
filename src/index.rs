//! Red-black tree over event keys.
//!
//! [`EventIndex`] holds one node per distinct [`EventKey`] with pending events. Nodes are stored in a
//! contiguous arena and addressed by [`NodeId`]. A reserved id stands in for the absent child, it is
//! always black and never stored. Every rotation only reassigns child and parent ids, so no node is
//! ever aliased.
//!
//! The minimum node is cached and updated on every insertion and removal, which makes
//! [`EventIndex::minimum`] O(1).

use std::cmp::Ordering;
use std::fmt;

use crate::error::InvariantViolation;
use crate::event::EventKey;
use crate::list::EventList;

/// Identifier of a node in an [`EventIndex`].
///
/// Ids of removed nodes are recycled, so an id must not be used after the node was removed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) const NIL: NodeId = NodeId(u32::MAX);

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == NodeId::NIL {
            write!(f, "NodeId(nil)")
        } else {
            write!(f, "NodeId({})", self.0)
        }
    }
}

const NIL: NodeId = NodeId::NIL;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Side {
    Left,
    Right,
}

impl Side {
    fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

// Shapes handled by node removal, tracked in tests to make sure each one is exercised.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum DeleteCase {
    RedRemoved,
    RedReplacement,
    RedSibling(Side),
    BlackNephews(Side),
    NearNephewRed(Side),
    FarNephewRed(Side),
}

#[derive(Clone, Debug)]
struct Node {
    key: EventKey,
    color: Color,
    parent: NodeId,
    left: NodeId,
    right: NodeId,
    list: EventList,
    linked: bool,
}

impl Node {
    fn child(&self, side: Side) -> NodeId {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    fn child_mut(&mut self, side: Side) -> &mut NodeId {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

/// Balanced search tree of event nodes ordered by `(tick, priority)`.
#[derive(Clone, Debug)]
pub struct EventIndex {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    root: NodeId,
    min: NodeId,
    len: usize,
    #[cfg(test)]
    seen_cases: std::collections::HashSet<DeleteCase>,
}

impl Default for EventIndex {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl EventIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty index with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            root: NIL,
            min: NIL,
            len: 0,
            #[cfg(test)]
            seen_cases: Default::default(),
        }
    }

    /// Returns the number of nodes in the index.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the index holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the key of node `id`.
    pub fn key(&self, id: NodeId) -> EventKey {
        self.node(id).key
    }

    /// Returns the node with the earliest key.
    pub fn minimum(&self) -> Option<NodeId> {
        (self.min != NIL).then_some(self.min)
    }

    /// Looks up the node for `key`.
    pub fn find(&self, key: EventKey) -> Option<NodeId> {
        let mut cursor = self.root;
        while cursor != NIL {
            let node = self.node(cursor);
            cursor = match key.cmp(&node.key) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return Some(cursor),
            };
        }
        None
    }

    /// Returns the node for `key`, inserting a new one if there is none.
    pub fn find_or_create(&mut self, key: EventKey) -> NodeId {
        self.entry(key).0
    }

    /// Like [`find_or_create`](Self::find_or_create), also reporting whether the node was created.
    pub(crate) fn entry(&mut self, key: EventKey) -> (NodeId, bool) {
        let mut parent = NIL;
        let mut side = Side::Left;
        let mut cursor = self.root;
        while cursor != NIL {
            let node = self.node(cursor);
            parent = cursor;
            (side, cursor) = match key.cmp(&node.key) {
                Ordering::Less => (Side::Left, node.left),
                Ordering::Greater => (Side::Right, node.right),
                Ordering::Equal => return (cursor, false),
            };
        }

        let id = self.alloc(key, parent);
        if parent == NIL {
            self.root = id;
        } else {
            self.set_child(parent, side, id);
        }
        if self.min == NIL || key < self.node(self.min).key {
            self.min = id;
        }
        self.len += 1;
        self.insert_fixup(id);
        (id, true)
    }

    /// Removes node `id` from the index.
    ///
    /// # Panics
    ///
    /// Panics if the node still holds events or is not part of the index.
    pub fn remove(&mut self, z: NodeId) {
        let node = self.node(z);
        assert!(node.linked, "{:?} is not part of the index", z);
        assert!(
            node.list.is_empty(),
            "node {} removed with {} pending events",
            node.key,
            node.list.len()
        );
        let left = node.left;
        let right = node.right;
        let mut removed_color = node.color;

        if z == self.min {
            self.min = self.successor(z);
        }

        let x;
        let x_parent;
        if left == NIL {
            x = right;
            x_parent = self.parent(z);
            self.transplant(z, right);
        } else if right == NIL {
            x = left;
            x_parent = self.parent(z);
            self.transplant(z, left);
        } else {
            let y = self.subtree_min(right);
            removed_color = self.node(y).color;
            x = self.node(y).right;
            if self.parent(y) == z {
                x_parent = y;
            } else {
                x_parent = self.parent(y);
                self.transplant(y, x);
                self.set_child(y, Side::Right, right);
                self.set_parent(right, y);
            }
            self.transplant(z, y);
            self.set_child(y, Side::Left, left);
            self.set_parent(left, y);
            let color = self.node(z).color;
            self.node_mut(y).color = color;
        }

        if removed_color == Color::Black {
            self.delete_fixup(x, x_parent);
        } else {
            self.record(DeleteCase::RedRemoved);
        }
        self.release(z);
        self.len -= 1;
    }

    /// Iterates over node ids in key order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            index: self,
            cursor: self.min,
        }
    }

    /// Checks every structural invariant of the tree and returns its black height.
    ///
    /// The black height counts the absent children, so an empty tree has height 0 and a single
    /// node tree has height 2.
    pub fn validate(&self) -> Result<usize, InvariantViolation> {
        if self.root == NIL {
            if self.len != 0 {
                return Err(InvariantViolation::NodeCount {
                    expected: self.len,
                    found: 0,
                });
            }
            if self.min != NIL {
                return Err(InvariantViolation::StaleMinimum);
            }
            return Ok(0);
        }
        if self.is_red(self.root) {
            return Err(InvariantViolation::RedRoot);
        }
        if self.parent(self.root) != NIL {
            return Err(InvariantViolation::BrokenParentLink {
                key: self.key(self.root),
            });
        }
        let mut count = 0;
        let height = self.check_subtree(self.root, None, None, &mut count)?;
        if count != self.len {
            return Err(InvariantViolation::NodeCount {
                expected: self.len,
                found: count,
            });
        }
        if self.min != self.subtree_min(self.root) {
            return Err(InvariantViolation::StaleMinimum);
        }
        Ok(height)
    }

    pub(crate) fn list(&self, id: NodeId) -> &EventList {
        &self.node(id).list
    }

    pub(crate) fn list_mut(&mut self, id: NodeId) -> &mut EventList {
        &mut self.node_mut(id).list
    }

    fn check_subtree(
        &self,
        id: NodeId,
        lower: Option<EventKey>,
        upper: Option<EventKey>,
        count: &mut usize,
    ) -> Result<usize, InvariantViolation> {
        if id == NIL {
            return Ok(1);
        }
        let node = self.node(id);
        *count += 1;
        if !node.linked {
            return Err(InvariantViolation::UnlinkedNode { key: node.key });
        }
        if lower.is_some_and(|l| node.key <= l) || upper.is_some_and(|u| node.key >= u) {
            return Err(InvariantViolation::KeyOrder { key: node.key });
        }
        for child in [node.left, node.right] {
            if child != NIL && self.parent(child) != id {
                return Err(InvariantViolation::BrokenParentLink { key: self.key(child) });
            }
        }
        if node.color == Color::Red && (self.is_red(node.left) || self.is_red(node.right)) {
            return Err(InvariantViolation::RedRed { key: node.key });
        }
        let left = self.check_subtree(node.left, lower, Some(node.key), count)?;
        let right = self.check_subtree(node.right, Some(node.key), upper, count)?;
        if left != right {
            return Err(InvariantViolation::BlackHeight {
                key: node.key,
                left,
                right,
            });
        }
        Ok(left + usize::from(node.color == Color::Black))
    }

    fn alloc(&mut self, key: EventKey, parent: NodeId) -> NodeId {
        let node = Node {
            key,
            color: Color::Red,
            parent,
            left: NIL,
            right: NIL,
            list: EventList::default(),
            linked: true,
        };
        if let Some(id) = self.free.pop() {
            self.nodes[id.index()] = node;
            return id;
        }
        let id = NodeId(u32::try_from(self.nodes.len()).expect("node arena overflow"));
        assert!(id != NIL, "node arena overflow");
        self.nodes.push(node);
        id
    }

    fn release(&mut self, id: NodeId) {
        let node = self.node_mut(id);
        node.linked = false;
        node.parent = NIL;
        node.left = NIL;
        node.right = NIL;
        self.free.push(id);
    }

    fn node(&self, id: NodeId) -> &Node {
        match self.nodes.get(id.index()) {
            Some(node) => node,
            None => panic!("dangling {:?}", id),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.nodes.get_mut(id.index()) {
            Some(node) => node,
            None => panic!("dangling {:?}", id),
        }
    }

    fn is_red(&self, id: NodeId) -> bool {
        id != NIL && self.node(id).color == Color::Red
    }

    fn color(&self, id: NodeId) -> Color {
        if self.is_red(id) {
            Color::Red
        } else {
            Color::Black
        }
    }

    // the absent child is always black and never written to
    fn set_color(&mut self, id: NodeId, color: Color) {
        if id != NIL {
            self.node_mut(id).color = color;
        }
    }

    fn parent(&self, id: NodeId) -> NodeId {
        self.node(id).parent
    }

    fn set_parent(&mut self, id: NodeId, parent: NodeId) {
        if id != NIL {
            self.node_mut(id).parent = parent;
        }
    }

    fn child(&self, id: NodeId, side: Side) -> NodeId {
        self.node(id).child(side)
    }

    fn set_child(&mut self, id: NodeId, side: Side, child: NodeId) {
        *self.node_mut(id).child_mut(side) = child;
    }

    fn side_of(&self, id: NodeId, parent: NodeId) -> Side {
        if self.node(parent).left == id {
            Side::Left
        } else {
            Side::Right
        }
    }

    fn subtree_min(&self, mut id: NodeId) -> NodeId {
        if id == NIL {
            return NIL;
        }
        while self.node(id).left != NIL {
            id = self.node(id).left;
        }
        id
    }

    fn successor(&self, id: NodeId) -> NodeId {
        let right = self.node(id).right;
        if right != NIL {
            return self.subtree_min(right);
        }
        let mut child = id;
        let mut parent = self.parent(id);
        while parent != NIL && self.node(parent).right == child {
            child = parent;
            parent = self.parent(parent);
        }
        parent
    }

    // makes `new` take the place of `old` under the parent of `old`
    fn transplant(&mut self, old: NodeId, new: NodeId) {
        let parent = self.parent(old);
        if parent == NIL {
            self.root = new;
        } else {
            let side = self.side_of(old, parent);
            self.set_child(parent, side, new);
        }
        self.set_parent(new, parent);
    }

    // rotates `x` down towards `side`, lifting its child on the opposite side
    fn rotate(&mut self, x: NodeId, side: Side) {
        let other = side.opposite();
        let y = self.child(x, other);
        debug_assert!(y != NIL, "rotation without a child to lift");
        let inner = self.child(y, side);
        self.set_child(x, other, inner);
        self.set_parent(inner, x);
        self.transplant(x, y);
        self.set_child(y, side, x);
        self.set_parent(x, y);
    }

    fn insert_fixup(&mut self, mut z: NodeId) {
        while self.is_red(self.parent(z)) {
            let p = self.parent(z);
            // a red parent is never the root
            let g = self.parent(p);
            let side = self.side_of(p, g);
            let uncle = self.child(g, side.opposite());
            if self.is_red(uncle) {
                self.set_color(p, Color::Black);
                self.set_color(uncle, Color::Black);
                self.set_color(g, Color::Red);
                z = g;
            } else {
                if z == self.child(p, side.opposite()) {
                    z = p;
                    self.rotate(z, side);
                }
                let p = self.parent(z);
                let g = self.parent(p);
                self.set_color(p, Color::Black);
                self.set_color(g, Color::Red);
                self.rotate(g, side.opposite());
            }
        }
        self.set_color(self.root, Color::Black);
    }

    // `x` carries an extra black; `parent` is tracked explicitly since `x` may be the absent child
    fn delete_fixup(&mut self, mut x: NodeId, mut parent: NodeId) {
        if self.is_red(x) {
            self.record(DeleteCase::RedReplacement);
        }
        while x != self.root && !self.is_red(x) {
            let side = if self.child(parent, Side::Left) == x {
                Side::Left
            } else {
                Side::Right
            };
            let other = side.opposite();
            let mut w = self.child(parent, other);
            if self.is_red(w) {
                self.record(DeleteCase::RedSibling(side));
                self.set_color(w, Color::Black);
                self.set_color(parent, Color::Red);
                self.rotate(parent, side);
                w = self.child(parent, other);
            }
            if !self.is_red(self.child(w, side)) && !self.is_red(self.child(w, other)) {
                self.record(DeleteCase::BlackNephews(side));
                self.set_color(w, Color::Red);
                x = parent;
                parent = self.parent(x);
            } else {
                if !self.is_red(self.child(w, other)) {
                    self.record(DeleteCase::NearNephewRed(side));
                    let near = self.child(w, side);
                    self.set_color(near, Color::Black);
                    self.set_color(w, Color::Red);
                    self.rotate(w, other);
                    w = self.child(parent, other);
                }
                self.record(DeleteCase::FarNephewRed(side));
                self.set_color(w, self.color(parent));
                self.set_color(parent, Color::Black);
                let far = self.child(w, other);
                self.set_color(far, Color::Black);
                self.rotate(parent, side);
                x = self.root;
                parent = NIL;
            }
        }
        self.set_color(x, Color::Black);
    }

    #[cfg(test)]
    fn record(&mut self, case: DeleteCase) {
        self.seen_cases.insert(case);
    }

    #[cfg(not(test))]
    #[inline(always)]
    fn record(&mut self, _case: DeleteCase) {}
}

/// In-order iterator over the nodes of an [`EventIndex`].
pub struct Iter<'a> {
    index: &'a EventIndex,
    cursor: NodeId,
}

impl Iterator for Iter<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.cursor == NIL {
            return None;
        }
        let id = self.cursor;
        self.cursor = self.index.successor(id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    use super::*;
    use crate::arena::Arena;
    use crate::event::Event;

    fn key(k: u64) -> EventKey {
        EventKey::new(k / 4, (k % 4) as i64 - 2)
    }

    fn keys(index: &EventIndex) -> Vec<EventKey> {
        index.iter().map(|id| index.key(id)).collect()
    }

    fn build(order: &[u64]) -> EventIndex {
        let mut index = EventIndex::new();
        for &k in order {
            index.find_or_create(key(k));
            index.validate().unwrap();
        }
        index
    }

    fn insertion_orders(n: u64) -> Vec<Vec<u64>> {
        let ascending: Vec<u64> = (0..n).collect();
        let descending: Vec<u64> = (0..n).rev().collect();
        // alternate between both ends to grow a zig-zag shape
        let mut zigzag = Vec::new();
        let (mut lo, mut hi) = (0, n);
        while lo < hi {
            zigzag.push(lo);
            lo += 1;
            if lo < hi {
                hi -= 1;
                zigzag.push(hi);
            }
        }
        vec![ascending, descending, zigzag]
    }

    #[test]
    fn empty_index() {
        let index = EventIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.minimum(), None);
        assert_eq!(index.find(key(3)), None);
        assert_eq!(index.validate(), Ok(0));
        assert_eq!(index.iter().count(), 0);
    }

    #[test]
    fn find_or_create_returns_existing_node() {
        let mut index = EventIndex::new();
        let a = index.find_or_create(EventKey::new(5, 0));
        let b = index.find_or_create(EventKey::new(3, 1));
        assert_ne!(a, b);
        assert_eq!(index.find_or_create(EventKey::new(5, 0)), a);
        assert_eq!(index.entry(EventKey::new(3, 1)), (b, false));
        assert_eq!(index.len(), 2);
        assert_eq!(index.minimum(), Some(b));
        assert_eq!(index.find(EventKey::new(5, 0)), Some(a));
        assert_eq!(index.find(EventKey::new(5, 1)), None);
    }

    #[test]
    fn sequential_inserts_stay_balanced() {
        for order in insertion_orders(256) {
            let index = build(&order);
            let height = index.validate().unwrap();
            // black height of a red-black tree with n nodes is at most log2(n + 1) + 1
            assert!(height <= 10, "black height {} too large", height);
            assert_eq!(keys(&index), (0..256).map(key).collect::<Vec<_>>());
            assert_eq!(index.key(index.minimum().unwrap()), key(0));
        }
    }

    #[test]
    fn every_deletion_position_in_small_trees() {
        for n in 1..=64 {
            for order in insertion_orders(n) {
                let base = build(&order);
                for k in 0..n {
                    let mut index = base.clone();
                    let id = index.find(key(k)).unwrap();
                    index.remove(id);
                    if let Err(e) = index.validate() {
                        panic!("removing {} from tree of {} ({:?}): {}", k, n, order, e);
                    }
                    let expected: Vec<_> = (0..n).filter(|&i| i != k).map(key).collect();
                    assert_eq!(keys(&index), expected);
                    assert_eq!(index.len(), n as usize - 1);
                    assert_eq!(index.find(key(k)), None);
                }
            }
        }
    }

    #[test]
    fn drain_by_minimum() {
        let mut index = build(&[7, 3, 11, 1, 5, 9, 13, 0, 2, 4, 6, 8, 10, 12, 14]);
        let mut drained = Vec::new();
        while let Some(min) = index.minimum() {
            drained.push(index.key(min));
            index.remove(min);
            index.validate().unwrap();
        }
        assert_eq!(drained, (0..15).map(key).collect::<Vec<_>>());
        assert!(index.is_empty());
    }

    #[test]
    fn random_workload_matches_model_and_hits_all_delete_cases() {
        let mut rng = Pcg64::seed_from_u64(0x5eed);
        let mut index = EventIndex::new();
        let mut model = BTreeSet::new();
        for _ in 0..20_000 {
            let k = key(rng.gen_range(0..512));
            if rng.gen_bool(0.55) {
                index.find_or_create(k);
                model.insert(k);
            } else if let Some(id) = index.find(k) {
                index.remove(id);
                model.remove(&k);
            } else {
                assert!(!model.contains(&k));
            }
            index.validate().unwrap();
            assert_eq!(index.len(), model.len());
            assert_eq!(index.minimum().map(|id| index.key(id)), model.first().copied());
        }
        assert_eq!(keys(&index), model.iter().copied().collect::<Vec<_>>());

        let mut expected = vec![DeleteCase::RedRemoved, DeleteCase::RedReplacement];
        for side in [Side::Left, Side::Right] {
            expected.push(DeleteCase::RedSibling(side));
            expected.push(DeleteCase::BlackNephews(side));
            expected.push(DeleteCase::NearNephewRed(side));
            expected.push(DeleteCase::FarNephewRed(side));
        }
        for case in expected {
            assert!(index.seen_cases.contains(&case), "{:?} never exercised", case);
        }
    }

    #[test]
    fn removed_ids_are_recycled() {
        let mut index = EventIndex::new();
        let a = index.find_or_create(key(1));
        index.find_or_create(key(2));
        index.remove(a);
        let c = index.find_or_create(key(3));
        assert_eq!(a, c);
        assert_eq!(index.key(c), key(3));
        assert_eq!(keys(&index), vec![key(2), key(3)]);
        index.validate().unwrap();
    }

    #[test]
    #[should_panic(expected = "pending events")]
    fn removing_node_with_events_panics() {
        let mut index = EventIndex::new();
        let mut events = Arena::with_capacity(1);
        let node = index.find_or_create(key(0));
        let event = events.insert(Event::new(Box::new(|_| {}), node, 0));
        index.list_mut(node).append(&mut events, event);
        index.remove(node);
    }
}
