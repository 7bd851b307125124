//! Positional index over the visible nodes of the replicated tree.
//!
//! The tree itself only knows parent/child relations; turning a document
//! position into a node would need a full pre-order walk. `OrderIndex` keeps
//! every node in a splay tree laid out in pre-order, with each entry weighted
//! 1 when visible and 0 when hidden. Subtree weights give positional lookup,
//! insertion after a known entry and position-of-entry in amortized
//! O(log n).
//!
//! Entries also carry their depth in the tree, and subtrees track the
//! shallowest depth below them. That finds where a node's own subtree ends
//! (the next entry no deeper than it) without walking the tree.
//!
//! Hidden entries are never unlinked. They stay in place with zero width so
//! that later insertions anchored on a tombstone can still be placed right
//! after it without searching for the nearest visible neighbour.

/// Stable handle to one entry of an [`OrderIndex`].
///
/// Handles stay valid for the whole life of the index because entries are
/// never physically removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location(usize);

#[derive(Debug, Clone)]
struct Entry<I> {
    item: I,
    /// 1 if visible, 0 if hidden
    weight: usize,
    /// Sum of weights in the subtree rooted here
    size: usize,
    /// Depth of the corresponding tree node
    depth: usize,
    /// Smallest depth in the subtree rooted here
    min_depth: usize,
    parent: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
}

/// A self-adjusting (splay) sequence with weighted positional access.
#[derive(Debug, Clone)]
pub struct OrderIndex<I> {
    entries: Vec<Entry<I>>,
    root: Option<usize>,
}

impl<I: Copy> Default for OrderIndex<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Copy> OrderIndex<I> {
    pub fn new() -> Self {
        OrderIndex {
            entries: Vec::new(),
            root: None,
        }
    }

    /// Number of visible entries.
    pub fn len(&self) -> usize {
        self.size_of(self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of entries, hidden ones included.
    pub fn total_len(&self) -> usize {
        self.entries.len()
    }

    /// Inserts an entry before everything else.
    ///
    /// Used once for the tree's root, which is a hidden anchor at depth 0
    /// at the very start of the pre-order.
    pub fn push_front(&mut self, item: I, visible: bool) -> Location {
        let n = self.alloc(item, visible, 0);
        if let Some(root) = self.root {
            self.entries[n].right = Some(root);
            self.entries[root].parent = Some(n);
            self.update(n);
        }
        self.root = Some(n);
        Location(n)
    }

    /// Inserts a visible entry immediately after `location`, one level
    /// deeper (its new first child).
    pub fn insert_after(&mut self, location: Location, item: I) -> Location {
        let at = location.0;
        let n = self.alloc(item, true, self.entries[at].depth + 1);

        self.splay(at);
        let right = self.entries[at].right;
        self.entries[n].right = right;
        if let Some(r) = right {
            self.entries[r].parent = Some(n);
        }
        self.entries[at].right = Some(n);
        self.entries[n].parent = Some(at);
        self.update(n);
        self.update(at);

        self.splay(n);
        Location(n)
    }

    /// Inserts a visible entry at the depth of `location`, right after the
    /// last entry of its subtree (its new next sibling).
    pub fn insert_after_subtree(&mut self, location: Location, item: I) -> Location {
        let at = location.0;
        let depth = self.entries[at].depth;
        let n = self.alloc(item, true, depth);

        self.splay(at);
        match self.first_no_deeper(self.entries[at].right, depth) {
            Some(next) => {
                let mut parent = next;
                match self.entries[next].left {
                    None => self.entries[next].left = Some(n),
                    Some(left) => {
                        parent = self.rightmost(left);
                        self.entries[parent].right = Some(n);
                    }
                }
                self.entries[n].parent = Some(parent);
            }
            None => {
                let last = self.rightmost(at);
                self.entries[last].right = Some(n);
                self.entries[n].parent = Some(last);
            }
        }

        self.splay(n);
        Location(n)
    }

    pub fn depth(&self, location: Location) -> usize {
        self.entries[location.0].depth
    }

    /// Drops the entry out of the positional ordering.
    ///
    /// The entry keeps its place as a zero-width anchor. Returns false if it
    /// was already hidden.
    pub fn remove_at(&mut self, location: Location) -> bool {
        let at = location.0;
        if self.entries[at].weight == 0 {
            return false;
        }
        self.splay(at);
        self.entries[at].weight = 0;
        self.update(at);
        true
    }

    pub fn is_visible(&self, location: Location) -> bool {
        self.entries[location.0].weight > 0
    }

    pub fn item(&self, location: Location) -> I {
        self.entries[location.0].item
    }

    /// Returns the item at visible position `position`, splaying it to the
    /// root.
    pub fn get(&mut self, position: usize) -> Option<I> {
        let found = self.locate(position)?;
        self.splay(found);
        Some(self.entries[found].item)
    }

    /// Same as [`get`](Self::get) without restructuring the tree.
    pub fn peek(&self, position: usize) -> Option<I> {
        self.locate(position).map(|found| self.entries[found].item)
    }

    /// Returns the visible position of `location`, or `None` if it is hidden.
    pub fn index_of(&mut self, location: Location) -> Option<usize> {
        let at = location.0;
        if self.entries[at].weight == 0 {
            return None;
        }
        self.splay(at);
        Some(self.size_of(self.entries[at].left))
    }

    /// Visible items in positional order.
    pub fn iter(&self) -> Iter<'_, I> {
        let mut iter = Iter {
            index: self,
            stack: Vec::new(),
        };
        iter.descend_left(self.root);
        iter
    }

    fn alloc(&mut self, item: I, visible: bool, depth: usize) -> usize {
        let weight = usize::from(visible);
        self.entries.push(Entry {
            item,
            weight,
            size: weight,
            depth,
            min_depth: depth,
            parent: None,
            left: None,
            right: None,
        });
        self.entries.len() - 1
    }

    fn locate(&self, position: usize) -> Option<usize> {
        let mut current = self.root?;
        let mut remaining = position;

        loop {
            let entry = &self.entries[current];
            let left_size = self.size_of(entry.left);
            if remaining < left_size {
                current = entry.left?;
                continue;
            }
            remaining -= left_size;
            if remaining < entry.weight {
                return Some(current);
            }
            remaining -= entry.weight;
            current = entry.right?;
        }
    }

    /// In-order first entry under `node` whose depth is at most `depth`.
    fn first_no_deeper(&self, mut node: Option<usize>, depth: usize) -> Option<usize> {
        if self.min_depth_of(node) > depth {
            return None;
        }
        while let Some(n) = node {
            let entry = &self.entries[n];
            if self.min_depth_of(entry.left) <= depth {
                node = entry.left;
            } else if entry.depth <= depth {
                return Some(n);
            } else {
                node = entry.right;
            }
        }
        None
    }

    fn rightmost(&self, mut node: usize) -> usize {
        while let Some(right) = self.entries[node].right {
            node = right;
        }
        node
    }

    fn size_of(&self, node: Option<usize>) -> usize {
        node.map_or(0, |n| self.entries[n].size)
    }

    fn min_depth_of(&self, node: Option<usize>) -> usize {
        node.map_or(usize::MAX, |n| self.entries[n].min_depth)
    }

    fn update(&mut self, node: usize) {
        let entry = &self.entries[node];
        let size = self.size_of(entry.left) + entry.weight + self.size_of(entry.right);
        let min_depth = entry
            .depth
            .min(self.min_depth_of(entry.left))
            .min(self.min_depth_of(entry.right));
        self.entries[node].size = size;
        self.entries[node].min_depth = min_depth;
    }

    fn is_left_child(&self, node: usize, parent: usize) -> bool {
        self.entries[parent].left == Some(node)
    }

    /// Rotates `x` above its parent.
    fn rotate(&mut self, x: usize) {
        let Some(p) = self.entries[x].parent else {
            return;
        };
        let g = self.entries[p].parent;

        if self.is_left_child(x, p) {
            let inner = self.entries[x].right;
            self.entries[p].left = inner;
            if let Some(inner) = inner {
                self.entries[inner].parent = Some(p);
            }
            self.entries[x].right = Some(p);
        } else {
            let inner = self.entries[x].left;
            self.entries[p].right = inner;
            if let Some(inner) = inner {
                self.entries[inner].parent = Some(p);
            }
            self.entries[x].left = Some(p);
        }

        self.entries[p].parent = Some(x);
        self.entries[x].parent = g;
        match g {
            Some(g) if self.entries[g].left == Some(p) => self.entries[g].left = Some(x),
            Some(g) => self.entries[g].right = Some(x),
            None => self.root = Some(x),
        }

        self.update(p);
        self.update(x);
    }

    fn splay(&mut self, x: usize) {
        while let Some(p) = self.entries[x].parent {
            if let Some(g) = self.entries[p].parent {
                if self.is_left_child(x, p) == self.is_left_child(p, g) {
                    self.rotate(p);
                } else {
                    self.rotate(x);
                }
            }
            self.rotate(x);
        }
    }
}

/// In-order iterator over the visible items of an [`OrderIndex`].
pub struct Iter<'a, I> {
    index: &'a OrderIndex<I>,
    stack: Vec<usize>,
}

impl<I> Iter<'_, I> {
    fn descend_left(&mut self, mut node: Option<usize>) {
        while let Some(n) = node {
            self.stack.push(n);
            node = self.index.entries[n].left;
        }
    }
}

impl<I: Copy> Iterator for Iter<'_, I> {
    type Item = I;

    fn next(&mut self) -> Option<I> {
        while let Some(n) = self.stack.pop() {
            let entry = &self.index.entries[n];
            self.descend_left(entry.right);
            if entry.weight > 0 {
                return Some(entry.item);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Edit {
        InsertAfter(usize),
        InsertAfterSubtree(usize),
        Remove(usize),
    }

    fn edit() -> impl Strategy<Value = Edit> {
        prop_oneof![
            2 => any::<usize>().prop_map(Edit::InsertAfter),
            1 => any::<usize>().prop_map(Edit::InsertAfterSubtree),
            1 => any::<usize>().prop_map(Edit::Remove),
        ]
    }

    /// Vec-backed reference: (item, location, visible, depth) in order,
    /// anchor excluded.
    #[derive(Default)]
    struct Model(Vec<(usize, Location, bool, usize)>);

    impl Model {
        fn visible(&self) -> Vec<usize> {
            self.0.iter().filter(|e| e.2).map(|e| e.0).collect()
        }

        /// Slot right after the subtree of the entry at `slot`.
        fn subtree_end(&self, slot: usize) -> usize {
            let depth = self.0[slot].3;
            self.0[slot + 1..]
                .iter()
                .position(|e| e.3 <= depth)
                .map_or(self.0.len(), |i| slot + 1 + i)
        }
    }

    #[test]
    fn test_empty_index() {
        let mut index: OrderIndex<u32> = OrderIndex::new();
        assert_eq!(index.len(), 0);
        assert!(index.is_empty());
        assert_eq!(index.get(0), None);
        assert_eq!(index.iter().count(), 0);
    }

    #[test]
    fn test_hidden_anchor_is_not_counted() {
        let mut index = OrderIndex::new();
        let anchor = index.push_front(0u32, false);
        assert_eq!(index.len(), 0);
        assert_eq!(index.total_len(), 1);
        assert_eq!(index.index_of(anchor), None);

        let a = index.insert_after(anchor, 1);
        let b = index.insert_after(a, 2);
        // inserted right after the anchor, so before `a`
        let c = index.insert_after(anchor, 3);

        assert_eq!(index.iter().collect::<Vec<_>>(), vec![3, 1, 2]);
        assert_eq!(index.index_of(c), Some(0));
        assert_eq!(index.index_of(a), Some(1));
        assert_eq!(index.index_of(b), Some(2));
        assert_eq!(index.get(1), Some(1));
    }

    #[test]
    fn test_remove_keeps_anchor_usable() {
        let mut index = OrderIndex::new();
        let anchor = index.push_front(0u32, false);
        let a = index.insert_after(anchor, 1);
        let b = index.insert_after(a, 2);

        assert!(index.remove_at(a));
        assert!(!index.remove_at(a));
        assert!(!index.is_visible(a));
        assert_eq!(index.len(), 1);
        assert_eq!(index.index_of(b), Some(0));

        // inserting after a tombstone lands between it and its successor
        let c = index.insert_after(a, 3);
        assert_eq!(index.iter().collect::<Vec<_>>(), vec![3, 2]);
        assert_eq!(index.index_of(c), Some(0));
        assert_eq!(index.item(a), 1);
    }

    #[test]
    fn test_insert_after_subtree_skips_descendants() {
        let mut index = OrderIndex::new();
        let anchor = index.push_front(0u32, false);
        let a = index.insert_after(anchor, 1);
        let b = index.insert_after(a, 2);
        index.insert_after(b, 3);
        let hidden = index.insert_after(b, 4);
        index.remove_at(hidden);

        let sibling = index.insert_after_subtree(a, 5);
        assert_eq!(index.iter().collect::<Vec<_>>(), vec![1, 2, 3, 5]);
        assert_eq!(index.depth(sibling), index.depth(a));

        // a nested sibling stops at the first shallower entry
        let nested = index.insert_after_subtree(b, 6);
        assert_eq!(index.iter().collect::<Vec<_>>(), vec![1, 2, 3, 6, 5]);
        assert_eq!(index.depth(nested), 2);
        assert_eq!(index.index_of(sibling), Some(4));
    }

    proptest! {
        #[test]
        fn prop_matches_vec_model(edits in prop::collection::vec(edit(), 1..400)) {
            let mut index = OrderIndex::new();
            let anchor = index.push_front(0usize, false);
            let mut model = Model::default();

            for (item, edit) in (1usize..).zip(edits) {
                match edit {
                    Edit::Remove(pick) if !model.0.is_empty() => {
                        let slot = pick % model.0.len();
                        let was_visible = model.0[slot].2;
                        prop_assert_eq!(index.remove_at(model.0[slot].1), was_visible);
                        model.0[slot].2 = false;
                    }
                    Edit::InsertAfterSubtree(pick) if !model.0.is_empty() => {
                        let slot = pick % model.0.len();
                        let depth = model.0[slot].3;
                        let at = model.subtree_end(slot);
                        let location = index.insert_after_subtree(model.0[slot].1, item);
                        model.0.insert(at, (item, location, true, depth));
                    }
                    Edit::InsertAfter(pick) | Edit::InsertAfterSubtree(pick) | Edit::Remove(pick) => {
                        let slot = pick % (model.0.len() + 1);
                        let (after, depth) = if slot == 0 {
                            (anchor, 1)
                        } else {
                            (model.0[slot - 1].1, model.0[slot - 1].3 + 1)
                        };
                        let location = index.insert_after(after, item);
                        model.0.insert(slot, (item, location, true, depth));
                    }
                }
            }

            let visible = model.visible();
            prop_assert_eq!(index.iter().collect::<Vec<_>>(), visible.clone());
            prop_assert_eq!(index.len(), visible.len());
            for (pos, expected) in visible.iter().enumerate() {
                prop_assert_eq!(index.peek(pos), Some(*expected));
            }
            for entry in &model.0 {
                prop_assert_eq!(index.depth(entry.1), entry.3);
            }

            let entries: Vec<_> = model.0.iter().filter(|e| e.2).collect();
            for (pos, entry) in entries.iter().enumerate() {
                prop_assert_eq!(index.index_of(entry.1), Some(pos));
                prop_assert_eq!(index.get(pos), Some(entry.0));
            }
        }
    }
}
