//! # wbtmap
//!
//! An ordered map stored in a weight-balanced, right-threaded binary search tree.
//!
//! Every node counts the nodes in its left and right subtrees. Insertion bumps
//! those counts on the way down and remembers the first ancestor whose counts
//! break `max(nL, nR) <= 2 * min(nL, nR) + 1`. Once the new leaf is linked, that
//! ancestor's subtree is flattened and rebuilt perfectly balanced (scapegoat
//! style). A node without a right child links to its in-order successor
//! instead, so forward iteration needs neither parent pointers nor a stack.
//!
//! ## Example
//!
//! ```rust
//! use wbtmap::ThreadedMap;
//!
//! let mut map = ThreadedMap::new();
//! map.put(15, "fifteen");
//! map.put(8, "eight");
//! map.put(20, "twenty");
//!
//! assert_eq!(map.get(&15), Some(&"fifteen"));
//! assert_eq!(map.get(&9), None);
//!
//! let keys: Vec<i32> = map.keys().copied().collect();
//! assert_eq!(keys, vec![8, 15, 20]);
//! ```

#![forbid(unsafe_code)]

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt::{self, Write as _};
use std::iter::FusedIterator;

use thiserror::Error;
use tracing::trace;

// =============================================================================
// Errors
// =============================================================================

/// Errors reported by [`ThreadedMap`].
///
/// Lookups never fail: a missing key is an `Option::None` (or the value
/// type's default via [`ThreadedMap::get_or_default`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MapError {
    /// A cursor was requested on a map that has no first entry.
    #[error("cannot position a cursor on an empty map")]
    EmptyMap,
}

// =============================================================================
// Balance ratio
// =============================================================================

/// `max(nL, nR) <= 2 * min(nL, nR) + 1`
#[inline]
fn is_balanced(n_left: usize, n_right: usize) -> bool {
    let (lo, hi) = if n_left < n_right {
        (n_left, n_right)
    } else {
        (n_right, n_left)
    };
    hi <= 2 * lo + 1
}

// =============================================================================
// Node arena
// =============================================================================

/// Index of a node in the map's arena.
///
/// Nodes are never removed one at a time, so an id stays valid until
/// [`ThreadedMap::clear`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct NodeId(usize);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0
    }
}

/// The right edge of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RightLink {
    /// Owned right subtree.
    Child(NodeId),
    /// No right subtree; points at the in-order successor. Never owns.
    Thread(NodeId),
    /// No right subtree and no successor: the node holds the greatest key.
    Empty,
}

impl RightLink {
    #[inline]
    fn child(self) -> Option<NodeId> {
        match self {
            RightLink::Child(id) => Some(id),
            RightLink::Thread(_) | RightLink::Empty => None,
        }
    }

    #[inline]
    fn thread(self) -> Option<NodeId> {
        match self {
            RightLink::Thread(id) => Some(id),
            RightLink::Child(_) | RightLink::Empty => None,
        }
    }
}

#[derive(Clone)]
struct Node<K, V> {
    key: K,
    value: V,
    left: Option<NodeId>,
    right: RightLink,
    /// Nodes in the left subtree.
    n_left: usize,
    /// Nodes in the right subtree (threads excluded).
    n_right: usize,
}

impl<K, V> Node<K, V> {
    #[inline]
    fn leaf(key: K, value: V, right: RightLink) -> Self {
        Self {
            key,
            value,
            left: None,
            right,
            n_left: 0,
            n_right: 0,
        }
    }

    #[inline]
    fn subtree_len(&self) -> usize {
        self.n_left + self.n_right + 1
    }
}

// =============================================================================
// ThreadedMap
// =============================================================================

/// An ordered map on a weight-balanced, right-threaded binary search tree.
///
/// Features:
/// - Arena-owned nodes addressed by index, so cloning copies threads for free
/// - Subtree sizes kept per node and updated on the insertion path
/// - Scapegoat rebuild of the first unbalanced ancestor
/// - Stackless in-order iteration over thread links
///
/// There is no removal; [`clear`](Self::clear) drops everything at once.
#[derive(Clone)]
pub struct ThreadedMap<K, V> {
    nodes: Vec<Node<K, V>>,
    root: Option<NodeId>,
}

impl<K, V> ThreadedMap<K, V> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            root: None,
        }
    }

    /// Number of entries. O(1): read from the root's subtree counts.
    #[inline]
    pub fn len(&self) -> usize {
        let len = self.root.map_or(0, |root| self.node(root).subtree_len());
        debug_assert_eq!(len, self.nodes.len());
        len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn memory_usage(&self) -> usize {
        self.nodes.capacity() * std::mem::size_of::<Node<K, V>>()
    }

    pub fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
    }

    /// Drop every entry and reset to an empty map.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    #[inline]
    fn node(&self, id: NodeId) -> &Node<K, V> {
        &self.nodes[id.index()]
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        &mut self.nodes[id.index()]
    }

    fn leftmost(&self, mut id: NodeId) -> NodeId {
        while let Some(left) = self.node(id).left {
            id = left;
        }
        id
    }

    /// In-order successor: follow the thread, or take the leftmost node of
    /// the right subtree.
    #[inline]
    fn successor(&self, id: NodeId) -> Option<NodeId> {
        match self.node(id).right {
            RightLink::Thread(next) => Some(next),
            RightLink::Child(right) => Some(self.leftmost(right)),
            RightLink::Empty => None,
        }
    }

    /// Cursor on the smallest key.
    ///
    /// Fails with [`MapError::EmptyMap`] when there is no first entry.
    pub fn begin(&self) -> Result<Cursor<'_, K, V>, MapError> {
        let root = self.root.ok_or(MapError::EmptyMap)?;
        Ok(Cursor {
            map: self,
            node: Some(self.leftmost(root)),
        })
    }

    /// The past-the-end cursor.
    pub fn end(&self) -> Cursor<'_, K, V> {
        Cursor {
            map: self,
            node: None,
        }
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            cursor: Cursor {
                map: self,
                node: self.root.map(|root| self.leftmost(root)),
            },
            remaining: self.len(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// All entries in ascending key order.
    pub fn to_vec(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// One `key: K value: V` line per entry, in key order.
    pub fn to_debug_string(&self) -> String
    where
        K: fmt::Display,
        V: fmt::Display,
    {
        let mut out = String::new();
        for (key, value) in self.iter() {
            let _ = writeln!(out, "key: {key} value: {value}");
        }
        out
    }

    /// One `key: K, nL: a, nR: b` line per node, in pre-order.
    ///
    /// For keys `1, 2, 3` inserted in that order:
    ///
    /// ```rust
    /// # use wbtmap::ThreadedMap;
    /// let map: ThreadedMap<i32, ()> = [(1, ()), (2, ()), (3, ())].into_iter().collect();
    /// assert_eq!(
    ///     map.check_balance(),
    ///     "key: 2, nL: 1, nR: 1\nkey: 1, nL: 0, nR: 0\nkey: 3, nL: 0, nR: 0\n"
    /// );
    /// ```
    pub fn check_balance(&self) -> String
    where
        K: fmt::Display,
    {
        let mut out = String::new();
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let node = self.node(id);
            let _ = writeln!(
                out,
                "key: {}, nL: {}, nR: {}",
                node.key, node.n_left, node.n_right
            );
            if let Some(right) = node.right.child() {
                stack.push(right);
            }
            if let Some(left) = node.left {
                stack.push(left);
            }
        }
        out
    }
}

impl<K: Ord, V> ThreadedMap<K, V> {
    fn find<Q>(&self, key: &Q) -> Option<NodeId>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut current = self.root;
        while let Some(id) = current {
            let node = self.node(id);
            current = match key.cmp(node.key.borrow()) {
                Ordering::Equal => return Some(id),
                Ordering::Less => node.left,
                Ordering::Greater => node.right.child(),
            };
        }
        None
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find(key).map(|id| &self.node(id).value)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let id = self.find(key)?;
        Some(&mut self.node_mut(id).value)
    }

    /// The value for `key`, or `V::default()` when absent. Never inserts.
    pub fn get_or_default<Q>(&self, key: &Q) -> V
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
        V: Default + Clone,
    {
        self.get(key).cloned().unwrap_or_default()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.find(key).is_some()
    }

    /// Insert or overwrite. Returns the previous value when `key` was present;
    /// overwriting never changes the tree's shape.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        if let Some(id) = self.find(&key) {
            return Some(std::mem::replace(&mut self.node_mut(id).value, value));
        }
        self.insert_new(key, value);
        None
    }

    /// The value for `key`, inserting `V::default()` first when absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        let id = match self.find(&key) {
            Some(id) => id,
            None => self.insert_new(key, V::default()),
        };
        &mut self.node_mut(id).value
    }

    /// Link a key known to be absent as a new leaf, then rebuild the first
    /// ancestor that the insertion unbalanced.
    fn insert_new(&mut self, key: K, value: V) -> NodeId {
        let id = NodeId(self.nodes.len());
        let Some(root) = self.root else {
            self.nodes.push(Node::leaf(key, value, RightLink::Empty));
            self.root = Some(id);
            return id;
        };

        // (violator, violator's parent)
        let mut violator: Option<(NodeId, Option<NodeId>)> = None;
        let mut above: Option<NodeId> = None;
        let mut parent = root;
        let mut went_left = false;
        let mut current = Some(root);
        while let Some(cur) = current {
            let node = &mut self.nodes[cur.index()];
            went_left = key < node.key;
            if went_left {
                node.n_left += 1;
            } else {
                node.n_right += 1;
            }
            if violator.is_none() && !is_balanced(node.n_left, node.n_right) {
                violator = Some((cur, above));
            }
            current = if went_left {
                node.left
            } else {
                node.right.child()
            };
            above = Some(cur);
            parent = cur;
        }

        if went_left {
            // A left leaf's successor is its parent.
            self.nodes.push(Node::leaf(key, value, RightLink::Thread(parent)));
            self.node_mut(parent).left = Some(id);
        } else {
            // A right leaf takes over its parent's thread.
            let inherited = self.node(parent).right;
            debug_assert!(inherited.child().is_none());
            self.nodes.push(Node::leaf(key, value, inherited));
            self.node_mut(parent).right = RightLink::Child(id);
        }

        if let Some((violator, violator_parent)) = violator {
            self.rebuild_subtree(violator, violator_parent);
        }
        id
    }

    /// Flatten `violator`'s subtree and relink a balanced rebuild of it.
    fn rebuild_subtree(&mut self, violator: NodeId, parent: Option<NodeId>) {
        let ids = self.flatten(violator);
        let outer = ids.last().and_then(|&max| self.node(max).right.thread());
        trace!(size = ids.len(), "rebuilding unbalanced subtree");

        let new_root = self.rebuild(&ids, outer);
        match parent {
            None => self.root = Some(new_root),
            Some(parent) => {
                let parent = self.node_mut(parent);
                if parent.left == Some(violator) {
                    parent.left = Some(new_root);
                } else {
                    debug_assert_eq!(parent.right, RightLink::Child(violator));
                    parent.right = RightLink::Child(new_root);
                }
            }
        }
    }

    /// Subtree nodes in key order, collected by walking successors from the
    /// leftmost node. The walk is bounded by the subtree's size.
    fn flatten(&self, root: NodeId) -> Vec<NodeId> {
        let len = self.node(root).subtree_len();
        let mut ids = Vec::with_capacity(len);
        let mut current = Some(self.leftmost(root));
        while let Some(id) = current {
            ids.push(id);
            if ids.len() == len {
                break;
            }
            current = self.successor(id);
        }
        debug_assert_eq!(ids.len(), len);
        ids
    }

    /// Build a perfectly balanced subtree over `ids` (sorted, non-empty).
    /// `outer` is the successor of the greatest node in `ids`.
    fn rebuild(&mut self, ids: &[NodeId], outer: Option<NodeId>) -> NodeId {
        debug_assert!(!ids.is_empty());
        let mid = (ids.len() - 1) / 2;
        let id = ids[mid];

        let left = (mid > 0).then(|| self.rebuild(&ids[..mid], Some(id)));
        let right = if mid + 1 < ids.len() {
            RightLink::Child(self.rebuild(&ids[mid + 1..], outer))
        } else {
            outer.map_or(RightLink::Empty, RightLink::Thread)
        };

        let node = self.node_mut(id);
        node.left = left;
        node.right = right;
        node.n_left = mid;
        node.n_right = ids.len() - 1 - mid;
        id
    }
}

impl<K, V> Default for ThreadedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for ThreadedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for ThreadedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Ord, V> Extend<(K, V)> for ThreadedMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.put(key, value);
        }
    }
}

impl<'a, K, V> IntoIterator for &'a ThreadedMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// =============================================================================
// Cursor / Iter
// =============================================================================

/// A position in a [`ThreadedMap`], moved forward along thread links.
///
/// Two cursors are equal when they sit on the same node of the same map; the
/// [`end`](ThreadedMap::end) cursor sits on no node.
pub struct Cursor<'a, K, V> {
    map: &'a ThreadedMap<K, V>,
    node: Option<NodeId>,
}

impl<'a, K, V> Cursor<'a, K, V> {
    #[inline]
    pub fn key(&self) -> Option<&'a K> {
        self.node.map(|id| &self.map.node(id).key)
    }

    #[inline]
    pub fn value(&self) -> Option<&'a V> {
        self.node.map(|id| &self.map.node(id).value)
    }

    #[inline]
    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }

    /// Step to the next key. Advancing the end cursor leaves it at the end.
    #[inline]
    pub fn advance(&mut self) {
        if let Some(id) = self.node {
            self.node = self.map.successor(id);
        }
    }
}

impl<K, V> Clone for Cursor<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for Cursor<'_, K, V> {}

impl<K, V> PartialEq for Cursor<'_, K, V> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.map, other.map) && self.node == other.node
    }
}

impl<K, V> Eq for Cursor<'_, K, V> {}

impl<K: fmt::Debug, V> fmt::Debug for Cursor<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.key()).finish()
    }
}

pub struct Iter<'a, K, V> {
    cursor: Cursor<'a, K, V>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor.node?;
        let node = self.cursor.map.node(id);
        self.cursor.advance();
        self.remaining -= 1;
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}


#[cfg(test)]
mod proptests;
