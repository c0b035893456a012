use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;

/// Check every structural invariant of the tree: subtree counts, the balance
/// ratio, key order, and that every missing right child is a correct thread.
pub(crate) fn validate_map<K: Ord, V>(t: &ThreadedMap<K, V>) {
    let Some(root) = t.root else {
        assert!(t.nodes.is_empty(), "empty map must own no nodes");
        return;
    };

    // In-order over real children only; threads are checked separately.
    let mut in_order: Vec<NodeId> = Vec::with_capacity(t.nodes.len());
    let mut stack: Vec<NodeId> = Vec::new();
    let mut current = Some(root);
    while current.is_some() || !stack.is_empty() {
        while let Some(id) = current {
            stack.push(id);
            current = t.node(id).left;
        }
        if let Some(id) = stack.pop() {
            in_order.push(id);
            current = t.node(id).right.child();
        }
    }

    assert_eq!(
        in_order.len(),
        t.nodes.len(),
        "every arena node must be reachable exactly once"
    );
    assert_eq!(in_order.len(), t.len(), "len must match the node count");

    for pair in in_order.windows(2) {
        assert!(
            t.node(pair[0]).key < t.node(pair[1]).key,
            "keys must be strictly increasing in order"
        );
    }

    for (i, &id) in in_order.iter().enumerate() {
        let node = t.node(id);
        let n_left = node.left.map_or(0, |l| subtree_size(t, l));
        let n_right = node.right.child().map_or(0, |r| subtree_size(t, r));
        assert_eq!(node.n_left, n_left, "stored nL must match left subtree");
        assert_eq!(node.n_right, n_right, "stored nR must match right subtree");
        assert!(
            is_balanced(node.n_left, node.n_right),
            "balance ratio violated: nL={n_left} nR={n_right}"
        );

        let expected = match in_order.get(i + 1) {
            Some(&next) => RightLink::Thread(next),
            None => RightLink::Empty,
        };
        if node.right.child().is_none() {
            assert_eq!(node.right, expected, "thread must point at the successor");
        }
    }
}

fn subtree_size<K, V>(t: &ThreadedMap<K, V>, id: NodeId) -> usize {
    let mut count = 0;
    let mut stack = vec![id];
    while let Some(id) = stack.pop() {
        count += 1;
        let node = t.node(id);
        stack.extend(node.left);
        stack.extend(node.right.child());
    }
    count
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 6)]
    Put(#[proptest(strategy = "0u16..512")] u16, u32),
    #[proptest(weight = 2)]
    Get(#[proptest(strategy = "0u16..512")] u16),
    #[proptest(weight = 2)]
    Bump(#[proptest(strategy = "0u16..512")] u16),
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(any::<Op>(), 0..=1500)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in ops_strategy()) {
        let mut t: ThreadedMap<u16, u32> = ThreadedMap::new();
        let mut m: BTreeMap<u16, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Put(key, value) => {
                    prop_assert_eq!(t.put(key, value), m.insert(key, value));
                }
                Op::Get(key) => {
                    prop_assert_eq!(t.get(&key), m.get(&key));
                    prop_assert_eq!(t.get_or_default(&key), m.get(&key).copied().unwrap_or_default());
                }
                Op::Bump(key) => {
                    let got = t.get_or_insert_default(key);
                    *got = got.wrapping_add(1);
                    let want = m.entry(key).or_default();
                    *want = want.wrapping_add(1);
                }
            }

            prop_assert_eq!(t.len(), m.len());
        }

        validate_map(&t);
        let got: Vec<(u16, u32)> = t.to_vec();
        let expected: Vec<(u16, u32)> = m.into_iter().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_cursor_matches_iter(keys in prop::collection::vec(any::<i64>(), 1..=400)) {
        let t: ThreadedMap<i64, ()> = keys.iter().map(|&k| (k, ())).collect();

        let mut walked = Vec::new();
        let mut cursor = t.begin().unwrap();
        while cursor != t.end() {
            walked.push(*cursor.key().unwrap());
            cursor.advance();
        }

        prop_assert_eq!(walked.len(), t.len());
        let listed: Vec<i64> = t.keys().copied().collect();
        prop_assert_eq!(walked, listed);
    }

    #[test]
    fn prop_clone_is_independent(
        base in prop::collection::vec(0u32..1000, 0..=300),
        extra in prop::collection::vec(0u32..2000, 1..=300),
    ) {
        let a: ThreadedMap<u32, u32> = base.iter().map(|&k| (k, k)).collect();
        let snapshot = a.to_vec();

        let mut b = a.clone();
        for k in extra {
            b.put(k, u32::MAX - k);
        }

        validate_map(&a);
        validate_map(&b);
        prop_assert_eq!(a.to_vec(), snapshot);
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys: Vec<u8> = vec![1, 2, 3, 4, 5, 6, 7];

    for_each_permutation(&keys, |perm| {
        let mut t: ThreadedMap<u8, u64> = ThreadedMap::new();
        let mut m: BTreeMap<u8, u64> = BTreeMap::new();

        for (i, k) in perm.into_iter().enumerate() {
            let v = i as u64;
            assert_eq!(t.put(k, v), m.insert(k, v));
            validate_map(&t);
        }

        let got: Vec<(u8, u64)> = t.iter().map(|(k, v)| (*k, *v)).collect();
        let expected: Vec<(u8, u64)> = m.into_iter().collect();
        assert_eq!(got, expected);
    });
}

#[test]
fn exhaustive_overwrite_keeps_shape() {
    let keys: Vec<u8> = vec![10, 20, 30, 40, 50];

    for_each_permutation(&keys, |perm| {
        let mut t: ThreadedMap<u8, u8> = ThreadedMap::new();
        for &k in &perm {
            t.put(k, 0);
        }
        let shape = t.check_balance();
        for &k in perm.iter().rev() {
            assert_eq!(t.put(k, 1), Some(0));
        }
        assert_eq!(t.check_balance(), shape);
        assert!(t.iter().all(|(_, v)| *v == 1));
    });
}
