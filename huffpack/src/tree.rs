//! Huffman tree construction and code assignment.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tracing::debug;
use wbtmap::ThreadedMap;

use crate::frequency::FrequencyTable;
use crate::{CodecError, Result, Symbol, EOF_SYMBOL, INTERNAL_SYMBOL};

/// A node in the Huffman tree.
#[derive(Debug, Clone)]
pub struct HuffmanNode {
    /// Byte value, [`EOF_SYMBOL`], or [`INTERNAL_SYMBOL`] for merged nodes.
    pub symbol: Symbol,
    /// Occurrence count of the symbol, or of every leaf below.
    pub count: u64,
    /// Child reached by a `0` bit.
    pub zero: Option<usize>,
    /// Child reached by a `1` bit.
    pub one: Option<usize>,
}

impl HuffmanNode {
    /// Whether this node carries a symbol.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.symbol != INTERNAL_SYMBOL
    }
}

/// A Huffman tree stored as a flat node vector.
#[derive(Debug, Clone)]
pub struct HuffmanTree {
    nodes: Vec<HuffmanNode>,
    root: usize,
}

impl HuffmanTree {
    /// Build the tree for `freq` (`buildEncodingTree`).
    ///
    /// The queue pops the lowest count first; equal counts pop in push order,
    /// with leaves pushed in ascending symbol order, so a table always yields
    /// the same tree. The first node popped becomes the `zero` child.
    ///
    /// Counts whose sum does not fit a `u64` are [`CodecError::CountOverflow`].
    pub fn build(freq: &FrequencyTable) -> Result<Self> {
        let mut nodes: Vec<HuffmanNode> = Vec::with_capacity(freq.len() * 2);
        // (count, push sequence, node index)
        let mut heap: BinaryHeap<Reverse<(u64, usize, usize)>> = BinaryHeap::new();
        let mut seq = 0usize;

        for (symbol, count) in freq.iter() {
            if symbol > EOF_SYMBOL {
                return Err(CodecError::InvalidSymbol(symbol));
            }
            heap.push(Reverse((count, seq, nodes.len())));
            seq += 1;
            nodes.push(HuffmanNode {
                symbol,
                count,
                zero: None,
                one: None,
            });
        }

        while heap.len() > 1 {
            let (Some(Reverse((zero_count, _, zero))), Some(Reverse((one_count, _, one)))) =
                (heap.pop(), heap.pop())
            else {
                break;
            };
            let count = zero_count
                .checked_add(one_count)
                .ok_or(CodecError::CountOverflow)?;
            heap.push(Reverse((count, seq, nodes.len())));
            seq += 1;
            nodes.push(HuffmanNode {
                symbol: INTERNAL_SYMBOL,
                count,
                zero: Some(zero),
                one: Some(one),
            });
        }

        let Reverse((_, _, root)) = heap.pop().ok_or(CodecError::EmptyFrequencyTable)?;
        let tree = Self { nodes, root };
        debug!(
            leaves = tree.leaf_count(),
            depth = tree.depth(),
            "built huffman tree"
        );
        Ok(tree)
    }

    /// Index of the root node.
    #[inline]
    pub fn root_index(&self) -> usize {
        self.root
    }

    /// The root node.
    #[inline]
    pub fn root(&self) -> &HuffmanNode {
        &self.nodes[self.root]
    }

    /// Node at `index`.
    #[inline]
    pub fn node(&self, index: usize) -> &HuffmanNode {
        &self.nodes[index]
    }

    /// Follow one bit from the internal node at `index`.
    #[inline]
    pub(crate) fn step(&self, index: usize, bit: bool) -> usize {
        let node = &self.nodes[index];
        let next = if bit { node.one } else { node.zero };
        debug_assert!(next.is_some(), "stepped from a leaf");
        next.unwrap_or(self.root)
    }

    /// Whether the tree has a leaf for [`EOF_SYMBOL`].
    pub fn has_eof(&self) -> bool {
        self.nodes.iter().any(|n| n.symbol == EOF_SYMBOL)
    }

    /// Number of symbols.
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Length of the longest code.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self.root, 0usize)];
        while let Some((index, depth)) = stack.pop() {
            let node = &self.nodes[index];
            deepest = deepest.max(depth);
            stack.extend(node.zero.map(|child| (child, depth + 1)));
            stack.extend(node.one.map(|child| (child, depth + 1)));
        }
        deepest
    }
}

/// Map every leaf symbol to its path from the root, `'0'` for a `zero` edge
/// and `'1'` for a `one` edge (`buildEncodingMap`).
///
/// A tree that is a single leaf gives that symbol the empty code.
pub fn build_encoding_map(tree: &HuffmanTree) -> ThreadedMap<Symbol, String> {
    let mut codes = ThreadedMap::with_capacity(tree.leaf_count());
    let mut path = String::new();
    assign_codes(tree, tree.root_index(), &mut path, &mut codes);
    codes
}

fn assign_codes(
    tree: &HuffmanTree,
    index: usize,
    path: &mut String,
    codes: &mut ThreadedMap<Symbol, String>,
) {
    let node = tree.node(index);
    if node.is_leaf() {
        codes.put(node.symbol, path.clone());
        return;
    }
    if let Some(zero) = node.zero {
        path.push('0');
        assign_codes(tree, zero, path, codes);
        path.pop();
    }
    if let Some(one) = node.one {
        path.push('1');
        assign_codes(tree, one, path, codes);
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::{build_frequency_map, Source};

    fn codes_for(input: &[u8]) -> ThreadedMap<Symbol, String> {
        let freq = build_frequency_map(Source::Bytes(input)).unwrap();
        build_encoding_map(&HuffmanTree::build(&freq).unwrap())
    }

    #[test]
    fn test_aaabbc_codes() {
        let freq = build_frequency_map(Source::Bytes(b"aaabbc")).unwrap();
        let tree = HuffmanTree::build(&freq).unwrap();
        assert_eq!(tree.root().count, 7);
        assert_eq!(tree.root().symbol, INTERNAL_SYMBOL);
        assert_eq!(tree.leaf_count(), 4);
        assert_eq!(tree.depth(), 3);

        let codes = build_encoding_map(&tree);
        assert_eq!(
            codes.to_debug_string(),
            "key: 97 value: 0\nkey: 98 value: 10\nkey: 99 value: 110\nkey: 256 value: 111\n"
        );
    }

    #[test]
    fn test_single_symbol_still_merges_with_eof() {
        let freq = build_frequency_map(Source::Bytes(b"zzzz")).unwrap();
        let tree = HuffmanTree::build(&freq).unwrap();
        assert!(!tree.root().is_leaf());
        assert_eq!(tree.leaf_count(), 2);

        let codes = build_encoding_map(&tree);
        assert_eq!(codes.get(&EOF_SYMBOL).map(String::as_str), Some("0"));
        assert_eq!(codes.get(&u16::from(b'z')).map(String::as_str), Some("1"));
    }

    #[test]
    fn test_only_eof_is_a_leaf_root() {
        let tree = HuffmanTree::build(&build_frequency_map(Source::Bytes(b"")).unwrap()).unwrap();
        assert!(tree.root().is_leaf());
        assert_eq!(tree.root().symbol, EOF_SYMBOL);
        assert_eq!(tree.depth(), 0);
        assert_eq!(build_encoding_map(&tree).get(&EOF_SYMBOL).map(String::as_str), Some(""));
    }

    #[test]
    fn test_empty_table() {
        let err = HuffmanTree::build(&FrequencyTable::new()).unwrap_err();
        assert!(matches!(err, CodecError::EmptyFrequencyTable));
    }

    #[test]
    fn test_rejects_internal_symbol_key() {
        let mut freq = FrequencyTable::new();
        freq.put(INTERNAL_SYMBOL, 3);
        let err = HuffmanTree::build(&freq).unwrap_err();
        assert!(matches!(err, CodecError::InvalidSymbol(INTERNAL_SYMBOL)));
    }

    #[test]
    fn test_count_overflow() {
        let mut freq = FrequencyTable::new();
        freq.put(u16::from(b'a'), u64::MAX);
        freq.put(EOF_SYMBOL, 1);
        let err = HuffmanTree::build(&freq).unwrap_err();
        assert!(matches!(err, CodecError::CountOverflow));

        // The largest total that still fits is fine.
        freq.put(u16::from(b'a'), u64::MAX - 1);
        assert_eq!(HuffmanTree::build(&freq).unwrap().root().count, u64::MAX);
    }

    #[test]
    fn test_codes_are_prefix_free() {
        let text = b"the quick brown fox jumps over the lazy dog; pack my box with five dozen liquor jugs";
        let codes = codes_for(text);
        let all: Vec<&String> = codes.iter().map(|(_, code)| code).collect();
        for (i, a) in all.iter().enumerate() {
            assert!(!a.is_empty());
            for (j, b) in all.iter().enumerate() {
                if i != j {
                    assert!(!b.starts_with(a.as_str()), "{a} is a prefix of {b}");
                }
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let text = b"abracadabra alakazam";
        assert_eq!(codes_for(text).to_vec(), codes_for(text).to_vec());
    }

    #[test]
    fn test_frequent_symbols_get_short_codes() {
        let mut input = vec![b'e'; 500];
        input.extend_from_slice(b"qxzj");
        let codes = codes_for(&input);
        let e = codes.get(&u16::from(b'e')).unwrap().len();
        for rare in [b'q', b'x', b'z', b'j'] {
            assert!(codes.get(&u16::from(rare)).unwrap().len() >= e);
        }
    }
}
