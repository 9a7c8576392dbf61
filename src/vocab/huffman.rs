use anyhow::{bail, Result};

/// Huffman coding of a vocabulary.
///
/// The tree has one leaf per word and `n - 1` inner nodes. Hierarchical
/// softmax learns a vector for every inner node, the probability of a
/// word is the product of the binary decisions on the path from the root
/// to its leaf. Frequent words get short paths.
///
/// Inner nodes are numbered in order of construction, so the root is the
/// inner node `n - 2`.
#[derive(Clone, Debug)]
pub struct HuffmanTree {
    paths: Vec<Vec<usize>>,
    codes: Vec<Vec<bool>>,
}

impl HuffmanTree {
    /// Build the tree from word counts.
    ///
    /// The counts must be sorted in descending order, which permits
    /// construction in linear time with two queues: one over the leaves
    /// (consumed from the least frequent end) and one over the inner nodes
    /// (which are created in non-decreasing order of count).
    pub fn new(counts: &[usize]) -> Result<Self> {
        if counts.is_empty() {
            bail!("Cannot construct a Huffman tree for an empty vocabulary");
        }

        if counts.windows(2).any(|w| w[0] < w[1]) {
            bail!("Counts must be sorted in descending order");
        }

        let n_leaves = counts.len();
        let n_nodes = 2 * n_leaves - 1;
        let root = n_nodes - 1;

        let mut node_counts = counts.to_vec();
        node_counts.resize(n_nodes, usize::MAX);
        let mut parent = vec![0; n_nodes];
        let mut branch = vec![false; n_nodes];

        let mut leaf_pos = n_leaves;
        let mut inner_pos = n_leaves;
        let mut pop_min = |node_counts: &[usize]| {
            if leaf_pos > 0 && node_counts[leaf_pos - 1] < node_counts[inner_pos] {
                leaf_pos -= 1;
                leaf_pos
            } else {
                inner_pos += 1;
                inner_pos - 1
            }
        };

        for node in n_leaves..n_nodes {
            let min1 = pop_min(&node_counts);
            let min2 = pop_min(&node_counts);

            node_counts[node] = node_counts[min1] + node_counts[min2];
            parent[min1] = node;
            parent[min2] = node;
            branch[min2] = true;
        }

        let mut paths = Vec::with_capacity(n_leaves);
        let mut codes = Vec::with_capacity(n_leaves);
        for leaf in 0..n_leaves {
            let mut path = Vec::new();
            let mut code = Vec::new();

            let mut node = leaf;
            while node != root {
                code.push(branch[node]);
                node = parent[node];
                path.push(node - n_leaves);
            }

            path.reverse();
            code.reverse();
            paths.push(path);
            codes.push(code);
        }

        Ok(HuffmanTree { paths, codes })
    }

    /// Inner nodes from the root to the parent of the word's leaf.
    pub fn path(&self, word: usize) -> &[usize] {
        &self.paths[word]
    }

    /// Branch decisions taken at each node of the word's path.
    pub fn code(&self, word: usize) -> &[bool] {
        &self.codes[word]
    }

    /// Iterate over `(inner_node, branch)` pairs of the word's path.
    pub fn decisions(&self, word: usize) -> impl Iterator<Item = (usize, bool)> + '_ {
        self.paths[word]
            .iter()
            .cloned()
            .zip(self.codes[word].iter().cloned())
    }

    /// The number of leaves (words).
    pub fn n_leaves(&self) -> usize {
        self.paths.len()
    }

    /// The number of inner nodes.
    pub fn n_inner_nodes(&self) -> usize {
        self.n_leaves() - 1
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::HuffmanTree;

    #[test]
    fn empty_counts_are_rejected() {
        assert!(HuffmanTree::new(&[]).is_err());
    }

    #[test]
    fn unsorted_counts_are_rejected() {
        assert!(HuffmanTree::new(&[1, 5, 3]).is_err());
    }

    #[test]
    fn single_word_has_empty_code() {
        let tree = HuffmanTree::new(&[42]).unwrap();
        assert_eq!(tree.n_inner_nodes(), 0);
        assert!(tree.path(0).is_empty());
        assert!(tree.code(0).is_empty());
    }

    #[test]
    fn two_words() {
        let tree = HuffmanTree::new(&[1, 1]).unwrap();
        assert_eq!(tree.path(0), &[0]);
        assert_eq!(tree.path(1), &[0]);
        assert_eq!(tree.code(0), &[true]);
        assert_eq!(tree.code(1), &[false]);
    }

    #[test]
    fn small_tree_codes() {
        let tree = HuffmanTree::new(&[5, 3, 2, 1]).unwrap();

        let paths: HashMap<_, _> = (0..4).map(|w| (w, tree.path(w).to_vec())).collect();
        assert_eq!(
            paths,
            hashmap! {
                0 => vec![2],
                1 => vec![2, 1],
                2 => vec![2, 1, 0],
                3 => vec![2, 1, 0],
            }
        );

        let codes: HashMap<_, _> = (0..4).map(|w| (w, tree.code(w).to_vec())).collect();
        assert_eq!(
            codes,
            hashmap! {
                0 => vec![false],
                1 => vec![true, true],
                2 => vec![true, false, true],
                3 => vec![true, false, false],
            }
        );

        assert_eq!(
            tree.decisions(1).collect::<Vec<_>>(),
            vec![(2, true), (1, true)]
        );
    }

    #[test]
    fn codes_are_prefix_free_and_complete() {
        let counts = [120, 80, 60, 40, 33, 20, 12, 10, 7, 5, 3, 2, 1];
        let tree = HuffmanTree::new(&counts).unwrap();

        for w in 0..counts.len() {
            assert_eq!(tree.path(w).len(), tree.code(w).len());
            assert_eq!(tree.path(w)[0], counts.len() - 2, "Path must start at root");
            assert!(tree.path(w).iter().all(|&node| node < tree.n_inner_nodes()));
        }

        // Frequent words never get longer codes than less frequent words.
        for w in 1..counts.len() {
            assert!(tree.code(w - 1).len() <= tree.code(w).len());
        }

        for w1 in 0..counts.len() {
            for w2 in 0..counts.len() {
                if w1 != w2 {
                    assert!(!tree.code(w2).starts_with(tree.code(w1)));
                }
            }
        }

        // Kraft equality holds for a full binary tree.
        let kraft: f64 = (0..counts.len())
            .map(|w| 0.5f64.powi(tree.code(w).len() as i32))
            .sum();
        assert!((kraft - 1.0).abs() < 1e-12);
    }
}
