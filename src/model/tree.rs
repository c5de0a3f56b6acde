//! CART regression trees.
//!
//! Trees are grown on row indices into a shared design matrix, so a bootstrap
//! sample is just a list of (possibly repeated) indices. Nodes live in a flat
//! table; children are always stored after their parent, and the root is
//! node 0.

use crate::model::error::ModelError;
use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// One node of a fitted regression tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Terminal node predicting the mean target of its training rows.
    Leaf { value: f64, n_samples: usize },
    /// Internal node: rows with `x[feature] <= threshold` go to `left`.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        /// Reduction of the summed squared error achieved by this split.
        impurity_decrease: f64,
        n_samples: usize,
    },
}

/// Growth limits for a single tree.
#[derive(Clone, Copy, Debug)]
pub struct TreeLimits {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Number of candidate features drawn at each node.
    pub max_features: usize,
}

/// A fitted regression tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    n_features: usize,
}

#[derive(Clone, Copy, Debug)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

impl RegressionTree {
    /// Grow a tree on the given rows of `x` (rows may repeat).
    ///
    /// Callers guarantee that `rows` is non-empty, every index is in range and
    /// `y` is aligned with `x`.
    pub fn grow(
        x: ArrayView2<f64>,
        y: &[f64],
        rows: Vec<usize>,
        limits: &TreeLimits,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.ncols();
        let mut nodes = vec![Node::Leaf {
            value: 0.0,
            n_samples: 0,
        }];
        let mut stack = vec![(0usize, rows, 0usize)];
        let mut features: Vec<usize> = (0..n_features).collect();

        while let Some((id, rows, depth)) = stack.pop() {
            let n = rows.len();
            let (sum, sum_sq) = rows.iter().fold((0.0, 0.0), |(s, sq), &r| {
                (s + y[r], sq + y[r] * y[r])
            });
            let value = sum / n as f64;

            let first = y[rows[0]];
            let pure = rows.iter().all(|&r| y[r] == first);
            let depth_reached = limits.max_depth.is_some_and(|d| depth >= d);

            if pure || depth_reached || n < limits.min_samples_split {
                nodes[id] = Node::Leaf { value, n_samples: n };
                continue;
            }

            let parent_sse = (sum_sq - sum * sum / n as f64).max(0.0);
            features.shuffle(rng);

            let Some(split) = best_split(x, y, &rows, &features, parent_sse, limits) else {
                nodes[id] = Node::Leaf { value, n_samples: n };
                continue;
            };

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .into_iter()
                .partition(|&r| x[[r, split.feature]] <= split.threshold);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf {
                value: 0.0,
                n_samples: 0,
            });
            nodes.push(Node::Leaf {
                value: 0.0,
                n_samples: 0,
            });
            nodes[id] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
                impurity_decrease: split.decrease,
                n_samples: n,
            };

            stack.push((right, right_rows, depth + 1));
            stack.push((left, left_rows, depth + 1));
        }

        Self { nodes, n_features }
    }

    /// Predict a single encoded row. The row must have `n_features` entries.
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Add this tree's per-feature impurity decreases into `totals`.
    pub fn accumulate_importances(&self, totals: &mut [f64]) {
        for node in &self.nodes {
            if let Node::Split {
                feature,
                impurity_decrease,
                ..
            } = node
            {
                totals[*feature] += impurity_decrease;
            }
        }
    }

    /// Check that the node table is a well-formed tree over `n_features` columns.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::CorruptParams("tree has no nodes".to_string()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature,
                left,
                right,
                threshold,
                ..
            } = node
            {
                if *feature >= self.n_features {
                    return Err(ModelError::CorruptParams(format!(
                        "node {} splits on feature {} but the tree has {} features",
                        idx, feature, self.n_features
                    )));
                }
                let n_nodes = self.nodes.len();
                if *left <= idx || *right <= idx || *left >= n_nodes || *right >= n_nodes {
                    return Err(ModelError::CorruptParams(format!(
                        "node {} has invalid children ({}, {})",
                        idx, left, right
                    )));
                }
                if !threshold.is_finite() {
                    return Err(ModelError::CorruptParams(format!(
                        "node {} has a non-finite threshold",
                        idx
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Length of the longest root-to-leaf path (a single leaf has depth 0).
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Node::Split { left, right, .. } = &self.nodes[idx] {
                stack.push((*left, depth + 1));
                stack.push((*right, depth + 1));
            }
        }
        max_depth
    }
}

/// Search the shuffled feature order for the best split.
///
/// The first `max_features` features are always evaluated. If none of them
/// admits a valid split, the search continues through the remaining features
/// until one does.
fn best_split(
    x: ArrayView2<f64>,
    y: &[f64],
    rows: &[usize],
    features: &[usize],
    parent_sse: f64,
    limits: &TreeLimits,
) -> Option<SplitCandidate> {
    let mut best: Option<SplitCandidate> = None;
    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(rows.len());

    for (visited, &feature) in features.iter().enumerate() {
        if visited >= limits.max_features && best.is_some() {
            break;
        }
        pairs.clear();
        pairs.extend(rows.iter().map(|&r| (x[[r, feature]], y[r])));
        if let Some(candidate) = best_split_on(feature, &mut pairs, parent_sse, limits.min_samples_leaf)
        {
            if best.map_or(true, |b| candidate.decrease > b.decrease) {
                best = Some(candidate);
            }
        }
    }
    best
}

/// Best threshold for one feature, scanning sorted values with running sums.
fn best_split_on(
    feature: usize,
    pairs: &mut [(f64, f64)],
    parent_sse: f64,
    min_samples_leaf: usize,
) -> Option<SplitCandidate> {
    let n = pairs.len();
    if n < 2 * min_samples_leaf {
        return None;
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    if pairs[0].0 == pairs[n - 1].0 {
        return None;
    }

    let (total_sum, total_sq) = pairs
        .iter()
        .fold((0.0, 0.0), |(s, sq), &(_, t)| (s + t, sq + t * t));

    let mut best: Option<SplitCandidate> = None;
    let mut left_sum = 0.0;
    let mut left_sq = 0.0;

    for i in 1..n {
        let (prev_x, prev_y) = pairs[i - 1];
        left_sum += prev_y;
        left_sq += prev_y * prev_y;

        let next_x = pairs[i].0;
        if prev_x == next_x || i < min_samples_leaf || n - i < min_samples_leaf {
            continue;
        }

        let n_left = i as f64;
        let n_right = (n - i) as f64;
        let right_sum = total_sum - left_sum;
        let right_sq = total_sq - left_sq;
        let sse_left = (left_sq - left_sum * left_sum / n_left).max(0.0);
        let sse_right = (right_sq - right_sum * right_sum / n_right).max(0.0);
        let decrease = (parent_sse - sse_left - sse_right).max(0.0);

        if best.map_or(true, |b| decrease > b.decrease) {
            let mid = prev_x + (next_x - prev_x) / 2.0;
            let threshold = if mid >= next_x { prev_x } else { mid };
            best = Some(SplitCandidate {
                feature,
                threshold,
                decrease,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};
    use rand::SeedableRng;

    fn limits(max_features: usize) -> TreeLimits {
        TreeLimits {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features,
        }
    }

    #[test]
    fn test_tree_fits_step_function() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = [5.0, 5.0, 5.0, 20.0, 20.0, 20.0];
        let mut rng = StdRng::seed_from_u64(0);

        let tree = RegressionTree::grow(x.view(), &y, (0..6).collect(), &limits(1), &mut rng);

        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.depth(), 1);
        match &tree.nodes()[0] {
            Node::Split {
                feature,
                threshold,
                impurity_decrease,
                n_samples,
                ..
            } => {
                assert_eq!(*feature, 0);
                assert_relative_eq!(*threshold, 6.5);
                // 6 * 7.5^2
                assert_relative_eq!(*impurity_decrease, 337.5);
                assert_eq!(*n_samples, 6);
            }
            other => panic!("expected split at root, got {:?}", other),
        }
        assert_relative_eq!(tree.predict_row(array![2.5].view()), 5.0);
        assert_relative_eq!(tree.predict_row(array![6.5].view()), 5.0);
        assert_relative_eq!(tree.predict_row(array![7.0].view()), 20.0);
    }

    #[test]
    fn test_tree_pure_node_is_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = [7.0, 7.0, 7.0];
        let mut rng = StdRng::seed_from_u64(1);
        let tree = RegressionTree::grow(x.view(), &y, vec![0, 1, 2], &limits(1), &mut rng);
        assert_eq!(tree.nodes().len(), 1);
        assert_relative_eq!(tree.predict_row(array![100.0].view()), 7.0);
    }

    #[test]
    fn test_tree_respects_max_depth() {
        let x = Array2::from_shape_fn((16, 1), |(i, _)| i as f64);
        let y: Vec<f64> = (0..16).map(|i| (i * i) as f64).collect();
        let mut rng = StdRng::seed_from_u64(2);
        let mut lim = limits(1);
        lim.max_depth = Some(2);

        let tree = RegressionTree::grow(x.view(), &y, (0..16).collect(), &lim, &mut rng);
        assert!(tree.depth() <= 2);
        assert!(tree.n_leaves() <= 4);
    }

    #[test]
    fn test_tree_respects_min_samples_leaf() {
        let x = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let y: Vec<f64> = (0..10).map(|i| if i == 9 { 100.0 } else { 0.0 }).collect();
        let mut rng = StdRng::seed_from_u64(3);
        let mut lim = limits(1);
        lim.min_samples_leaf = 3;

        let tree = RegressionTree::grow(x.view(), &y, (0..10).collect(), &lim, &mut rng);
        for node in tree.nodes() {
            if let Node::Leaf { n_samples, .. } = node {
                assert!(*n_samples >= 3);
            }
        }
    }

    #[test]
    fn test_tree_falls_back_to_remaining_features() {
        // Column 0 is constant, so a draw of only column 0 must fall through to column 1.
        let x = array![[1.0, 0.0], [1.0, 0.0], [1.0, 1.0], [1.0, 1.0]];
        let y = [1.0, 1.0, 9.0, 9.0];
        for seed in 0..8 {
            let mut rng = StdRng::seed_from_u64(seed);
            let tree = RegressionTree::grow(x.view(), &y, (0..4).collect(), &limits(1), &mut rng);
            assert_eq!(tree.n_leaves(), 2, "seed {}", seed);
        }
    }

    #[test]
    fn test_tree_never_extrapolates() {
        let x = array![[2015.0, 10000.0], [2018.0, 5000.0], [2010.0, 40000.0]];
        let y = [40000.0, 52000.0, 20000.0];
        let mut rng = StdRng::seed_from_u64(4);
        let tree = RegressionTree::grow(x.view(), &y, vec![0, 1, 2, 0], &limits(2), &mut rng);
        for probe in [array![1990.0, 0.0], array![2030.0, 1e7]] {
            let p = tree.predict_row(probe.view());
            assert!((20000.0..=52000.0).contains(&p));
        }
    }

    #[test]
    fn test_tree_importances_sum_decreases() {
        let x = array![[0.0, 1.0], [0.0, 2.0], [1.0, 1.0], [1.0, 2.0]];
        let y = [0.0, 1.0, 10.0, 11.0];
        let mut rng = StdRng::seed_from_u64(5);
        let tree = RegressionTree::grow(x.view(), &y, (0..4).collect(), &limits(2), &mut rng);

        let mut totals = vec![0.0; 2];
        tree.accumulate_importances(&mut totals);
        // Total SSE of y is 101; the tree ends with pure leaves.
        assert_relative_eq!(totals[0] + totals[1], 101.0, epsilon = 1e-9);
        assert!(totals[0] > totals[1]);
    }

    #[test]
    fn test_tree_validate_rejects_bad_feature() {
        let tree = RegressionTree {
            nodes: vec![
                Node::Split {
                    feature: 3,
                    threshold: 0.5,
                    left: 1,
                    right: 2,
                    impurity_decrease: 1.0,
                    n_samples: 2,
                },
                Node::Leaf {
                    value: 0.0,
                    n_samples: 1,
                },
                Node::Leaf {
                    value: 1.0,
                    n_samples: 1,
                },
            ],
            n_features: 2,
        };
        assert!(matches!(tree.validate(), Err(ModelError::CorruptParams(_))));

        let empty = RegressionTree {
            nodes: vec![],
            n_features: 2,
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_tree_serde_round_trip() {
        use crate::serialization::SerializableParams;

        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = [1.0, 2.0, 3.0, 4.0];
        let mut rng = StdRng::seed_from_u64(6);
        let tree = RegressionTree::grow(x.view(), &y, (0..4).collect(), &limits(1), &mut rng);

        let restored = RegressionTree::from_bytes(&tree.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, tree);
        assert!(restored.validate().is_ok());
    }
}
