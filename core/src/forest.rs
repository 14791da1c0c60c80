//! Random forest of CART decision trees for binary labels.
//!
//! Trees are grown on bootstrap samples with Gini impurity, drawing a
//! random feature subset at every split. All randomness comes from the
//! caller's StageRng so a fixed seed reproduces the same forest.

use crate::{
    config::ForestConfig,
    error::{ScoreError, ScoreResult},
    rng::StageRng,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Node {
    Leaf {
        /// Fraction of positive (label 1) samples that reached this leaf.
        p_positive: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct Pending {
    node: usize,
    samples: Vec<usize>,
    depth: usize,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

fn gini(positives: f64, total: f64) -> f64 {
    if total == 0.0 {
        return 0.0;
    }
    let p = positives / total;
    2.0 * p * (1.0 - p)
}

impl DecisionTree {
    /// Grow a tree on `samples` (row indices into `x`, repeats allowed).
    pub fn fit(
        x: &[Vec<f64>],
        y: &[u8],
        samples: Vec<usize>,
        config: &ForestConfig,
        rng: &mut StageRng,
    ) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let mtry = config.max_features.resolve(n_features);

        let mut nodes = vec![Node::Leaf { p_positive: 0.0 }];
        let mut stack = vec![Pending { node: 0, samples, depth: 0 }];

        while let Some(Pending { node, samples, depth }) = stack.pop() {
            let total = samples.len() as f64;
            let positives = samples.iter().filter(|&&i| y[i] == 1).count() as f64;
            let p_positive = if total > 0.0 { positives / total } else { 0.0 };

            let depth_exhausted = config.max_depth.is_some_and(|d| depth >= d);
            let pure = positives == 0.0 || positives == total;
            if pure || depth_exhausted || samples.len() < config.min_samples_split {
                nodes[node] = Node::Leaf { p_positive };
                continue;
            }

            let Some(split) = best_split(x, y, &samples, n_features, mtry, config.min_samples_leaf, rng) else {
                nodes[node] = Node::Leaf { p_positive };
                continue;
            };

            let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
                .into_iter()
                .partition(|&i| x[i][split.feature] <= split.threshold);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf { p_positive: 0.0 });
            nodes.push(Node::Leaf { p_positive: 0.0 });
            nodes[node] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };
            stack.push(Pending { node: right, samples: right_samples, depth: depth + 1 });
            stack.push(Pending { node: left, samples: left_samples, depth: depth + 1 });
        }

        Self { nodes }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Probability of label 1 for one row.
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { p_positive } => return *p_positive,
                Node::Split { feature, threshold, left, right } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Search a random feature order until `mtry` features that vary within
/// the node have been evaluated. Returns the lowest weighted Gini split.
fn best_split(
    x: &[Vec<f64>],
    y: &[u8],
    samples: &[usize],
    n_features: usize,
    mtry: usize,
    min_samples_leaf: usize,
    rng: &mut StageRng,
) -> Option<SplitCandidate> {
    let mut order: Vec<usize> = (0..n_features).collect();
    rng.shuffle(&mut order);

    let total = samples.len() as f64;
    let total_pos = samples.iter().filter(|&&i| y[i] == 1).count() as f64;
    let min_leaf = min_samples_leaf.max(1);

    let mut best: Option<SplitCandidate> = None;
    let mut evaluated = 0;
    let mut sorted = samples.to_vec();

    for feature in order {
        if evaluated >= mtry {
            break;
        }
        sorted.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));
        let first = x[sorted[0]][feature];
        let last = x[sorted[sorted.len() - 1]][feature];
        if first == last {
            continue;
        }
        evaluated += 1;

        let mut left_pos = 0.0;
        for k in 0..sorted.len() - 1 {
            if y[sorted[k]] == 1 {
                left_pos += 1.0;
            }
            let n_left = k + 1;
            let n_right = sorted.len() - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let here = x[sorted[k]][feature];
            let next = x[sorted[k + 1]][feature];
            if here == next {
                continue;
            }

            let nl = n_left as f64;
            let nr = n_right as f64;
            let impurity = (nl / total) * gini(left_pos, nl) + (nr / total) * gini(total_pos - left_pos, nr);

            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                let mut threshold = here + (next - here) / 2.0;
                if threshold >= next {
                    threshold = here;
                }
                best = Some(SplitCandidate { feature, threshold, impurity });
            }
        }
    }

    best
}

/// Bagged ensemble of decision trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn fit(x: &[Vec<f64>], y: &[u8], config: &ForestConfig, rng: &mut StageRng) -> ScoreResult<Self> {
        if x.is_empty() {
            return Err(ScoreError::InsufficientData { what: "random forest", needed: 1, got: 0 });
        }
        let n = x.len();
        let trees: Vec<DecisionTree> = (0..config.n_trees)
            .map(|_| {
                let mut tree_rng = rng.fork("tree");
                let bootstrap: Vec<usize> = (0..n).map(|_| tree_rng.index_below(n)).collect();
                DecisionTree::fit(x, y, bootstrap, config, &mut tree_rng)
            })
            .collect();

        let total_nodes: usize = trees.iter().map(DecisionTree::node_count).sum();
        log::debug!(
            "forest fit: {} trees, {} nodes total, {} rows × {} columns",
            trees.len(),
            total_nodes,
            n,
            x[0].len()
        );
        Ok(Self { trees })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean of per-tree positive-class probabilities.
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict_proba(row)).sum();
        sum / self.trees.len() as f64
    }

    /// Label 1 only when the mean probability strictly exceeds one half.
    pub fn predict(&self, row: &[f64]) -> u8 {
        u8::from(self.predict_proba(row) > 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<u8>) {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y: Vec<u8> = (0..40).map(|i| u8::from(i >= 20)).collect();
        (x, y)
    }

    #[test]
    fn single_tree_learns_threshold() {
        let (x, y) = separable();
        let config = ForestConfig { max_features: crate::config::MaxFeatures::All, ..ForestConfig::default() };
        let mut rng = StageRng::new(1, 0);
        let tree = DecisionTree::fit(&x, &y, (0..40).collect(), &config, &mut rng);
        assert_eq!(tree.predict_proba(&[5.0, 0.0]), 0.0);
        assert_eq!(tree.predict_proba(&[35.0, 0.0]), 1.0);
    }

    #[test]
    fn pure_node_is_a_leaf() {
        let x = vec![vec![1.0], vec![2.0]];
        let y = vec![1, 1];
        let mut rng = StageRng::new(1, 0);
        let tree = DecisionTree::fit(&x, &y, vec![0, 1], &ForestConfig::default(), &mut rng);
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn forest_is_reproducible_for_a_seed() {
        let (x, y) = separable();
        let config = ForestConfig { n_trees: 10, ..ForestConfig::default() };
        let a = RandomForest::fit(&x, &y, &config, &mut StageRng::new(42, 1)).unwrap();
        let b = RandomForest::fit(&x, &y, &config, &mut StageRng::new(42, 1)).unwrap();
        for row in &x {
            assert_eq!(a.predict_proba(row), b.predict_proba(row));
        }
        assert_eq!(a.predict(&[2.0, 2.0]), 0);
        assert_eq!(a.predict(&[38.0, 2.0]), 1);
    }
}
