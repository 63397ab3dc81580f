use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_classes: usize,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DecisionTree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        distribution: Vec<f64>,
    },
}

impl RandomForest {
    /// `x` and `y` must be non-empty and the same length; labels `< n_classes`.
    pub fn fit(x: ArrayView2<f64>, y: &[usize], n_classes: usize, params: ForestParams, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let tree_seeds: Vec<u64> = (0..params.n_trees.max(1)).map(|_| rng.gen()).collect();

        let trees = tree_seeds
            .into_par_iter()
            .map(|tree_seed| {
                let mut rng = StdRng::seed_from_u64(tree_seed);
                let bootstrap: Vec<usize> = (0..y.len()).map(|_| rng.gen_range(0..y.len())).collect();
                let mut builder = TreeBuilder {
                    x,
                    y,
                    n_classes,
                    params,
                    rng,
                    nodes: Vec::new(),
                };
                builder.grow(bootstrap, 0);
                DecisionTree { nodes: builder.nodes }
            })
            .collect();

        Self {
            n_classes,
            n_features: x.ncols(),
            trees,
        }
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn predict_proba(&self, sample: ArrayView1<f64>) -> Array1<f64> {
        let mut proba = Array1::zeros(self.n_classes);
        for tree in &self.trees {
            for (acc, p) in proba.iter_mut().zip(tree.leaf(sample)) {
                *acc += p;
            }
        }
        proba / self.trees.len().max(1) as f64
    }
}

impl DecisionTree {
    fn leaf(&self, sample: ArrayView1<f64>) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { distribution } => return distribution,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if sample[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

struct TreeBuilder<'a, 'b> {
    x: ArrayView2<'a, f64>,
    y: &'b [usize],
    n_classes: usize,
    params: ForestParams,
    rng: StdRng,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl TreeBuilder<'_, '_> {
    /// Grows the subtree for `samples` and returns its root index.
    fn grow(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let counts = self.class_counts(&samples);
        let parent_impurity = gini(&counts, samples.len());

        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        if depth_reached || samples.len() < self.params.min_samples_split.max(2) || parent_impurity == 0.0 {
            return self.push_leaf(&counts, samples.len());
        }

        let split = match self.best_split(&samples) {
            Some(split) if split.impurity < parent_impurity - 1e-12 => split,
            _ => return self.push_leaf(&counts, samples.len()),
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&s| self.x[[s, split.feature]] <= split.threshold);
        if left.is_empty() || right.is_empty() {
            return self.push_leaf(&counts, left.len() + right.len());
        }

        let index = self.nodes.len();
        self.nodes.push(Node::Leaf {
            distribution: Vec::new(),
        });
        let left = self.grow(left, depth + 1);
        let right = self.grow(right, depth + 1);
        self.nodes[index] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        index
    }

    fn push_leaf(&mut self, counts: &[usize], total: usize) -> usize {
        let distribution = counts.iter().map(|&c| c as f64 / total as f64).collect();
        self.nodes.push(Node::Leaf { distribution });
        self.nodes.len() - 1
    }

    fn class_counts(&self, samples: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &s in samples {
            counts[self.y[s]] += 1;
        }
        counts
    }

    // Visits features in random order until `sqrt(n_features)` non-constant
    // ones have been evaluated.
    fn best_split(&mut self, samples: &[usize]) -> Option<BestSplit> {
        let n_features = self.x.ncols();
        let max_features = ((n_features as f64).sqrt() as usize).clamp(1, n_features);
        let order = rand::seq::index::sample(&mut self.rng, n_features, n_features);

        let total = samples.len();
        let mut best: Option<BestSplit> = None;
        let mut sorted = samples.to_vec();
        let mut visited = 0;

        for feature in order.iter() {
            if visited >= max_features {
                break;
            }

            sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));
            if self.x[[sorted[0], feature]] == self.x[[sorted[total - 1], feature]] {
                continue;
            }
            visited += 1;

            let mut left_counts = vec![0usize; self.n_classes];
            let mut right_counts = self.class_counts(&sorted);

            for pos in 0..total - 1 {
                let class = self.y[sorted[pos]];
                left_counts[class] += 1;
                right_counts[class] -= 1;

                let here = self.x[[sorted[pos], feature]];
                let next = self.x[[sorted[pos + 1], feature]];
                if here == next {
                    continue;
                }

                let n_left = pos + 1;
                let n_right = total - n_left;
                let impurity = (n_left as f64 * gini(&left_counts, n_left)
                    + n_right as f64 * gini(&right_counts, n_right))
                    / total as f64;

                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    let midpoint = here + (next - here) / 2.0;
                    best = Some(BestSplit {
                        feature,
                        threshold: if midpoint < next { midpoint } else { here },
                        impurity,
                    });
                }
            }
        }

        best
    }
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / total).powi(2)).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, s, Array2};

    fn params() -> ForestParams {
        ForestParams {
            n_trees: 25,
            max_depth: None,
            min_samples_split: 2,
        }
    }

    fn two_blobs() -> (Array2<f64>, Vec<usize>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            let jitter = i as f64 * 0.01;
            rows.extend_from_slice(&[-2.0 + jitter, 1.0 - jitter, 0.5]);
            labels.push(0);
            rows.extend_from_slice(&[2.0 - jitter, -1.0 + jitter, 0.5]);
            labels.push(1);
        }
        (Array2::from_shape_vec((40, 3), rows).unwrap(), labels)
    }

    #[test]
    fn test_separable_blobs() {
        let (x, y) = two_blobs();
        let forest = RandomForest::fit(x.view(), &y, 2, params(), 42);

        let proba = forest.predict_proba(array![-1.9, 0.9, 0.5].view());
        assert!(proba[0] > 0.9, "{proba:?}");
        let proba = forest.predict_proba(array![1.9, -0.9, 0.5].view());
        assert!(proba[1] > 0.9, "{proba:?}");
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = two_blobs();
        let forest = RandomForest::fit(x.view(), &y, 3, params(), 1);
        let proba = forest.predict_proba(array![0.0, 0.0, 0.5].view());
        assert_eq!(proba.len(), 3);
        assert!((proba.sum() - 1.0).abs() < 1e-9);
        assert_eq!(proba[2], 0.0);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = two_blobs();
        assert_eq!(
            RandomForest::fit(x.view(), &y, 2, params(), 7),
            RandomForest::fit(x.view(), &y, 2, params(), 7)
        );
    }

    #[test]
    fn test_depth_limit_makes_stumps() {
        let (x, y) = two_blobs();
        let stumps = ForestParams {
            max_depth: Some(0),
            ..params()
        };
        let forest = RandomForest::fit(x.view(), &y, 2, stumps, 3);
        assert!(forest.trees.iter().all(|t| t.nodes.len() == 1));
    }

    #[test]
    fn test_fit_on_borrowed_subsets() {
        let (x, y) = two_blobs();
        let forest = {
            let labels = y[..30].to_vec();
            RandomForest::fit(x.slice(s![..30, ..]), &labels, 2, params(), 5)
        };
        assert_eq!(forest.n_features(), 3);
        assert!(forest.predict_proba(x.row(35))[y[35]] > 0.5);
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini(&[5, 0], 5), 0.0);
        assert!((gini(&[2, 2], 4) - 0.5).abs() < 1e-12);
    }
}
