//! CART decision tree grown best-first.

use ndarray::{ArrayView1, ArrayView2};
use rand::Rng;
use rand::seq::index::sample;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Improvements at or below this are treated as no improvement.
const MIN_IMPROVEMENT: f64 = 1e-12;

/// What the tree predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Task {
    /// Labels are class indices in `0..n_classes`; leaves hold class frequencies.
    Classification { n_classes: usize },
    /// Leaves hold the mean label.
    Regression,
}

/// Growth limits resolved for a concrete training set.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GrowthLimits {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: usize,
    pub max_leaf_nodes: Option<usize>,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
    improvement: f64,
}

/// A leaf that could still be split, ranked by impurity improvement.
struct Frontier {
    node: usize,
    depth: usize,
    samples: Vec<usize>,
    split: Split,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap on improvement; earlier nodes first on ties
        self.split
            .improvement
            .total_cmp(&other.split.improvement)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// A fitted tree stored as a node arena; node 0 is the root.
#[derive(Debug, Clone)]
pub(crate) struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Grow a tree on the rows listed in `samples`.
    ///
    /// `samples` may repeat rows (bootstrap draws); each occurrence counts as
    /// one sample. It must not be empty.
    pub fn fit<R: Rng>(
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        samples: Vec<usize>,
        task: Task,
        limits: &GrowthLimits,
        rng: &mut R,
    ) -> Self {
        let grower = Grower {
            x: x.view(),
            y: y.view(),
            task,
            limits,
        };

        let mut nodes = vec![Node::Leaf {
            value: grower.leaf_value(&samples),
        }];
        let mut leaves = 1usize;
        let mut frontier = BinaryHeap::new();
        if let Some(split) = grower.find_split(&samples, 0, rng) {
            frontier.push(Frontier {
                node: 0,
                depth: 0,
                samples,
                split,
            });
        }

        while let Some(candidate) = frontier.pop() {
            if limits.max_leaf_nodes.is_some_and(|max| leaves >= max) {
                break;
            }

            let Split {
                feature, threshold, ..
            } = candidate.split;
            let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = candidate
                .samples
                .iter()
                .partition(|&&row| x[[row, feature]] <= threshold);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf {
                value: grower.leaf_value(&left_samples),
            });
            nodes.push(Node::Leaf {
                value: grower.leaf_value(&right_samples),
            });
            nodes[candidate.node] = Node::Split {
                feature,
                threshold,
                left,
                right,
            };
            leaves += 1;

            let depth = candidate.depth + 1;
            for (node, child_samples) in [(left, left_samples), (right, right_samples)] {
                if let Some(split) = grower.find_split(&child_samples, depth, rng) {
                    frontier.push(Frontier {
                        node,
                        depth,
                        samples: child_samples,
                        split,
                    });
                }
            }
        }

        Self { nodes }
    }

    /// Leaf value reached by `row`: class frequencies or a one-element mean.
    pub fn predict_row(&self, row: ArrayView1<f64>) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
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

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }
}

struct Grower<'a> {
    x: ArrayView2<'a, f64>,
    y: ArrayView1<'a, f64>,
    task: Task,
    limits: &'a GrowthLimits,
}

impl Grower<'_> {
    fn leaf_value(&self, samples: &[usize]) -> Vec<f64> {
        let n = samples.len().max(1) as f64;
        match self.task {
            Task::Classification { n_classes } => {
                let mut counts = vec![0.0; n_classes];
                for &row in samples {
                    counts[self.y[row] as usize] += 1.0;
                }
                counts.iter_mut().for_each(|c| *c /= n);
                counts
            }
            Task::Regression => {
                vec![samples.iter().map(|&row| self.y[row]).sum::<f64>() / n]
            }
        }
    }

    /// Best split of `samples` over a random subset of features, if any
    /// split respects the limits and lowers impurity.
    fn find_split<R: Rng>(&self, samples: &[usize], depth: usize, rng: &mut R) -> Option<Split> {
        let limits = self.limits;
        let n = samples.len();
        if n < limits.min_samples_split
            || n < 2 * limits.min_samples_leaf
            || limits.max_depth.is_some_and(|max| depth >= max)
        {
            return None;
        }

        let n_features = self.x.ncols();
        let features = sample(rng, n_features, limits.max_features.min(n_features));

        let mut best: Option<Split> = None;
        for feature in features.iter() {
            if let Some(split) = self.best_split_on(samples, feature)
                && best.is_none_or(|b| split.improvement > b.improvement)
            {
                best = Some(split);
            }
        }
        best
    }

    /// Scan sorted values of one feature, keeping running label statistics so
    /// each threshold is scored in constant time (per class).
    fn best_split_on(&self, samples: &[usize], feature: usize) -> Option<Split> {
        let mut pairs: Vec<(f64, f64)> = samples
            .iter()
            .map(|&row| (self.x[[row, feature]], self.y[row]))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = pairs.len();
        let min_leaf = self.limits.min_samples_leaf.max(1);
        let mut left = LabelStats::new(self.task);
        let mut right = LabelStats::new(self.task);
        for &(_, label) in &pairs {
            right.add(label);
        }
        let parent = right.weighted_impurity();

        let mut best: Option<Split> = None;
        for i in 1..n {
            let (value, label) = pairs[i - 1];
            left.add(label);
            right.remove(label);

            if i < min_leaf || n - i < min_leaf {
                continue;
            }
            let next = pairs[i].0;
            if value >= next {
                continue;
            }

            let improvement = parent - left.weighted_impurity() - right.weighted_impurity();
            if improvement > MIN_IMPROVEMENT && best.is_none_or(|b| improvement > b.improvement) {
                let mid = value + (next - value) / 2.0;
                let threshold = if mid < next { mid } else { value };
                best = Some(Split {
                    feature,
                    threshold,
                    improvement,
                });
            }
        }
        best
    }
}

/// Running label statistics for one side of a candidate split.
enum LabelStats {
    Classes { counts: Vec<f64>, n: f64 },
    Moments { sum: f64, sq_sum: f64, n: f64 },
}

impl LabelStats {
    fn new(task: Task) -> Self {
        match task {
            Task::Classification { n_classes } => LabelStats::Classes {
                counts: vec![0.0; n_classes],
                n: 0.0,
            },
            Task::Regression => LabelStats::Moments {
                sum: 0.0,
                sq_sum: 0.0,
                n: 0.0,
            },
        }
    }

    fn add(&mut self, label: f64) {
        match self {
            LabelStats::Classes { counts, n } => {
                counts[label as usize] += 1.0;
                *n += 1.0;
            }
            LabelStats::Moments { sum, sq_sum, n } => {
                *sum += label;
                *sq_sum += label * label;
                *n += 1.0;
            }
        }
    }

    fn remove(&mut self, label: f64) {
        match self {
            LabelStats::Classes { counts, n } => {
                counts[label as usize] -= 1.0;
                *n -= 1.0;
            }
            LabelStats::Moments { sum, sq_sum, n } => {
                *sum -= label;
                *sq_sum -= label * label;
                *n -= 1.0;
            }
        }
    }

    /// Impurity times sample count (Gini or variance).
    fn weighted_impurity(&self) -> f64 {
        match self {
            LabelStats::Classes { counts, n } => {
                if *n <= 0.0 {
                    return 0.0;
                }
                let sum_sq: f64 = counts.iter().map(|c| (c / n).powi(2)).sum();
                n * (1.0 - sum_sq)
            }
            LabelStats::Moments { sum, sq_sum, n } => {
                if *n <= 0.0 {
                    return 0.0;
                }
                (sq_sum - sum * sum / n).max(0.0)
            }
        }
    }
}
