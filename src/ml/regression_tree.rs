//! Least-squares regression tree used as the gradient boosting base learner

use ndarray::{Array2, ArrayView1, Axis};
use std::cmp::Ordering;

/// Row order of every feature column, sorted ascending by value.
/// Computed once per boosting fit and shared by all trees.
#[derive(Debug, Clone)]
pub struct SortedColumns {
    orders: Vec<Vec<usize>>,
}

impl SortedColumns {
    #[must_use]
    pub fn new(records: &Array2<f64>) -> Self {
        let orders = records
            .axis_iter(Axis(1))
            .map(|col| {
                let mut order: Vec<usize> = (0..col.len()).collect();
                order.sort_by(|&a, &b| col[a].partial_cmp(&col[b]).unwrap_or(Ordering::Equal));
                order
            })
            .collect();
        Self { orders }
    }

    /// Row indices in ascending order of `feature`
    #[must_use]
    pub fn order(&self, feature: usize) -> &[usize] {
        &self.orders[feature]
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Hyperparameters for a single tree
#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    /// Total squared-error reduction credited to each feature
    importance: Vec<f64>,
}

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    /// Grow a tree on `residuals`; `leaf_value` maps the rows of a leaf to its output
    pub fn fit<F>(
        records: &Array2<f64>,
        residuals: &[f64],
        sorted: &SortedColumns,
        params: TreeParams,
        leaf_value: F,
    ) -> Self
    where
        F: Fn(&[usize]) -> f64,
    {
        let mut tree = Self {
            nodes: Vec::new(),
            importance: vec![0.0; records.ncols()],
        };
        let rows: Vec<usize> = (0..records.nrows()).collect();
        let mut member = vec![false; records.nrows()];
        tree.grow(records, residuals, sorted, params, &leaf_value, &rows, &mut member, 0);
        tree
    }

    #[allow(clippy::too_many_arguments)]
    fn grow<F>(
        &mut self,
        records: &Array2<f64>,
        residuals: &[f64],
        sorted: &SortedColumns,
        params: TreeParams,
        leaf_value: &F,
        rows: &[usize],
        member: &mut [bool],
        depth: usize,
    ) -> usize
    where
        F: Fn(&[usize]) -> f64,
    {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: leaf_value(rows),
        });

        if depth >= params.max_depth || rows.len() < 2 * params.min_samples_leaf.max(1) {
            return id;
        }

        for &r in rows {
            member[r] = true;
        }
        let best = best_split(records, residuals, sorted, params, rows, member);
        for &r in rows {
            member[r] = false;
        }

        let Some(split) = best else {
            return id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| records[[r, split.feature]] <= split.threshold);

        self.importance[split.feature] += split.gain;
        let left = self.grow(
            records, residuals, sorted, params, leaf_value, &left_rows, member, depth + 1,
        );
        let right = self.grow(
            records, residuals, sorted, params, leaf_value, &right_rows, member, depth + 1,
        );
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    #[must_use]
    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    #[must_use]
    pub fn importance(&self) -> &[f64] {
        &self.importance
    }

    #[must_use]
    #[cfg(test)]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }
}

/// Best variance-reducing threshold over all features, if any improves
#[allow(clippy::cast_precision_loss)]
fn best_split(
    records: &Array2<f64>,
    residuals: &[f64],
    sorted: &SortedColumns,
    params: TreeParams,
    rows: &[usize],
    member: &[bool],
) -> Option<Split> {
    let n = rows.len();
    let total: f64 = rows.iter().map(|&r| residuals[r]).sum();
    let parent_score = total * total / n as f64;
    let min_leaf = params.min_samples_leaf.max(1);

    let mut best: Option<Split> = None;
    let mut ordered: Vec<usize> = Vec::with_capacity(n);

    for (feature, order) in sorted.orders.iter().enumerate() {
        ordered.clear();
        ordered.extend(order.iter().copied().filter(|&r| member[r]));

        let mut left_sum = 0.0;
        for i in 0..n - 1 {
            let r = ordered[i];
            left_sum += residuals[r];
            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }

            let value = records[[r, feature]];
            let next = records[[ordered[i + 1], feature]];
            if next <= value {
                continue;
            }

            let right_sum = total - left_sum;
            let score = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64;
            let gain = score - parent_score;
            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(Split {
                    feature,
                    threshold: (value + next) / 2.0,
                    gain,
                });
            }
        }
    }

    best
}
