//! Gini classification tree grown on weighted rows, the random forest base learner

use super::regression_tree::SortedColumns;
use super::stats::argmax;
use ndarray::{Array2, ArrayView1};

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        class: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Fully grown CART classifier.
///
/// Rows are visited in presorted column order and a candidate split only wins
/// on a strictly larger gain, so equal splits resolve to the first feature in
/// `features` and the lowest threshold. Two fits on the same input are identical.
#[derive(Debug, Clone)]
pub struct ClassificationTree {
    nodes: Vec<Node>,
    /// Weighted Gini decrease credited to each column of the training matrix
    importance: Vec<f64>,
}

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Read-only inputs shared by every node of one fit
struct Grower<'a> {
    records: &'a Array2<f64>,
    targets: &'a [usize],
    n_classes: usize,
    weights: &'a [f64],
    features: &'a [usize],
    sorted: &'a SortedColumns,
}

impl ClassificationTree {
    /// Grow a tree over the rows with positive `weight`, splitting only on `features`.
    /// A bootstrap sample is expressed as per-row draw counts.
    #[must_use]
    pub fn fit(
        records: &Array2<f64>,
        targets: &[usize],
        n_classes: usize,
        weights: &[f64],
        features: &[usize],
        sorted: &SortedColumns,
    ) -> Self {
        let grower = Grower {
            records,
            targets,
            n_classes,
            weights,
            features,
            sorted,
        };
        let mut tree = Self {
            nodes: Vec::new(),
            importance: vec![0.0; records.ncols()],
        };
        let rows: Vec<usize> = (0..records.nrows())
            .filter(|&r| weights.get(r).is_some_and(|&w| w > 0.0))
            .collect();
        let mut member = vec![false; records.nrows()];
        tree.grow(&grower, &rows, &mut member);
        tree
    }

    fn grow(&mut self, grower: &Grower<'_>, rows: &[usize], member: &mut [bool]) -> usize {
        let counts = grower.class_weights(rows);
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            class: argmax(&counts),
        });

        // pure
        if counts.iter().filter(|&&c| c > 0.0).count() < 2 {
            return id;
        }

        for &r in rows {
            member[r] = true;
        }
        let best = grower.best_split(&counts, member);
        for &r in rows {
            member[r] = false;
        }

        let Some(split) = best else {
            return id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| grower.records[[r, split.feature]] <= split.threshold);

        self.importance[split.feature] += split.gain;
        let left = self.grow(grower, &left_rows, member);
        let right = self.grow(grower, &right_rows, member);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    #[must_use]
    pub fn predict_row(&self, row: ArrayView1<f64>) -> usize {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { class } => return *class,
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

impl Grower<'_> {
    fn class_weights(&self, rows: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.n_classes];
        for &r in rows {
            if let Some(c) = counts.get_mut(self.targets[r]) {
                *c += self.weights[r];
            }
        }
        counts
    }

    /// Threshold with the largest weighted Gini decrease, if any improves.
    ///
    /// With `N·gini = N - Σc²/N`, the decrease of a split reduces to
    /// `Σl²/L + Σr²/R - Σc²/N`.
    fn best_split(&self, counts: &[f64], member: &[bool]) -> Option<Split> {
        let total: f64 = counts.iter().sum();
        let parent_score = counts.iter().map(|c| c * c).sum::<f64>() / total;

        let mut best: Option<Split> = None;
        let mut ordered: Vec<usize> = Vec::new();
        let mut left = vec![0.0; self.n_classes];

        for &feature in self.features {
            ordered.clear();
            ordered.extend(
                self.sorted
                    .order(feature)
                    .iter()
                    .copied()
                    .filter(|&r| member[r]),
            );
            left.iter_mut().for_each(|c| *c = 0.0);
            let mut left_total = 0.0;

            for pair in ordered.windows(2) {
                let (r, next_r) = (pair[0], pair[1]);
                if let Some(c) = left.get_mut(self.targets[r]) {
                    *c += self.weights[r];
                }
                left_total += self.weights[r];

                let value = self.records[[r, feature]];
                let next = self.records[[next_r, feature]];
                if next <= value {
                    continue;
                }

                let right_total = total - left_total;
                if left_total <= 0.0 || right_total <= 0.0 {
                    continue;
                }
                let left_sq: f64 = left.iter().map(|l| l * l).sum();
                let right_sq: f64 = counts
                    .iter()
                    .zip(&left)
                    .map(|(c, l)| (c - l) * (c - l))
                    .sum();
                let gain = left_sq / left_total + right_sq / right_total - parent_score;
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
}
