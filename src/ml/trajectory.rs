//! Two-dimensional trajectory embedding: PCA start, t-SNE refinement

use crate::structs::{Embedding, ModelInputs, Result, TyperError};
use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_reduction::Pca;
use ndarray::{Array2, Axis};

/// Sample count above which the quadratic cost of exact t-SNE is worth a warning
pub const LARGE_EMBEDDING: usize = 5000;

/// Optimizer settings for the neighbourhood-preserving refinement
#[derive(Debug, Clone, Copy)]
pub struct TrajectoryParams {
    /// Upper bound on perplexity; lowered to `(n - 1) / 3` for small inputs
    pub perplexity: f64,
    pub iterations: usize,
    pub exaggeration: f64,
    pub exaggeration_iterations: usize,
}

impl Default for TrajectoryParams {
    fn default() -> Self {
        Self {
            perplexity: 30.0,
            iterations: 500,
            exaggeration: 12.0,
            exaggeration_iterations: 125,
        }
    }
}

/// Embed every sample, train and test alike, standardized with the training scaler
///
/// # Errors
/// Returns error if there are too few samples or features, or PCA fails
pub fn embed(inputs: &ModelInputs, params: &TrajectoryParams) -> Result<Embedding> {
    if inputs.scaler.n_features() != inputs.features.ncols() {
        return Err(TyperError::Fit(format!(
            "Scaler was fitted on {} features, matrix has {}",
            inputs.scaler.n_features(),
            inputs.features.ncols()
        )));
    }
    let scaled = inputs.scaler.transform(&inputs.features);
    let init = pca_init(&scaled)?;
    let coords = refine(&scaled, init, params);

    Ok(Embedding {
        coords,
        targets: inputs.targets.to_vec(),
        class_codes: inputs.class_codes.clone(),
    })
}

/// Two leading principal components, scaled to a tiny spread
///
/// # Errors
/// Returns error for fewer than 2 samples or features, or if PCA fails
#[allow(clippy::cast_precision_loss)]
pub fn pca_init(records: &Array2<f64>) -> Result<Array2<f64>> {
    let (n_samples, n_features) = records.dim();
    if n_features < 2 {
        return Err(TyperError::Fit(
            "Trajectory embedding requires at least 2 features".into(),
        ));
    }
    if n_samples < 2 {
        return Err(TyperError::Fit(
            "Trajectory embedding requires at least 2 samples".into(),
        ));
    }

    let dataset = DatasetBase::from(records.clone());
    let pca = Pca::params(2)
        .fit(&dataset)
        .map_err(|e| TyperError::Fit(format!("PCA failed: {e}")))?;
    let projected: Array2<f64> = pca.predict(records);

    let spread = projected.column(0).std(0.0);
    if spread > 0.0 && spread.is_finite() {
        Ok(projected.mapv(|v| v / spread * 1e-4))
    } else {
        Ok(projected.mapv(|_| 0.0))
    }
}

fn squared_distances(points: &Array2<f64>) -> Array2<f64> {
    let n = points.nrows();
    let mut d = Array2::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let dist: f64 = points
                .row(i)
                .iter()
                .zip(points.row(j).iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();
            d[[i, j]] = dist;
            d[[j, i]] = dist;
        }
    }
    d
}

/// Conditional affinities of row `i` at precision `beta`, and their entropy.
///
/// Distances are shifted by the row minimum, so the nearest neighbour always
/// weighs `exp(0) = 1` and a large `beta` cannot underflow the whole row.
/// `None` only when the row has no finite distances.
fn row_affinities(dist: &Array2<f64>, i: usize, beta: f64) -> Option<(Vec<f64>, f64)> {
    let n = dist.nrows();
    let nearest = (0..n)
        .filter(|&j| j != i)
        .map(|j| dist[[i, j]])
        .fold(f64::INFINITY, f64::min);
    if !nearest.is_finite() {
        return None;
    }

    let mut p = vec![0.0; n];
    let mut sum = 0.0;
    for j in 0..n {
        if j != i {
            p[j] = (-(dist[[i, j]] - nearest) * beta).exp();
            sum += p[j];
        }
    }
    if !(sum > 0.0 && sum.is_finite()) {
        return None;
    }

    let mut entropy = 0.0;
    for (j, pj) in p.iter_mut().enumerate() {
        if j != i {
            *pj /= sum;
            if *pj > 0.0 {
                entropy -= *pj * pj.ln();
            }
        }
    }
    Some((p, entropy))
}

/// Symmetric joint affinities calibrated to `perplexity`.
///
/// When the target entropy is out of reach (tied nearest neighbours,
/// duplicate cells) the search keeps the last row it could evaluate.
#[allow(clippy::cast_precision_loss)]
fn joint_affinities(points: &Array2<f64>, perplexity: f64) -> Array2<f64> {
    let n = points.nrows();
    let dist = squared_distances(points);
    let target = perplexity.ln();
    let mut p = Array2::zeros((n, n));
    let uniform = 1.0 / (n as f64 - 1.0).max(1.0);

    for i in 0..n {
        let mut beta = 1.0;
        let mut lo = 0.0_f64;
        let mut hi = f64::INFINITY;
        let mut row: Option<Vec<f64>> = None;
        for _ in 0..64 {
            let Some((candidate, entropy)) = row_affinities(&dist, i, beta) else {
                break;
            };
            row = Some(candidate);
            let diff = entropy - target;
            if diff.abs() < 1e-5 {
                break;
            }
            if diff > 0.0 {
                lo = beta;
                beta = if hi.is_finite() { (beta + hi) / 2.0 } else { beta * 2.0 };
            } else {
                hi = beta;
                beta = (beta + lo) / 2.0;
            }
        }
        let row = row.unwrap_or_else(|| {
            (0..n)
                .map(|j| if j == i { 0.0 } else { uniform })
                .collect()
        });
        for (j, v) in row.into_iter().enumerate() {
            p[[i, j]] = v;
        }
    }

    let sym = (&p + &p.t()) / (2.0 * n as f64);
    sym.mapv(|v| v.max(1e-12))
}

/// Gradient descent on the t-SNE objective starting from `init`
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn refine(records: &Array2<f64>, init: Array2<f64>, params: &TrajectoryParams) -> Array2<f64> {
    let n = records.nrows();
    if n < 5 {
        return init;
    }
    if n > LARGE_EMBEDDING {
        log::warn!(
            "Exact t-SNE on {n} samples holds {n}x{n} affinity matrices; memory and time grow quadratically"
        );
    }

    let perplexity = params.perplexity.min((n as f64 - 1.0) / 3.0).max(1.0);
    let p = joint_affinities(records, perplexity);
    let learning_rate = (n as f64 / params.exaggeration).max(50.0);

    let mut y = init;
    let mut update = Array2::<f64>::zeros((n, 2));
    let mut gains = Array2::<f64>::ones((n, 2));
    let mut num = Array2::<f64>::zeros((n, n));
    let mut grad = Array2::<f64>::zeros((n, 2));

    for iter in 0..params.iterations {
        let exaggerate = iter < params.exaggeration_iterations;
        let scale = if exaggerate { params.exaggeration } else { 1.0 };
        let momentum = if exaggerate { 0.5 } else { 0.8 };

        // every off-diagonal entry is rewritten below; the diagonal stays zero
        let mut total = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = y[[i, 0]] - y[[j, 0]];
                let dy = y[[i, 1]] - y[[j, 1]];
                let v = 1.0 / (1.0 + dx * dx + dy * dy);
                num[[i, j]] = v;
                num[[j, i]] = v;
                total += 2.0 * v;
            }
        }
        let total = total.max(1e-12);

        grad.fill(0.0);
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let q = (num[[i, j]] / total).max(1e-12);
                let mult = 4.0 * (scale * p[[i, j]] - q) * num[[i, j]];
                grad[[i, 0]] += mult * (y[[i, 0]] - y[[j, 0]]);
                grad[[i, 1]] += mult * (y[[i, 1]] - y[[j, 1]]);
            }
        }

        for ((g, u), gain) in grad.iter().zip(update.iter_mut()).zip(gains.iter_mut()) {
            *gain = if (*g > 0.0) == (*u > 0.0) {
                (*gain * 0.8).max(0.01)
            } else {
                *gain + 0.2
            };
            *u = momentum * *u - learning_rate * *gain * g;
        }
        y += &update;

        if let Some(mean) = y.mean_axis(Axis(0)) {
            y -= &mean;
        }
    }

    y
}
