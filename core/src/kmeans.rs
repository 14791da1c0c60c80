//! Lloyd's k-means with greedy k-means++ seeding.
//!
//! Assignment ties always resolve to the lowest centroid index, so the
//! same rows and the same stream give the same clustering.

use crate::{
    config::ClusteringConfig,
    error::{ScoreError, ScoreResult},
    rng::StageRng,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    pub centroids: Vec<Vec<f64>>,
    pub inertia: f64,
    pub n_iter: usize,
}

pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Index of the nearest centroid and its squared distance.
fn nearest(centroids: &[Vec<f64>], row: &[f64]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(c, row);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

impl KMeans {
    pub fn fit(rows: &[Vec<f64>], config: &ClusteringConfig, rng: &mut StageRng) -> ScoreResult<Self> {
        let k = config.k;
        if rows.len() < k {
            return Err(ScoreError::InsufficientData { what: "k-means", needed: k, got: rows.len() });
        }

        let tol = absolute_tolerance(rows, config.tol);
        let mut best: Option<KMeans> = None;

        for run in 0..config.n_init {
            let seeds = kmeans_plus_plus(rows, k, rng);
            let candidate = lloyd(rows, seeds, config.max_iter, tol);
            log::debug!(
                "k-means init {run}: inertia={:.4} after {} iterations",
                candidate.inertia,
                candidate.n_iter
            );
            if best.as_ref().map_or(true, |b| candidate.inertia < b.inertia) {
                best = Some(candidate);
            }
        }

        best.ok_or_else(|| ScoreError::InvalidConfig("clustering.n_init must be > 0".into()))
    }

    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    pub fn predict(&self, row: &[f64]) -> usize {
        nearest(&self.centroids, row).0
    }
}

/// Convergence threshold scaled by the mean per-feature variance.
fn absolute_tolerance(rows: &[Vec<f64>], tol: f64) -> f64 {
    let width = rows[0].len();
    let n = rows.len() as f64;
    let mut total_var = 0.0;
    for j in 0..width {
        let mean = rows.iter().map(|r| r[j]).sum::<f64>() / n;
        total_var += rows.iter().map(|r| (r[j] - mean).powi(2)).sum::<f64>() / n;
    }
    tol * total_var / width.max(1) as f64
}

/// Greedy k-means++: each new centre is the best of several candidates
/// drawn proportionally to squared distance from the existing centres.
fn kmeans_plus_plus(rows: &[Vec<f64>], k: usize, rng: &mut StageRng) -> Vec<Vec<f64>> {
    let n = rows.len();
    let n_local_trials = 2 + (k as f64).ln().floor() as usize;

    let first = rng.index_below(n);
    let mut centers = vec![rows[first].clone()];
    let mut closest: Vec<f64> = rows.iter().map(|r| squared_distance(r, &rows[first])).collect();
    let mut potential: f64 = closest.iter().sum();

    for _ in 1..k {
        let mut best_candidate = None;
        let mut best_potential = f64::INFINITY;
        let mut best_dist = Vec::new();

        for _ in 0..n_local_trials {
            let candidate = if potential > 0.0 {
                let target = rng.next_f64() * potential;
                let mut acc = 0.0;
                let mut pick = n - 1;
                for (i, d) in closest.iter().enumerate() {
                    acc += d;
                    if acc > target {
                        pick = i;
                        break;
                    }
                }
                pick
            } else {
                rng.index_below(n)
            };

            let dist: Vec<f64> = rows
                .iter()
                .zip(&closest)
                .map(|(r, c)| squared_distance(r, &rows[candidate]).min(*c))
                .collect();
            let pot: f64 = dist.iter().sum();
            if pot < best_potential {
                best_potential = pot;
                best_candidate = Some(candidate);
                best_dist = dist;
            }
        }

        if let Some(c) = best_candidate {
            centers.push(rows[c].clone());
            closest = best_dist;
            potential = best_potential;
        }
    }

    centers
}

fn lloyd(rows: &[Vec<f64>], mut centroids: Vec<Vec<f64>>, max_iter: usize, tol: f64) -> KMeans {
    let k = centroids.len();
    let width = rows[0].len();
    let mut labels = vec![0usize; rows.len()];
    let mut n_iter = 0;

    for iter in 0..max_iter {
        n_iter = iter + 1;

        let mut sums = vec![vec![0.0; width]; k];
        let mut counts = vec![0usize; k];
        let mut dists = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let (c, d) = nearest(&centroids, row);
            labels[i] = c;
            dists.push(d);
            counts[c] += 1;
            for (s, x) in sums[c].iter_mut().zip(row) {
                *s += x;
            }
        }

        let mut updated: Vec<Vec<f64>> = sums
            .into_iter()
            .zip(&counts)
            .map(|(s, &n)| s.into_iter().map(|v| v / n.max(1) as f64).collect())
            .collect();

        // Re-seed empty clusters with the points farthest from their centroid.
        let empty: Vec<usize> = (0..k).filter(|&c| counts[c] == 0).collect();
        if !empty.is_empty() {
            let mut far: Vec<usize> = (0..rows.len()).collect();
            far.sort_by(|&a, &b| dists[b].total_cmp(&dists[a]).then(a.cmp(&b)));
            for (c, &row_idx) in empty.iter().zip(&far) {
                log::warn!("k-means: cluster {c} empty at iteration {iter}, re-seeding from row {row_idx}");
                updated[*c] = rows[row_idx].clone();
            }
        }

        let shift: f64 = centroids
            .iter()
            .zip(&updated)
            .map(|(a, b)| squared_distance(a, b))
            .sum();
        centroids = updated;

        if shift <= tol {
            break;
        }
    }

    let inertia = rows.iter().map(|r| nearest(&centroids, r).1).sum();
    KMeans { centroids, inertia, n_iter }
}
