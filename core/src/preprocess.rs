//! Column statistics and fitted transforms shared by both model paths.
//!
//! Every transform here follows the same lifecycle: `fit` on a training
//! population, then `transform` any number of rows. A fitted transform is
//! never refit or mutated.

use crate::{
    features::SalesFeatures,
    rng::StageRng,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Column statistics ────────────────────────────────────────────────────────

fn finite_sorted(values: &[f64]) -> Vec<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| x.is_finite()).collect();
    v.sort_by(f64::total_cmp);
    v
}

/// Quantile with linear interpolation between closest ranks, skipping
/// non-finite values. `None` when no finite value exists.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let sorted = finite_sorted(values);
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Most frequent present value; ties go to the lexicographically smallest.
pub fn mode<'a>(values: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values.into_iter().flatten() {
        *counts.entry(v).or_insert(0) += 1;
    }
    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }
    best.map(|(v, _)| v.to_string())
}

// ── Standard scaler ──────────────────────────────────────────────────────────

/// Per-column standardisation to zero mean and unit variance.
/// Population standard deviation; constant columns get a scale of 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn fit<R: AsRef<[f64]>>(rows: &[R]) -> Self {
        let width = rows.first().map_or(0, |r| r.as_ref().len());
        let n = rows.len().max(1) as f64;

        let mut mean = vec![0.0; width];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row.as_ref()) {
                *m += x;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0; width];
        for row in rows {
            for ((v, x), m) in var.iter_mut().zip(row.as_ref()).zip(&mean) {
                *v += (x - m).powi(2);
            }
        }
        let scale = var
            .into_iter()
            .map(|v| {
                let std = (v / n).sqrt();
                if std > f64::EPSILON * 10.0 { std } else { 1.0 }
            })
            .collect();

        Self { mean, scale }
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (m, s))| (x - m) / s)
            .collect()
    }

    pub fn inverse_transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(z, (m, s))| z * s + m)
            .collect()
    }
}

// ── One-hot encoder ──────────────────────────────────────────────────────────

/// One indicator per seen category, per column. Unknown or missing
/// categories encode as all zeros.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OneHotEncoder {
    pub categories: Vec<Vec<String>>,
}

impl OneHotEncoder {
    pub fn fit(columns: &[Vec<Option<&str>>]) -> Self {
        let categories = columns
            .iter()
            .map(|col| {
                let mut seen: Vec<String> = col.iter().flatten().map(|s| s.to_string()).collect();
                seen.sort();
                seen.dedup();
                seen
            })
            .collect();
        Self { categories }
    }

    pub fn width(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    pub fn transform(&self, row: &[Option<&str>]) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.width());
        for (cats, value) in self.categories.iter().zip(row) {
            for cat in cats {
                out.push(if Some(cat.as_str()) == *value { 1.0 } else { 0.0 });
            }
        }
        out
    }
}

// ── Sales-path preprocessor ──────────────────────────────────────────────────

/// Imputation, scaling and encoding for the classifier inputs.
///
/// Non-finite numerics are treated as missing and replaced with the
/// training median. Missing categories take the training mode while
/// fitting; at transform time they encode as all-zero indicators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesPreprocessor {
    pub medians: Vec<f64>,
    pub modes: Vec<Option<String>>,
    pub scaler: StandardScaler,
    pub encoder: OneHotEncoder,
}

impl SalesPreprocessor {
    pub fn fit(train: &[&SalesFeatures]) -> Self {
        let n_numeric = train.first().map_or(0, |f| f.numeric.len());

        let medians: Vec<f64> = (0..n_numeric)
            .map(|j| {
                let column: Vec<f64> = train.iter().map(|f| f.numeric[j]).collect();
                median(&column).unwrap_or_else(|| {
                    log::warn!("numeric column {j} has no finite training values; imputing 0");
                    0.0
                })
            })
            .collect();

        let n_categorical = train.first().map_or(0, |f| f.categorical().len());
        let modes: Vec<Option<String>> = (0..n_categorical)
            .map(|j| mode(train.iter().map(|f| f.categorical()[j])))
            .collect();

        let imputed: Vec<Vec<f64>> = train.iter().map(|f| impute_numeric(&f.numeric, &medians)).collect();
        let scaler = StandardScaler::fit(&imputed);

        let cat_columns: Vec<Vec<Option<&str>>> = (0..n_categorical)
            .map(|j| {
                train
                    .iter()
                    .map(|f| f.categorical()[j].or(modes[j].as_deref()))
                    .collect()
            })
            .collect();
        let encoder = OneHotEncoder::fit(&cat_columns);

        log::debug!(
            "preprocessor fit: {} numeric, {} one-hot columns over {} rows",
            scaler.width(),
            encoder.width(),
            train.len()
        );

        Self { medians, modes, scaler, encoder }
    }

    pub fn output_width(&self) -> usize {
        self.scaler.width() + self.encoder.width()
    }

    pub fn transform(&self, features: &SalesFeatures) -> Vec<f64> {
        let numeric = impute_numeric(&features.numeric, &self.medians);
        let mut out = self.scaler.transform(&numeric);
        // Categories are imputed only at fit; a missing one encodes as all zeros.
        out.extend(self.encoder.transform(&features.categorical()));
        out
    }
}

fn impute_numeric(row: &[f64], medians: &[f64]) -> Vec<f64> {
    row.iter()
        .zip(medians)
        .map(|(x, m)| if x.is_finite() { *x } else { *m })
        .collect()
}

// ── Split ────────────────────────────────────────────────────────────────────

/// Split row indices into (train, holdout), preserving the label ratio.
///
/// Each class contributes `round(count × holdout_fraction)` rows to the
/// holdout. Both index lists are returned sorted.
pub fn stratified_split(labels: &[u8], holdout_fraction: f64, rng: &mut StageRng) -> (Vec<usize>, Vec<usize>) {
    let mut by_class: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(i);
    }

    let mut train = Vec::with_capacity(labels.len());
    let mut holdout = Vec::new();
    for (_, mut idx) in by_class {
        rng.shuffle(&mut idx);
        let n_holdout = (idx.len() as f64 * holdout_fraction).round() as usize;
        let n_holdout = n_holdout.min(idx.len().saturating_sub(1));
        holdout.extend_from_slice(&idx[..n_holdout]);
        train.extend_from_slice(&idx[n_holdout..]);
    }
    train.sort_unstable();
    holdout.sort_unstable();
    (train, holdout)
}
