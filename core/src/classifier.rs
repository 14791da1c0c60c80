//! Sales-risk classifier: predicts "no new policy this period".
//!
//! Pipeline:
//!   1. Derive sales-path features for every training record
//!   2. Stratified 80/20 split on the no-sale label
//!   3. Fit imputer + scaler + one-hot on the training split only
//!   4. Fit the random forest on the transformed training split
//!   5. Score the holdout and log accuracy/precision/recall
//!
//! Exposed predictions are inverted: 1 means "predicted to sell".

use crate::{
    config::PipelineConfig,
    error::{ScoreError, ScoreResult},
    features::{derive_all_sales_features, SalesFeatures},
    forest::RandomForest,
    preprocess::{stratified_split, SalesPreprocessor},
    records::AgentPeriodRecord,
    rng::{RngBank, StageSlot},
    types::AgentCode,
};
use serde::{Deserialize, Serialize};

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SalesPrediction {
    pub agent_code: AgentCode,
    /// 1 = predicted to sell, 0 = predicted to make no sale.
    pub prediction: u8,
}

/// Holdout metrics for the no-sale class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingReport {
    pub train_rows: usize,
    pub holdout_rows: usize,
    pub no_sale_share: f64,
    pub holdout_accuracy: f64,
    pub holdout_precision: f64,
    pub holdout_recall: f64,
}

/// Fitted preprocessor and forest. Immutable after `train`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationModel {
    preprocessor: SalesPreprocessor,
    forest: RandomForest,
}

// ── Training ─────────────────────────────────────────────────────────────────

impl ClassificationModel {
    pub fn train(records: &[AgentPeriodRecord], config: &PipelineConfig) -> ScoreResult<(Self, TrainingReport)> {
        if records.is_empty() {
            return Err(ScoreError::InsufficientData { what: "classifier", needed: 1, got: 0 });
        }

        let features = derive_all_sales_features(records);
        let labels: Vec<u8> = features.iter().map(|f| f.label).collect();

        let bank = RngBank::new(config.seeds);
        let mut split_rng = bank.for_stage(StageSlot::Split);
        let (train_idx, holdout_idx) = stratified_split(&labels, config.holdout_fraction, &mut split_rng);

        let train_rows: Vec<&SalesFeatures> = train_idx.iter().map(|&i| &features[i]).collect();
        let preprocessor = SalesPreprocessor::fit(&train_rows);

        let x_train: Vec<Vec<f64>> = train_rows.iter().map(|f| preprocessor.transform(f)).collect();
        let y_train: Vec<u8> = train_idx.iter().map(|&i| labels[i]).collect();

        let mut forest_rng = bank.for_stage(StageSlot::Forest);
        let forest = RandomForest::fit(&x_train, &y_train, &config.forest, &mut forest_rng)?;

        let model = Self { preprocessor, forest };
        let report = model.evaluate(&features, &labels, &train_idx, &holdout_idx);

        log::info!(
            "classifier trained: {} train / {} holdout rows, no-sale share {:.3}, holdout accuracy {:.3} (precision {:.3}, recall {:.3})",
            report.train_rows,
            report.holdout_rows,
            report.no_sale_share,
            report.holdout_accuracy,
            report.holdout_precision,
            report.holdout_recall,
        );

        Ok((model, report))
    }

    fn evaluate(
        &self,
        features: &[SalesFeatures],
        labels: &[u8],
        train_idx: &[usize],
        holdout_idx: &[usize],
    ) -> TrainingReport {
        let (mut tp, mut fp, mut fn_, mut correct) = (0usize, 0usize, 0usize, 0usize);
        for &i in holdout_idx {
            let predicted = self.predict_no_sale(&features[i]);
            let actual = labels[i];
            if predicted == actual {
                correct += 1;
            }
            match (predicted, actual) {
                (1, 1) => tp += 1,
                (1, 0) => fp += 1,
                (0, 1) => fn_ += 1,
                _ => {}
            }
        }

        let share = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };
        let no_sale = labels.iter().filter(|&&l| l == 1).count();

        TrainingReport {
            train_rows: train_idx.len(),
            holdout_rows: holdout_idx.len(),
            no_sale_share: share(no_sale, labels.len()),
            holdout_accuracy: share(correct, holdout_idx.len()),
            holdout_precision: share(tp, tp + fp),
            holdout_recall: share(tp, tp + fn_),
        }
    }

    // ── Inference ────────────────────────────────────────────────────────────

    /// Raw model output: 1 when the row is predicted to make no sale.
    pub fn predict_no_sale(&self, features: &SalesFeatures) -> u8 {
        let row = self.preprocessor.transform(features);
        self.forest.predict(&row)
    }

    /// Probability of "no sale" for one feature row.
    pub fn no_sale_probability(&self, features: &SalesFeatures) -> f64 {
        let row = self.preprocessor.transform(features);
        self.forest.predict_proba(&row)
    }

    /// Score every record, one prediction per row in input order.
    pub fn predict_sales(&self, records: &[AgentPeriodRecord]) -> Vec<SalesPrediction> {
        derive_all_sales_features(records)
            .into_iter()
            .map(|f| SalesPrediction {
                prediction: 1 - self.predict_no_sale(&f),
                agent_code: f.agent_code,
            })
            .collect()
    }

    pub fn n_trees(&self) -> usize {
        self.forest.n_trees()
    }

    pub fn input_width(&self) -> usize {
        self.preprocessor.output_width()
    }
}
