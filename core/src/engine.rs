//! The batch orchestrator: one training-and-scoring run.
//!
//! EXECUTION ORDER (fixed):
//!   1. Load the training CSV on the sales path (strict dates)
//!   2. Fit the classifier
//!   3. Load the training CSV on the performance path (lenient dates)
//!   4. Fit the cluster model
//!   5. Load the inference CSV on both paths
//!   6. Predict sales, predict tiers, compute thresholds, recommend
//!   7. Left-join sales onto performance by agent_code
//!   8. Write the merged table
//!
//! RULES:
//!   - Fitted models are never mutated after step 2/4.
//!   - All randomness flows through the RngBank seeded from config.
//!   - Any error aborts the run before the output table is written.

use crate::{
    classifier::{ClassificationModel, SalesPrediction, TrainingReport},
    cluster::{ClusterModel, PerformanceAssignment},
    config::PipelineConfig,
    error::ScoreResult,
    features::PerformanceFeatures,
    output::{save_scored, ScoredAgent},
    recommend::{recommend, Thresholds},
    records::{load_records, AgentPeriodRecord, DatePolicy},
    types::{AgentCode, RunId, Tier},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

// ── Public types ─────────────────────────────────────────────────────────────

/// Both fitted models from one training population.
pub struct TrainedModels {
    pub classifier: ClassificationModel,
    pub report: TrainingReport,
    pub clusters: ClusterModel,
}

/// Performance side of the merge: tier plus interventions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerformanceResult {
    pub agent_code: AgentCode,
    pub performance_level: Option<Tier>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub train_rows: usize,
    pub inference_rows: usize,
    pub output_rows: usize,
    pub unmatched_rows: usize,
    pub tier_distribution: BTreeMap<String, usize>,
    pub prediction_distribution: BTreeMap<u8, usize>,
    pub report: TrainingReport,
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct ScoringEngine {
    pub run_id: RunId,
    config: PipelineConfig,
}

impl ScoringEngine {
    pub fn new(run_id: RunId, config: PipelineConfig) -> ScoreResult<Self> {
        config.validate()?;
        Ok(Self { run_id, config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fit both models. `sales` and `performance` are the same training
    /// rows loaded under the two date policies.
    pub fn train(
        &self,
        sales: &[AgentPeriodRecord],
        performance: &[AgentPeriodRecord],
    ) -> ScoreResult<TrainedModels> {
        let (classifier, report) = ClassificationModel::train(sales, &self.config)?;
        let clusters = ClusterModel::fit(performance, &self.config)?;
        Ok(TrainedModels { classifier, report, clusters })
    }

    /// Tier and recommend every performance-path row, with thresholds
    /// taken over the whole batch.
    pub fn assess_performance(
        &self,
        models: &TrainedModels,
        performance: &[AgentPeriodRecord],
    ) -> Vec<PerformanceResult> {
        let assignments: Vec<PerformanceAssignment> = models.clusters.predict_performance(performance);
        let population: Vec<PerformanceFeatures> = assignments.iter().map(|a| a.features.clone()).collect();
        let thresholds = Thresholds::from_population(&population, &self.config.thresholds);

        assignments
            .into_iter()
            .map(|a| PerformanceResult {
                recommendations: recommend(a.tier, &a.features, &thresholds),
                performance_level: a.tier,
                agent_code: a.agent_code,
            })
            .collect()
    }

    /// Score an inference batch against fitted models.
    pub fn score(
        &self,
        models: &TrainedModels,
        sales: &[AgentPeriodRecord],
        performance: &[AgentPeriodRecord],
    ) -> Vec<ScoredAgent> {
        let predictions = models.classifier.predict_sales(sales);
        let assessed = self.assess_performance(models, performance);
        merge_left(&predictions, &assessed)
    }

    /// Full run from files: train, score, write. Nothing is written when
    /// any step fails.
    pub fn run(&self, train_path: &Path, inference_path: &Path, output_path: &Path) -> ScoreResult<RunSummary> {
        log::info!("{}: training on {}", self.run_id, train_path.display());
        let train_sales = load_records(train_path, DatePolicy::Strict)?;
        let train_perf = load_records(train_path, DatePolicy::Lenient)?;
        let models = self.train(&train_sales, &train_perf)?;

        log::info!("{}: scoring {}", self.run_id, inference_path.display());
        let infer_sales = load_records(inference_path, DatePolicy::Strict)?;
        let infer_perf = load_records(inference_path, DatePolicy::Lenient)?;
        let scored = self.score(&models, &infer_sales, &infer_perf);

        save_scored(output_path, &scored)?;

        let summary = summarize(
            self.run_id.clone(),
            train_sales.len(),
            infer_sales.len(),
            &scored,
            models.report,
        );
        log::info!(
            "{}: {} output rows ({} without a tier), tiers {:?}, predictions {:?}",
            summary.run_id,
            summary.output_rows,
            summary.unmatched_rows,
            summary.tier_distribution,
            summary.prediction_distribution,
        );
        Ok(summary)
    }
}

// ── Merge ────────────────────────────────────────────────────────────────────

/// Left join on agent_code. Every sales row is kept, in order, paired
/// with each matching performance row in order; no match leaves the
/// performance side empty.
pub fn merge_left(sales: &[SalesPrediction], performance: &[PerformanceResult]) -> Vec<ScoredAgent> {
    let mut by_code: HashMap<&str, Vec<&PerformanceResult>> = HashMap::new();
    for p in performance {
        by_code.entry(p.agent_code.as_str()).or_default().push(p);
    }

    let mut merged = Vec::with_capacity(sales.len());
    for s in sales {
        match by_code.get(s.agent_code.as_str()) {
            Some(matches) => {
                for p in matches {
                    merged.push(ScoredAgent {
                        agent_code: s.agent_code.clone(),
                        prediction: s.prediction,
                        performance_level: p.performance_level,
                        recommendations: Some(p.recommendations.clone()),
                    });
                }
            }
            None => merged.push(ScoredAgent {
                agent_code: s.agent_code.clone(),
                prediction: s.prediction,
                performance_level: None,
                recommendations: None,
            }),
        }
    }
    merged
}

fn summarize(
    run_id: RunId,
    train_rows: usize,
    inference_rows: usize,
    scored: &[ScoredAgent],
    report: TrainingReport,
) -> RunSummary {
    let mut tier_distribution = BTreeMap::new();
    let mut prediction_distribution = BTreeMap::new();
    let mut unmatched_rows = 0;
    for row in scored {
        match row.performance_level {
            Some(tier) => *tier_distribution.entry(tier.as_str().to_string()).or_insert(0) += 1,
            None => unmatched_rows += 1,
        }
        *prediction_distribution.entry(row.prediction).or_insert(0) += 1;
    }
    RunSummary {
        run_id,
        train_rows,
        inference_rows,
        output_rows: scored.len(),
        unmatched_rows,
        tier_distribution,
        prediction_distribution,
        report,
    }
}
