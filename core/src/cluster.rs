//! Performance tiering: k-means over the performance signature, ranked
//! into Low/Medium/High by a weighted composite score of the centroids.
//!
//! Ranking:
//!   1. Inverse-scale each centroid back to raw units
//!   2. Score = Σ weight × centroid value over the weighted features
//!      (tenure and 7-day proposals are clustered on but carry no weight)
//!   3. Sort clusters by score descending; equal scores keep the lower
//!      cluster index first
//!   4. Rank 1 → High, rank 2 → Medium, rank 3 → Low

use crate::{
    config::{CompositeWeight, PipelineConfig},
    error::{ScoreError, ScoreResult},
    features::{derive_all_performance_features, signature_index, PerformanceFeatures, PERFORMANCE_SIGNATURE},
    kmeans::KMeans,
    preprocess::StandardScaler,
    records::AgentPeriodRecord,
    rng::{RngBank, StageSlot},
    types::{AgentCode, Tier},
};
use serde::{Deserialize, Serialize};

// ── Public types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterScore {
    pub cluster: usize,
    pub composite_score: f64,
    pub rank: usize,
    pub tier: Tier,
}

/// One agent-period row placed in a tier.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceAssignment {
    pub agent_code: AgentCode,
    pub cluster: usize,
    pub tier: Option<Tier>,
    pub features: PerformanceFeatures,
}

/// Fitted scaler, centroids and cluster→tier table. Immutable after `fit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterModel {
    scaler: StandardScaler,
    kmeans: KMeans,
    scores: Vec<ClusterScore>,
}

// ── Fitting ──────────────────────────────────────────────────────────────────

impl ClusterModel {
    pub fn fit(records: &[AgentPeriodRecord], config: &PipelineConfig) -> ScoreResult<Self> {
        let features = derive_all_performance_features(records);
        Self::fit_features(&features, config)
    }

    pub fn fit_features(features: &[PerformanceFeatures], config: &PipelineConfig) -> ScoreResult<Self> {
        let weights = resolve_weights(&config.composite_weights)?;

        let raw: Vec<[f64; 13]> = features.iter().map(PerformanceFeatures::signature).collect();
        let scaler = StandardScaler::fit(&raw);
        let scaled: Vec<Vec<f64>> = raw.iter().map(|r| scaler.transform(r)).collect();

        let bank = RngBank::new(config.seeds);
        let mut rng = bank.for_stage(StageSlot::Clustering);
        let kmeans = KMeans::fit(&scaled, &config.clustering, &mut rng)?;

        let composite: Vec<f64> = kmeans
            .centroids
            .iter()
            .map(|c| composite_score(&scaler.inverse_transform(c), &weights))
            .collect();
        let scores = rank_clusters(&composite)?;

        for s in &scores {
            log::info!(
                "cluster {} → {} (rank {}, composite score {:.4})",
                s.cluster,
                s.tier,
                s.rank,
                s.composite_score
            );
        }

        Ok(Self { scaler, kmeans, scores })
    }

    pub fn scores(&self) -> &[ClusterScore] {
        &self.scores
    }

    pub fn tier_for_cluster(&self, cluster: usize) -> Option<Tier> {
        self.scores.iter().find(|s| s.cluster == cluster).map(|s| s.tier)
    }

    /// Raw-unit centroid for a cluster, in `PERFORMANCE_SIGNATURE` order.
    pub fn centroid(&self, cluster: usize) -> Option<Vec<f64>> {
        self.kmeans.centroids.get(cluster).map(|c| self.scaler.inverse_transform(c))
    }

    // ── Inference ────────────────────────────────────────────────────────────

    pub fn assign(&self, features: PerformanceFeatures) -> PerformanceAssignment {
        let scaled = self.scaler.transform(&features.signature());
        let cluster = self.kmeans.predict(&scaled);
        PerformanceAssignment {
            agent_code: features.agent_code.clone(),
            cluster,
            tier: self.tier_for_cluster(cluster),
            features,
        }
    }

    /// Place every record in a tier, one assignment per row in input order.
    pub fn predict_performance(&self, records: &[AgentPeriodRecord]) -> Vec<PerformanceAssignment> {
        derive_all_performance_features(records)
            .into_iter()
            .map(|f| self.assign(f))
            .collect()
    }
}

// ── Scoring ──────────────────────────────────────────────────────────────────

/// Map configured weights onto signature positions, normalised to sum
/// to 1. Scaling every weight by the same factor leaves ranks unchanged.
pub fn resolve_weights(weights: &[CompositeWeight]) -> ScoreResult<Vec<(usize, f64)>> {
    let total: f64 = weights.iter().map(|w| w.weight).sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(ScoreError::InvalidConfig(format!(
            "composite weights must have a positive total, got {total}"
        )));
    }
    weights
        .iter()
        .map(|w| {
            signature_index(&w.feature).map(|i| (i, w.weight / total)).ok_or_else(|| {
                ScoreError::InvalidConfig(format!(
                    "composite weight '{}' is not a performance feature (expected one of {:?})",
                    w.feature, PERFORMANCE_SIGNATURE
                ))
            })
        })
        .collect()
}

pub fn composite_score(centroid: &[f64], weights: &[(usize, f64)]) -> f64 {
    weights.iter().map(|&(i, w)| centroid[i] * w).sum()
}

/// Rank composite scores descending and attach tiers. Equal scores keep
/// the lower cluster index ahead.
pub fn rank_clusters(composite: &[f64]) -> ScoreResult<Vec<ClusterScore>> {
    let mut order: Vec<usize> = (0..composite.len()).collect();
    order.sort_by(|&a, &b| composite[b].total_cmp(&composite[a]));

    let mut scores: Vec<ClusterScore> = order
        .into_iter()
        .enumerate()
        .map(|(pos, cluster)| {
            let rank = pos + 1;
            Tier::from_rank(rank)
                .map(|tier| ClusterScore { cluster, composite_score: composite[cluster], rank, tier })
                .ok_or_else(|| ScoreError::InvalidConfig(format!("no tier for rank {rank}")))
        })
        .collect::<ScoreResult<_>>()?;
    scores.sort_by_key(|s| s.cluster);
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_form_a_bijection_onto_tiers() {
        let scores = rank_clusters(&[0.5, 2.0, -1.0]).unwrap();
        assert_eq!(scores[0].tier, Tier::Medium);
        assert_eq!(scores[1].tier, Tier::High);
        assert_eq!(scores[2].tier, Tier::Low);
    }

    #[test]
    fn tied_scores_favour_lower_cluster_index() {
        let scores = rank_clusters(&[1.0, 1.0, 0.0]).unwrap();
        assert_eq!(scores[0].rank, 1);
        assert_eq!(scores[1].rank, 2);
        assert_eq!(scores[2].rank, 3);
    }

    #[test]
    fn unknown_weight_feature_rejected() {
        let weights = vec![CompositeWeight { feature: "favourite_colour".into(), weight: 1.0 }];
        assert!(matches!(resolve_weights(&weights), Err(ScoreError::InvalidConfig(_))));
    }

    #[test]
    fn tenure_and_short_window_carry_no_weight() {
        let weights = resolve_weights(&crate::config::default_composite_weights()).unwrap();
        let tenure = signature_index("tenure_months").unwrap();
        let p7 = signature_index("unique_proposals_last_7_days").unwrap();
        assert!(weights.iter().all(|&(i, _)| i != tenure && i != p7));
        assert_eq!(weights.len(), 11);
    }

    #[test]
    fn resolved_weights_are_normalised() {
        let weights = resolve_weights(&crate::config::default_composite_weights()).unwrap();
        let total: f64 = weights.iter().map(|&(_, w)| w).sum();
        assert!((total - 1.0).abs() <= 1e-9, "resolved weights sum to {total}");
        let p21 = signature_index("unique_proposals_last_21_days").unwrap();
        let (_, top) = weights.iter().copied().find(|&(i, _)| i == p21).unwrap();
        assert!((top - 0.221 / 0.999).abs() < 1e-12);
    }

    #[test]
    fn scaling_weights_keeps_ranking() {
        let centroids = [[1.0, 9.0, 0.0], [5.0, 1.0, 2.0], [0.0, 0.0, 8.0]];
        let rank_with = |scale: f64| {
            let weights = vec![(0, 0.5 * scale), (1, 0.3 * scale), (2, 0.199 * scale)];
            let composite: Vec<f64> = centroids.iter().map(|c| composite_score(c, &weights)).collect();
            rank_clusters(&composite).unwrap().into_iter().map(|s| s.tier).collect::<Vec<_>>()
        };
        assert_eq!(rank_with(1.0), rank_with(1.0 / 0.999));
    }
}
