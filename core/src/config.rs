use crate::error::{ScoreError, ScoreResult};
use serde::{Deserialize, Serialize};

// ── Seeds ──────────────────────────────────────────────────────────

/// Master seeds for every randomised stage. All default to 42 so that
/// fixtures stay reproducible across runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeedConfig {
    pub split: u64,
    pub forest: u64,
    pub clustering: u64,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self { split: 42, forest: 42, clustering: 42 }
    }
}

// ── Classifier ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
}

impl MaxFeatures {
    /// Number of candidate features to draw per split, never below 1.
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = match self {
            Self::Sqrt => (n_features as f64).sqrt().floor() as usize,
            Self::Log2 => (n_features as f64).log2().floor() as usize,
            Self::All  => n_features,
        };
        n.clamp(1, n_features.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    #[serde(default)]
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
        }
    }
}

// ── Clustering ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    pub k: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub n_init: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self { k: 3, max_iter: 300, tol: 1e-4, n_init: 1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompositeWeight {
    pub feature: String,
    pub weight: f64,
}

/// Feature-importance weights used to rank cluster centroids. The table
/// totals 0.999; weights are normalised when resolved.
pub fn default_composite_weights() -> Vec<CompositeWeight> {
    [
        ("unique_proposals_last_21_days", 0.221),
        ("activity_rate_21days",          0.194),
        ("ANBP_value",                    0.133),
        ("new_policy_count",              0.126),
        ("quotation_to_policy_rate",      0.082),
        ("avg_policy_value",              0.078),
        ("overall_conversion_rate",       0.054),
        ("net_income",                    0.046),
        ("profit_per_policy",             0.033),
        ("proposal_to_quotation_rate",    0.026),
        ("unique_customers",              0.006),
    ]
    .into_iter()
    .map(|(feature, weight)| CompositeWeight { feature: feature.to_string(), weight })
    .collect()
}

// ── Recommendations ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub low_conversion_quantile: f64,
    pub low_activity_quantile: f64,
    pub low_value_quantile: f64,
    pub limited_customers_quantile: f64,
    /// Low-tier agents at or below this tenure get a mentor.
    pub mentorship_max_tenure_months: f64,
    /// Medium-tier gap between 21-day proposals and 3× the 7-day count.
    pub consistency_gap: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            low_conversion_quantile: 0.25,
            low_activity_quantile: 0.25,
            low_value_quantile: 0.5,
            limited_customers_quantile: 0.5,
            mentorship_max_tenure_months: 6.0,
            consistency_gap: 5.0,
        }
    }
}

// ── Pipeline ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub seeds: SeedConfig,
    #[serde(default = "default_holdout_fraction")]
    pub holdout_fraction: f64,
    #[serde(default)]
    pub forest: ForestConfig,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default = "default_composite_weights")]
    pub composite_weights: Vec<CompositeWeight>,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
}

fn default_holdout_fraction() -> f64 {
    0.2
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seeds: SeedConfig::default(),
            holdout_fraction: default_holdout_fraction(),
            forest: ForestConfig::default(),
            clustering: ClusteringConfig::default(),
            composite_weights: default_composite_weights(),
            thresholds: ThresholdConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file. Omitted sections fall back to defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Config with a small forest for use in tests.
    pub fn default_test() -> Self {
        Self {
            forest: ForestConfig { n_trees: 15, ..ForestConfig::default() },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ScoreResult<()> {
        if !(0.0..1.0).contains(&self.holdout_fraction) {
            return Err(ScoreError::InvalidConfig(format!(
                "holdout_fraction must be in [0, 1), got {}",
                self.holdout_fraction
            )));
        }
        if self.forest.n_trees == 0 {
            return Err(ScoreError::InvalidConfig("forest.n_trees must be > 0".into()));
        }
        if self.clustering.k != 3 {
            return Err(ScoreError::InvalidConfig(format!(
                "clustering.k must be 3 (one cluster per tier), got {}",
                self.clustering.k
            )));
        }
        if self.clustering.n_init == 0 {
            return Err(ScoreError::InvalidConfig("clustering.n_init must be > 0".into()));
        }
        if let Some(w) = self.composite_weights.iter().find(|w| !w.weight.is_finite() || w.weight < 0.0) {
            return Err(ScoreError::InvalidConfig(format!(
                "composite weight '{}' must be finite and >= 0, got {}",
                w.feature, w.weight
            )));
        }
        let total: f64 = self.composite_weights.iter().map(|w| w.weight).sum();
        if total <= 0.0 {
            return Err(ScoreError::InvalidConfig(format!(
                "composite weights must have a positive total, got {total}"
            )));
        }
        Ok(())
    }
}
