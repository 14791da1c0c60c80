//! Rule-based interventions per performance tier.
//!
//! Pure functions: the same tier, metrics and thresholds always give the
//! same ordered list. Thresholds are computed once per batch from the
//! full scored population.

use crate::{
    config::ThresholdConfig,
    features::PerformanceFeatures,
    preprocess::quantile,
    types::Tier,
};
use serde::{Deserialize, Serialize};

// ── Recommendation texts ─────────────────────────────────────────────────────

pub const SALES_TRAINING: &str =
    "Sales Training: Focus on improving conversion techniques and objection handling.";
pub const ACTIVITY_MANAGEMENT: &str =
    "Activity Management: Set daily prospecting targets and provide closer supervision.";
pub const MENTORSHIP: &str =
    "Mentorship Program: Pair with experienced agent for shadowing and guidance.";
pub const WEEKLY_REVIEW: &str =
    "Weekly Performance Review: Schedule weekly one-on-one sessions to review metrics and provide feedback.";
pub const PRODUCT_KNOWLEDGE: &str = "Product Knowledge: Complete refresher course on core products.";

pub const UPSELLING: &str = "Upselling Training: Focus on identifying opportunities for premium products.";
pub const CONSISTENCY: &str =
    "Consistency Program: Implement daily activity tracking and regular scheduling.";
pub const NETWORKING: &str =
    "Networking Strategy: Provide resources for expanding customer base and referrals.";
pub const SPECIALIZED_TRAINING: &str =
    "Specialized Product Training: Advanced training on high-margin products.";
pub const GROUP_COACHING: &str =
    "Monthly Group Coaching: Join peer group sessions to share best practices.";

pub const HIGH_TIER_PROGRAM: [&str; 5] = [
    "Client Retention Program: Implement a structured follow-up system for existing clients.",
    "Leadership Development: Prepare for team leadership and mentoring roles.",
    "Advanced Sales Techniques: Training on complex products and high-net-worth client acquisition.",
    "Recognition Program: Highlight achievements in company communications and events.",
    "Career Path Planning: Set long-term goals and development plan for advancement.",
];

// ── Thresholds ───────────────────────────────────────────────────────────────

/// Population cut-offs the rules compare against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thresholds {
    pub low_conversion: f64,
    pub low_activity: f64,
    pub low_policy_value: f64,
    pub limited_customers: f64,
    pub mentorship_max_tenure_months: f64,
    pub consistency_gap: f64,
}

impl Thresholds {
    /// Compute cut-offs over the whole population. An empty population
    /// yields NaN cut-offs, against which no conditional rule fires.
    pub fn from_population(population: &[PerformanceFeatures], config: &ThresholdConfig) -> Self {
        let thresholds = Self {
            low_conversion: column_quantile(
                population,
                |f| f.overall_conversion_rate,
                config.low_conversion_quantile,
            ),
            low_activity: column_quantile(population, |f| f.activity_rate_21days, config.low_activity_quantile),
            low_policy_value: column_quantile(population, |f| f.avg_policy_value, config.low_value_quantile),
            limited_customers: column_quantile(
                population,
                |f| f.unique_customers,
                config.limited_customers_quantile,
            ),
            mentorship_max_tenure_months: config.mentorship_max_tenure_months,
            consistency_gap: config.consistency_gap,
        };
        log::debug!("recommendation thresholds over {} rows: {thresholds:?}", population.len());
        thresholds
    }
}

fn column_quantile(
    population: &[PerformanceFeatures],
    metric: impl Fn(&PerformanceFeatures) -> f64,
    q: f64,
) -> f64 {
    let values: Vec<f64> = population.iter().map(metric).collect();
    quantile(&values, q).unwrap_or(f64::NAN)
}

// ── Rules ────────────────────────────────────────────────────────────────────

/// Ordered interventions for one agent. No tier → no recommendations.
pub fn recommend(tier: Option<Tier>, f: &PerformanceFeatures, t: &Thresholds) -> Vec<String> {
    let mut recs: Vec<&str> = Vec::new();

    match tier {
        Some(Tier::Low) => {
            if f.overall_conversion_rate < t.low_conversion {
                recs.push(SALES_TRAINING);
            }
            if f.activity_rate_21days < t.low_activity {
                recs.push(ACTIVITY_MANAGEMENT);
            }
            if f.tenure_months <= t.mentorship_max_tenure_months {
                recs.push(MENTORSHIP);
            }
            recs.extend([WEEKLY_REVIEW, PRODUCT_KNOWLEDGE]);
        }
        Some(Tier::Medium) => {
            if f.avg_policy_value < t.low_policy_value {
                recs.push(UPSELLING);
            }
            let gap = (f.unique_proposals_last_21_days - 3.0 * f.unique_proposals_last_7_days).abs();
            if gap > t.consistency_gap {
                recs.push(CONSISTENCY);
            }
            if f.unique_customers < t.limited_customers {
                recs.push(NETWORKING);
            }
            recs.extend([SPECIALIZED_TRAINING, GROUP_COACHING]);
        }
        Some(Tier::High) => recs.extend(HIGH_TIER_PROGRAM),
        None => {}
    }

    recs.into_iter().map(str::to_string).collect()
}
