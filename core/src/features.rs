//! Feature derivation from raw agent-period records.
//!
//! Two call paths consume the same records and derive overlapping but
//! deliberately different metrics:
//!
//!   - Sales path (classifier): ratios guarded with `ratio_or_zero`,
//!     `months_to_first_sale` uses the 999 sentinel for "never sold".
//!   - Performance path (clustering): ratios divide by 1 when the
//!     denominator is 0 (`ratio_or_unit_denominator`), and
//!     `months_to_first_sale` is clipped at 0 instead of sentinelled.
//!
//! The two conventions produce different numbers for the same row and
//! must stay separate. See DESIGN.md.

use crate::{records::AgentPeriodRecord, types::AgentCode};
use chrono::{Datelike, NaiveDate};

/// Sentinel for "has not made a first sale yet".
pub const NEVER_SOLD_SENTINEL: f64 = 999.0;

// ── Shared helpers ───────────────────────────────────────────────────────────

/// Whole calendar months from `earlier` to `later`. Day of month is ignored.
pub fn month_diff(later: NaiveDate, earlier: NaiveDate) -> i32 {
    (later.year() - earlier.year()) * 12 + (later.month() as i32 - earlier.month() as i32)
}

/// `numerator / denominator` when the denominator is positive, else 0.
/// A missing denominator also yields 0.
pub fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// `numerator / denominator`, with a zero denominator replaced by 1.
/// Missing values propagate.
pub fn ratio_or_unit_denominator(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        numerator
    } else {
        numerator / denominator
    }
}

/// Right-inclusive binning: value `v` falls in bin `i` when
/// `edges[i] < v <= edges[i + 1]`. Outside the edges, or NaN, is `None`.
fn bin<'a>(value: f64, edges: &[f64], labels: &[&'a str]) -> Option<&'a str> {
    debug_assert_eq!(edges.len(), labels.len() + 1);
    edges
        .windows(2)
        .position(|w| value > w[0] && value <= w[1])
        .map(|i| labels[i])
}

pub const AGE_GROUP_EDGES: [f64; 6] = [0.0, 25.0, 35.0, 45.0, 55.0, 100.0];
pub const AGE_GROUP_LABELS: [&str; 5] = ["<25", "25-35", "35-45", "45-55", "55+"];

pub const EXPERIENCE_GROUP_EDGES: [f64; 6] = [-1.0, 3.0, 6.0, 12.0, 24.0, 100.0];
pub const EXPERIENCE_GROUP_LABELS: [&str; 5] = ["<3mo", "3-6mo", "6-12mo", "1-2yr", ">2yr"];

pub fn age_group(age: f64) -> Option<&'static str> {
    bin(age, &AGE_GROUP_EDGES, &AGE_GROUP_LABELS)
}

pub fn experience_group(months: f64) -> Option<&'static str> {
    bin(months, &EXPERIENCE_GROUP_EDGES, &EXPERIENCE_GROUP_LABELS)
}

// ── Sales path ───────────────────────────────────────────────────────────────

/// Numeric classifier inputs, in the column order the model is trained on.
pub const SALES_NUMERIC_FEATURES: [&str; 38] = [
    "agent_age",
    "experience_months",
    "months_to_first_sale",
    "has_made_first_sale",
    "unique_proposals_last_7_days",
    "unique_proposals_last_15_days",
    "unique_proposals_last_21_days",
    "unique_proposal",
    "unique_quotations_last_7_days",
    "unique_quotations_last_15_days",
    "unique_quotations_last_21_days",
    "unique_quotations",
    "unique_customers_last_7_days",
    "unique_customers_last_15_days",
    "unique_customers_last_21_days",
    "unique_customers",
    "new_policy_count",
    "ANBP_value",
    "net_income",
    "number_of_policy_holders",
    "number_of_cash_payment_policies",
    "proposal_to_quotation_rate",
    "quotation_to_policy_rate",
    "avg_policy_value",
    "avg_income_per_policy",
    "proposal_activity_7d",
    "proposal_activity_15d",
    "proposal_activity_21d",
    "proposal_trend_short",
    "proposal_trend_med",
    "cash_payment_ratio",
    "proposals_per_customer",
    "quotations_per_customer",
    "recent_customer_ratio",
    "policyholder_ratio",
    "proposal_decay_7_to_15",
    "quotation_decay_7_to_15",
    "month",
];

pub const SALES_CATEGORICAL_FEATURES: [&str; 2] = ["age_group", "experience_group"];

/// Derived metrics for the sales-prediction path.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesFeatures {
    pub agent_code: AgentCode,
    /// 1 when the row recorded no new policy ("no sale"), else 0.
    pub label: u8,

    pub experience_months: f64,
    pub months_to_first_sale: f64,
    pub has_made_first_sale: f64,
    pub proposal_to_quotation_rate: f64,
    pub quotation_to_policy_rate: f64,
    pub avg_policy_value: f64,
    pub avg_income_per_policy: f64,
    pub proposal_activity_7d: f64,
    pub proposal_activity_15d: f64,
    pub proposal_activity_21d: f64,
    pub proposal_trend_short: f64,
    pub proposal_trend_med: f64,
    pub cash_payment_ratio: f64,
    pub proposals_per_customer: f64,
    pub quotations_per_customer: f64,
    pub recent_customer_ratio: f64,
    pub policyholder_ratio: f64,
    pub proposal_decay_7_to_15: f64,
    pub quotation_decay_7_to_15: f64,
    pub month: f64,
    pub year: f64,

    pub age_group: Option<&'static str>,
    pub experience_group: Option<&'static str>,

    /// The full numeric vector in `SALES_NUMERIC_FEATURES` order.
    pub numeric: Vec<f64>,
}

impl SalesFeatures {
    pub fn categorical(&self) -> [Option<&'static str>; 2] {
        [self.age_group, self.experience_group]
    }
}

/// Derive the sales-path feature set for one record.
pub fn derive_sales_features(r: &AgentPeriodRecord) -> SalesFeatures {
    let experience_months = month_diff(r.year_month, r.agent_join_month) as f64;
    let months_to_first_sale = match r.first_policy_sold_month {
        Some(sold) => month_diff(sold, r.agent_join_month) as f64,
        None => NEVER_SOLD_SENTINEL,
    };
    let has_made_first_sale = if r.first_policy_sold_month.is_some() { 1.0 } else { 0.0 };

    let proposal_to_quotation_rate = ratio_or_zero(r.unique_quotations, r.unique_proposal);
    let quotation_to_policy_rate = ratio_or_zero(r.new_policy_count, r.unique_quotations);
    let avg_policy_value = ratio_or_zero(r.anbp_value, r.new_policy_count);
    let avg_income_per_policy = ratio_or_zero(r.net_income, r.new_policy_count);

    let proposal_activity_7d = r.unique_proposals_last_7_days / 7.0;
    let proposal_activity_15d = r.unique_proposals_last_15_days / 15.0;
    let proposal_activity_21d = r.unique_proposals_last_21_days / 21.0;
    let proposal_trend_short = proposal_activity_7d - proposal_activity_15d;
    let proposal_trend_med = proposal_activity_15d - proposal_activity_21d;

    let cash_payment_ratio = ratio_or_zero(r.number_of_cash_payment_policies, r.new_policy_count);
    let proposals_per_customer = ratio_or_zero(r.unique_proposal, r.unique_customers);
    let quotations_per_customer = ratio_or_zero(r.unique_quotations, r.unique_customers);
    let recent_customer_ratio = ratio_or_zero(r.unique_customers_last_7_days, r.unique_customers);
    let policyholder_ratio = ratio_or_zero(r.number_of_policy_holders, r.new_policy_count);

    let proposal_decay_7_to_15 = if r.unique_proposals_last_15_days > 0.0 {
        (r.unique_proposals_last_7_days / 7.0) / (r.unique_proposals_last_15_days / 15.0)
    } else {
        0.0
    };
    let quotation_decay_7_to_15 = if r.unique_quotations_last_15_days > 0.0 {
        (r.unique_quotations_last_7_days / 7.0) / (r.unique_quotations_last_15_days / 15.0)
    } else {
        0.0
    };

    let month = r.year_month.month() as f64;
    let year = r.year_month.year() as f64;

    let numeric = vec![
        r.agent_age,
        experience_months,
        months_to_first_sale,
        has_made_first_sale,
        r.unique_proposals_last_7_days,
        r.unique_proposals_last_15_days,
        r.unique_proposals_last_21_days,
        r.unique_proposal,
        r.unique_quotations_last_7_days,
        r.unique_quotations_last_15_days,
        r.unique_quotations_last_21_days,
        r.unique_quotations,
        r.unique_customers_last_7_days,
        r.unique_customers_last_15_days,
        r.unique_customers_last_21_days,
        r.unique_customers,
        r.new_policy_count,
        r.anbp_value,
        r.net_income,
        r.number_of_policy_holders,
        r.number_of_cash_payment_policies,
        proposal_to_quotation_rate,
        quotation_to_policy_rate,
        avg_policy_value,
        avg_income_per_policy,
        proposal_activity_7d,
        proposal_activity_15d,
        proposal_activity_21d,
        proposal_trend_short,
        proposal_trend_med,
        cash_payment_ratio,
        proposals_per_customer,
        quotations_per_customer,
        recent_customer_ratio,
        policyholder_ratio,
        proposal_decay_7_to_15,
        quotation_decay_7_to_15,
        month,
    ];
    debug_assert_eq!(numeric.len(), SALES_NUMERIC_FEATURES.len());

    SalesFeatures {
        agent_code: r.agent_code.clone(),
        label: u8::from(r.new_policy_count == 0.0),
        experience_months,
        months_to_first_sale,
        has_made_first_sale,
        proposal_to_quotation_rate,
        quotation_to_policy_rate,
        avg_policy_value,
        avg_income_per_policy,
        proposal_activity_7d,
        proposal_activity_15d,
        proposal_activity_21d,
        proposal_trend_short,
        proposal_trend_med,
        cash_payment_ratio,
        proposals_per_customer,
        quotations_per_customer,
        recent_customer_ratio,
        policyholder_ratio,
        proposal_decay_7_to_15,
        quotation_decay_7_to_15,
        month,
        year,
        age_group: age_group(r.agent_age),
        experience_group: experience_group(experience_months),
        numeric,
    }
}

pub fn derive_all_sales_features(records: &[AgentPeriodRecord]) -> Vec<SalesFeatures> {
    records.iter().map(derive_sales_features).collect()
}

// ── Performance path ─────────────────────────────────────────────────────────

/// The clustering signature. Index constants below address this array.
pub const PERFORMANCE_SIGNATURE: [&str; 13] = [
    "new_policy_count",
    "ANBP_value",
    "net_income",
    "avg_policy_value",
    "profit_per_policy",
    "overall_conversion_rate",
    "proposal_to_quotation_rate",
    "quotation_to_policy_rate",
    "unique_proposals_last_21_days",
    "unique_proposals_last_7_days",
    "tenure_months",
    "activity_rate_21days",
    "unique_customers",
];

/// Position of a performance feature in `PERFORMANCE_SIGNATURE`.
pub fn signature_index(name: &str) -> Option<usize> {
    PERFORMANCE_SIGNATURE.iter().position(|f| *f == name)
}

/// Derived metrics for the performance-clustering path.
///
/// Signature fields are already missing-filled with 0.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceFeatures {
    pub agent_code: AgentCode,

    pub new_policy_count: f64,
    pub anbp_value: f64,
    pub net_income: f64,
    pub avg_policy_value: f64,
    pub profit_per_policy: f64,
    pub overall_conversion_rate: f64,
    pub proposal_to_quotation_rate: f64,
    pub quotation_to_policy_rate: f64,
    pub unique_proposals_last_21_days: f64,
    pub unique_proposals_last_7_days: f64,
    pub tenure_months: f64,
    pub activity_rate_21days: f64,
    pub unique_customers: f64,

    // Computed alongside the signature but not clustered on.
    pub months_to_first_sale: Option<f64>,
    pub activity_rate_7days: f64,
    pub activity_rate_15days: f64,
    pub cash_payment_percentage: f64,
}

impl PerformanceFeatures {
    pub fn signature(&self) -> [f64; 13] {
        [
            self.new_policy_count,
            self.anbp_value,
            self.net_income,
            self.avg_policy_value,
            self.profit_per_policy,
            self.overall_conversion_rate,
            self.proposal_to_quotation_rate,
            self.quotation_to_policy_rate,
            self.unique_proposals_last_21_days,
            self.unique_proposals_last_7_days,
            self.tenure_months,
            self.activity_rate_21days,
            self.unique_customers,
        ]
    }
}

fn fill_zero(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v }
}

/// Derive the performance-path feature set for one record.
pub fn derive_performance_features(r: &AgentPeriodRecord) -> PerformanceFeatures {
    let tenure_months = month_diff(r.year_month, r.agent_join_month) as f64;
    let months_to_first_sale = r
        .first_policy_sold_month
        .map(|sold| month_diff(sold, r.agent_join_month).max(0) as f64);

    PerformanceFeatures {
        agent_code: r.agent_code.clone(),
        new_policy_count: fill_zero(r.new_policy_count),
        anbp_value: fill_zero(r.anbp_value),
        net_income: fill_zero(r.net_income),
        avg_policy_value: fill_zero(ratio_or_unit_denominator(r.anbp_value, r.new_policy_count)),
        profit_per_policy: fill_zero(ratio_or_unit_denominator(r.net_income, r.new_policy_count)),
        overall_conversion_rate: fill_zero(ratio_or_unit_denominator(r.new_policy_count, r.unique_proposal)),
        proposal_to_quotation_rate: fill_zero(ratio_or_unit_denominator(r.unique_quotations, r.unique_proposal)),
        quotation_to_policy_rate: fill_zero(ratio_or_unit_denominator(r.new_policy_count, r.unique_quotations)),
        unique_proposals_last_21_days: fill_zero(r.unique_proposals_last_21_days),
        unique_proposals_last_7_days: fill_zero(r.unique_proposals_last_7_days),
        tenure_months,
        activity_rate_21days: fill_zero(r.unique_proposals_last_21_days / 21.0),
        unique_customers: fill_zero(r.unique_customers),
        months_to_first_sale,
        activity_rate_7days: r.unique_proposals_last_7_days / 7.0,
        activity_rate_15days: r.unique_proposals_last_15_days / 15.0,
        cash_payment_percentage: ratio_or_unit_denominator(
            r.number_of_cash_payment_policies,
            r.number_of_policy_holders,
        ) * 100.0,
    }
}

pub fn derive_all_performance_features(records: &[AgentPeriodRecord]) -> Vec<PerformanceFeatures> {
    records.iter().map(derive_performance_features).collect()
}
