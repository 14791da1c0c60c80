//! Raw agent-period records: CSV loading, header validation and date parsing.
//!
//! RULE: nothing downstream sees a raw string date. Every record that
//! leaves this module has its calendar fields parsed, or the load failed.

use crate::{
    error::{ScoreError, ScoreResult},
    types::AgentCode,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::{fs::File, io, path::Path};

/// Every column the loader requires, in the order of the upstream export.
pub const REQUIRED_COLUMNS: [&str; 22] = [
    "agent_code",
    "agent_age",
    "agent_join_month",
    "first_policy_sold_month",
    "year_month",
    "unique_proposal",
    "unique_quotations",
    "new_policy_count",
    "ANBP_value",
    "net_income",
    "number_of_policy_holders",
    "number_of_cash_payment_policies",
    "unique_customers",
    "unique_proposals_last_7_days",
    "unique_proposals_last_15_days",
    "unique_proposals_last_21_days",
    "unique_quotations_last_7_days",
    "unique_quotations_last_15_days",
    "unique_quotations_last_21_days",
    "unique_customers_last_7_days",
    "unique_customers_last_15_days",
    "unique_customers_last_21_days",
];

/// How calendar columns are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePolicy {
    /// `MM/DD/YYYY` only. Used by the sales-prediction path.
    Strict,
    /// `MM/DD/YYYY`, `YYYY-MM-DD`, `YYYY/MM/DD` or `YYYY-MM`.
    /// Used by the performance-clustering path.
    Lenient,
}

const STRICT_FORMAT: &str = "%m/%d/%Y";
const LENIENT_FORMATS: [&str; 3] = ["%m/%d/%Y", "%Y-%m-%d", "%Y/%m/%d"];

impl DatePolicy {
    pub fn parse(&self, raw: &str) -> Option<NaiveDate> {
        let raw = raw.trim();
        match self {
            Self::Strict => NaiveDate::parse_from_str(raw, STRICT_FORMAT).ok(),
            Self::Lenient => LENIENT_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .or_else(|| NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d").ok()),
        }
    }
}

/// One agent's activity metrics for one reporting month.
///
/// Numeric fields are `f64`; an empty CSV cell is `NaN` and is
/// resolved later by the feature path that consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentPeriodRecord {
    pub agent_code: AgentCode,
    pub agent_age: f64,
    pub agent_join_month: NaiveDate,
    pub first_policy_sold_month: Option<NaiveDate>,
    pub year_month: NaiveDate,
    pub unique_proposal: f64,
    pub unique_quotations: f64,
    pub new_policy_count: f64,
    pub anbp_value: f64,
    pub net_income: f64,
    pub number_of_policy_holders: f64,
    pub number_of_cash_payment_policies: f64,
    pub unique_customers: f64,
    pub unique_proposals_last_7_days: f64,
    pub unique_proposals_last_15_days: f64,
    pub unique_proposals_last_21_days: f64,
    pub unique_quotations_last_7_days: f64,
    pub unique_quotations_last_15_days: f64,
    pub unique_quotations_last_21_days: f64,
    pub unique_customers_last_7_days: f64,
    pub unique_customers_last_15_days: f64,
    pub unique_customers_last_21_days: f64,
}

impl AgentPeriodRecord {
    /// A mid-performing record with round numbers, for use in tests.
    /// Joined 2023-01, reporting 2024-01, first sale 2023-03.
    pub fn default_test(agent_code: &str) -> Self {
        let date = |y, m| NaiveDate::from_ymd_opt(y, m, 1).unwrap_or_default();
        Self {
            agent_code: agent_code.to_string(),
            agent_age: 30.0,
            agent_join_month: date(2023, 1),
            first_policy_sold_month: Some(date(2023, 3)),
            year_month: date(2024, 1),
            unique_proposal: 20.0,
            unique_quotations: 10.0,
            new_policy_count: 4.0,
            anbp_value: 40_000.0,
            net_income: 8_000.0,
            number_of_policy_holders: 4.0,
            number_of_cash_payment_policies: 1.0,
            unique_customers: 12.0,
            unique_proposals_last_7_days: 3.0,
            unique_proposals_last_15_days: 7.0,
            unique_proposals_last_21_days: 10.0,
            unique_quotations_last_7_days: 2.0,
            unique_quotations_last_15_days: 4.0,
            unique_quotations_last_21_days: 6.0,
            unique_customers_last_7_days: 3.0,
            unique_customers_last_15_days: 6.0,
            unique_customers_last_21_days: 8.0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    agent_code: String,
    agent_age: Option<f64>,
    agent_join_month: Option<String>,
    first_policy_sold_month: Option<String>,
    year_month: Option<String>,
    unique_proposal: Option<f64>,
    unique_quotations: Option<f64>,
    new_policy_count: Option<f64>,
    #[serde(rename = "ANBP_value")]
    anbp_value: Option<f64>,
    net_income: Option<f64>,
    number_of_policy_holders: Option<f64>,
    number_of_cash_payment_policies: Option<f64>,
    unique_customers: Option<f64>,
    unique_proposals_last_7_days: Option<f64>,
    unique_proposals_last_15_days: Option<f64>,
    unique_proposals_last_21_days: Option<f64>,
    unique_quotations_last_7_days: Option<f64>,
    unique_quotations_last_15_days: Option<f64>,
    unique_quotations_last_21_days: Option<f64>,
    unique_customers_last_7_days: Option<f64>,
    unique_customers_last_15_days: Option<f64>,
    unique_customers_last_21_days: Option<f64>,
}

fn num(v: Option<f64>) -> f64 {
    v.unwrap_or(f64::NAN)
}

fn required_date(
    raw: Option<String>,
    row: usize,
    column: &str,
    policy: DatePolicy,
) -> ScoreResult<NaiveDate> {
    let value = raw.unwrap_or_default();
    policy.parse(&value).ok_or_else(|| ScoreError::InvalidDate {
        row,
        column: column.to_string(),
        value,
    })
}

fn optional_date(
    raw: Option<String>,
    row: usize,
    column: &str,
    policy: DatePolicy,
) -> ScoreResult<Option<NaiveDate>> {
    match raw {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => policy.parse(&v).map(Some).ok_or_else(|| ScoreError::InvalidDate {
            row,
            column: column.to_string(),
            value: v,
        }),
    }
}

impl RawRecord {
    fn into_record(self, row: usize, policy: DatePolicy) -> ScoreResult<AgentPeriodRecord> {
        Ok(AgentPeriodRecord {
            agent_join_month: required_date(self.agent_join_month, row, "agent_join_month", policy)?,
            first_policy_sold_month: optional_date(
                self.first_policy_sold_month,
                row,
                "first_policy_sold_month",
                policy,
            )?,
            year_month: required_date(self.year_month, row, "year_month", policy)?,
            agent_code: self.agent_code,
            agent_age: num(self.agent_age),
            unique_proposal: num(self.unique_proposal),
            unique_quotations: num(self.unique_quotations),
            new_policy_count: num(self.new_policy_count),
            anbp_value: num(self.anbp_value),
            net_income: num(self.net_income),
            number_of_policy_holders: num(self.number_of_policy_holders),
            number_of_cash_payment_policies: num(self.number_of_cash_payment_policies),
            unique_customers: num(self.unique_customers),
            unique_proposals_last_7_days: num(self.unique_proposals_last_7_days),
            unique_proposals_last_15_days: num(self.unique_proposals_last_15_days),
            unique_proposals_last_21_days: num(self.unique_proposals_last_21_days),
            unique_quotations_last_7_days: num(self.unique_quotations_last_7_days),
            unique_quotations_last_15_days: num(self.unique_quotations_last_15_days),
            unique_quotations_last_21_days: num(self.unique_quotations_last_21_days),
            unique_customers_last_7_days: num(self.unique_customers_last_7_days),
            unique_customers_last_15_days: num(self.unique_customers_last_15_days),
            unique_customers_last_21_days: num(self.unique_customers_last_21_days),
        })
    }
}

/// Fail with `InputSchema` naming the first required column absent from `headers`.
pub fn check_columns(headers: &csv::StringRecord, required: &[&str]) -> ScoreResult<()> {
    for column in required {
        if !headers.iter().any(|h| h.trim() == *column) {
            return Err(ScoreError::InputSchema { column: column.to_string() });
        }
    }
    Ok(())
}

/// Read agent-period records from any CSV source.
pub fn read_records<R: io::Read>(source: R, policy: DatePolicy) -> ScoreResult<Vec<AgentPeriodRecord>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);
    check_columns(reader.headers()?, &REQUIRED_COLUMNS)?;

    let mut records = Vec::new();
    for (i, row) in reader.deserialize::<RawRecord>().enumerate() {
        let raw = row?;
        records.push(raw.into_record(i + 1, policy)?);
    }
    log::debug!("loaded {} agent-period records ({policy:?} dates)", records.len());
    Ok(records)
}

/// Read agent-period records from a CSV file on disk.
pub fn load_records(path: &Path, policy: DatePolicy) -> ScoreResult<Vec<AgentPeriodRecord>> {
    let file = File::open(path)?;
    let records = read_records(file, policy)?;
    log::info!("{}: {} rows", path.display(), records.len());
    Ok(records)
}
