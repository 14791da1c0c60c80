#![allow(dead_code)]

use agentscore_core::{records::AgentPeriodRecord, rng::StageRng};
use chrono::{Datelike, NaiveDate};
use std::path::PathBuf;

/// Three archetypes of agent in equal numbers: idle, steady, star.
/// Idle agents never sell, so the no-sale label is present in the data.
pub fn population(n: usize, seed: u64) -> Vec<AgentPeriodRecord> {
    let mut rng = StageRng::new(seed, 99);
    (0..n)
        .map(|i| {
            let mut r = AgentPeriodRecord::default_test(&format!("AG{i:04}"));
            let noise = rng.next_f64();
            match i % 3 {
                0 => {
                    r.unique_proposal = (2.0 + noise * 3.0).round();
                    r.unique_quotations = 1.0;
                    r.new_policy_count = 0.0;
                    r.anbp_value = 0.0;
                    r.net_income = 0.0;
                    r.number_of_policy_holders = 0.0;
                    r.number_of_cash_payment_policies = 0.0;
                    r.unique_customers = 2.0;
                    r.unique_proposals_last_7_days = 0.0;
                    r.unique_proposals_last_15_days = 1.0;
                    r.unique_proposals_last_21_days = 1.0;
                    r.first_policy_sold_month = None;
                    r.agent_join_month = NaiveDate::from_ymd_opt(2023, 11, 1).unwrap();
                }
                1 => {
                    r.unique_proposal = (18.0 + noise * 4.0).round();
                    r.anbp_value = 38_000.0 + noise * 4_000.0;
                }
                _ => {
                    r.unique_proposal = (60.0 + noise * 10.0).round();
                    r.unique_quotations = 40.0;
                    r.new_policy_count = 20.0;
                    r.anbp_value = 400_000.0 + noise * 50_000.0;
                    r.net_income = 90_000.0;
                    r.number_of_policy_holders = 20.0;
                    r.number_of_cash_payment_policies = 5.0;
                    r.unique_customers = 45.0;
                    r.unique_proposals_last_7_days = 12.0;
                    r.unique_proposals_last_15_days = 25.0;
                    r.unique_proposals_last_21_days = 36.0;
                    r.agent_age = 48.0;
                    r.agent_join_month = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
                }
            }
            r
        })
        .collect()
}

fn date(d: NaiveDate) -> String {
    format!("{:02}/{:02}/{}", d.month(), d.day(), d.year())
}

/// Render records as the upstream CSV export, dates as MM/DD/YYYY.
pub fn to_csv(records: &[AgentPeriodRecord]) -> String {
    let mut out = agentscore_core::records::REQUIRED_COLUMNS.join(",");
    out.push('\n');
    for r in records {
        let fields = [
            r.agent_code.clone(),
            r.agent_age.to_string(),
            date(r.agent_join_month),
            r.first_policy_sold_month.map(date).unwrap_or_default(),
            date(r.year_month),
            r.unique_proposal.to_string(),
            r.unique_quotations.to_string(),
            r.new_policy_count.to_string(),
            r.anbp_value.to_string(),
            r.net_income.to_string(),
            r.number_of_policy_holders.to_string(),
            r.number_of_cash_payment_policies.to_string(),
            r.unique_customers.to_string(),
            r.unique_proposals_last_7_days.to_string(),
            r.unique_proposals_last_15_days.to_string(),
            r.unique_proposals_last_21_days.to_string(),
            r.unique_quotations_last_7_days.to_string(),
            r.unique_quotations_last_15_days.to_string(),
            r.unique_quotations_last_21_days.to_string(),
            r.unique_customers_last_7_days.to_string(),
            r.unique_customers_last_15_days.to_string(),
            r.unique_customers_last_21_days.to_string(),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Route `log` output through the test harness; safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A fresh path under the system temp dir, unique per test name.
pub fn temp_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("agentscore-tests-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir.join(name)
}
