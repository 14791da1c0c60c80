//! Read-only dashboard queries over the merged output table.
//!
//! RULE: a snapshot is built once from a loaded table and never mutated.
//! Handlers receive it by reference; there is no global dataset.

use crate::{
    error::{ScoreError, ScoreResult},
    output::{OutputTable, StoredAgent},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentPerformance {
    pub agent_code: String,
    pub prediction: Option<u8>,
    pub performance_level: Option<String>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PerformanceDistribution {
    pub performance_distribution: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredictionDistribution {
    pub prediction_distribution: BTreeMap<String, usize>,
}

/// One request line of the query loop, tagged by `"type"`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryRequest {
    Performance { agent_id: String },
    PerformanceDistribution,
    PredictionDistribution,
    Quit,
}

/// Status and detail text for a failed query.
pub fn error_status(err: &ScoreError) -> (u16, String) {
    match err {
        ScoreError::UnknownAgent { .. } => (404, "Agent not found".into()),
        ScoreError::MissingAggregationField { field } if field == "performance_level" => {
            (400, "Performance level data is missing".into())
        }
        ScoreError::MissingAggregationField { .. } => (400, "Prediction data is missing".into()),
        other => (500, other.to_string()),
    }
}

fn error_body(err: &ScoreError) -> serde_json::Value {
    let (status, detail) = error_status(err);
    if status >= 500 {
        log::warn!("query failed: {err}");
    }
    serde_json::json!({ "status": status, "detail": detail })
}

pub struct ScoredSnapshot {
    rows: Vec<StoredAgent>,
    index: HashMap<String, usize>,
    has_prediction: bool,
    has_performance_level: bool,
}

impl ScoredSnapshot {
    /// Build from a loaded table. Repeated agent codes keep the first row.
    pub fn new(table: OutputTable) -> Self {
        let mut rows = Vec::with_capacity(table.rows.len());
        let mut index = HashMap::new();
        let mut dropped = 0usize;
        for row in table.rows {
            if index.contains_key(&row.agent_code) {
                dropped += 1;
                continue;
            }
            index.insert(row.agent_code.clone(), rows.len());
            rows.push(row);
        }
        if dropped > 0 {
            log::warn!("snapshot: dropped {dropped} duplicate agent_code rows (kept first occurrence)");
        }
        log::info!("snapshot: serving {} agents", rows.len());

        Self {
            rows,
            index,
            has_prediction: table.has_prediction,
            has_performance_level: table.has_performance_level,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn performance(&self, agent_id: &str) -> ScoreResult<AgentPerformance> {
        let row = self
            .index
            .get(agent_id)
            .map(|&i| &self.rows[i])
            .ok_or_else(|| ScoreError::UnknownAgent { agent_id: agent_id.to_string() })?;

        Ok(AgentPerformance {
            agent_code: agent_id.to_string(),
            prediction: row.prediction,
            performance_level: row.performance_level.clone(),
            recommendations: row.recommendations.clone(),
        })
    }

    /// Answer one JSON request line. `None` means the client asked to quit.
    /// Malformed requests get a 400 body rather than ending the loop.
    pub fn respond(&self, line: &str) -> Option<serde_json::Value> {
        let request: QueryRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => return Some(serde_json::json!({ "status": 400, "detail": e.to_string() })),
        };

        let response = match request {
            QueryRequest::Quit => return None,
            QueryRequest::Performance { agent_id } => {
                self.performance(&agent_id).and_then(|r| serde_json::to_value(r).map_err(ScoreError::from))
            }
            QueryRequest::PerformanceDistribution => {
                self.performance_distribution().and_then(|r| serde_json::to_value(r).map_err(ScoreError::from))
            }
            QueryRequest::PredictionDistribution => {
                self.prediction_distribution().and_then(|r| serde_json::to_value(r).map_err(ScoreError::from))
            }
        };
        Some(response.unwrap_or_else(|e| error_body(&e)))
    }

    /// Tier → count. Rows without a tier are not counted.
    pub fn performance_distribution(&self) -> ScoreResult<PerformanceDistribution> {
        if !self.has_performance_level {
            return Err(ScoreError::MissingAggregationField { field: "performance_level".into() });
        }
        let mut counts = BTreeMap::new();
        for level in self.rows.iter().filter_map(|r| r.performance_level.as_ref()) {
            *counts.entry(level.clone()).or_insert(0) += 1;
        }
        Ok(PerformanceDistribution { performance_distribution: counts })
    }

    /// "0"/"1" → count. Rows without a prediction are not counted.
    pub fn prediction_distribution(&self) -> ScoreResult<PredictionDistribution> {
        if !self.has_prediction {
            return Err(ScoreError::MissingAggregationField { field: "prediction".into() });
        }
        let mut counts = BTreeMap::new();
        for p in self.rows.iter().filter_map(|r| r.prediction) {
            *counts.entry(p.to_string()).or_insert(0) += 1;
        }
        Ok(PredictionDistribution { prediction_distribution: counts })
    }
}
