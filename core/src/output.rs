//! The merged output table: the system's only durable state.
//!
//! RULE: recommendations are stored as a JSON array of strings and read
//! back with serde_json. Nothing in this module evaluates cell contents.

use crate::{
    error::{ScoreError, ScoreResult},
    records::check_columns,
    types::{AgentCode, Tier},
};
use serde::{Deserialize, Serialize};
use std::{fs::File, io, path::Path};

pub const OUTPUT_COLUMNS: [&str; 4] = ["agent_code", "prediction", "performance_level", "recommendations"];

/// One merged output row. The performance side is `None` when the left
/// join found no matching performance row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoredAgent {
    pub agent_code: AgentCode,
    pub prediction: u8,
    pub performance_level: Option<Tier>,
    pub recommendations: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OutputRow {
    agent_code: String,
    #[serde(default)]
    prediction: Option<u8>,
    #[serde(default)]
    performance_level: Option<String>,
    #[serde(default)]
    recommendations: Option<String>,
}

/// Output rows as read back, plus which optional columns were present.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTable {
    pub rows: Vec<StoredAgent>,
    pub has_prediction: bool,
    pub has_performance_level: bool,
}

/// A row read from disk. Fields are optional because the served table
/// may lack columns or carry empty cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAgent {
    pub agent_code: AgentCode,
    pub prediction: Option<u8>,
    pub performance_level: Option<String>,
    pub recommendations: Vec<String>,
}

pub fn write_scored<W: io::Write>(sink: W, rows: &[ScoredAgent]) -> ScoreResult<()> {
    let mut writer = csv::Writer::from_writer(sink);
    for row in rows {
        let recommendations = match &row.recommendations {
            Some(recs) => Some(serde_json::to_string(recs)?),
            None => None,
        };
        writer.serialize(OutputRow {
            agent_code: row.agent_code.clone(),
            prediction: Some(row.prediction),
            performance_level: row.performance_level.map(|t| t.as_str().to_string()),
            recommendations,
        })?;
    }
    if rows.is_empty() {
        writer.write_record(OUTPUT_COLUMNS)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the table to `path`. The file is written in full or not at all
/// from the caller's point of view: rows are encoded before the file is
/// replaced.
pub fn save_scored(path: &Path, rows: &[ScoredAgent]) -> ScoreResult<()> {
    let mut buffer = Vec::new();
    write_scored(&mut buffer, rows)?;
    std::fs::write(path, buffer)?;
    log::info!("wrote {} scored rows to {}", rows.len(), path.display());
    Ok(())
}

pub fn read_scored<R: io::Read>(source: R) -> ScoreResult<OutputTable> {
    let mut reader = csv::Reader::from_reader(source);
    let headers = reader.headers()?.clone();
    check_columns(&headers, &["agent_code"])?;
    let has = |name: &str| headers.iter().any(|h| h == name);
    let has_prediction = has("prediction");
    let has_performance_level = has("performance_level");

    let mut rows = Vec::new();
    for row in reader.deserialize::<OutputRow>() {
        let row = row?;
        let recommendations = match row.recommendations.as_deref().map(str::trim) {
            None | Some("") => Vec::new(),
            Some(json) => serde_json::from_str(json)?,
        };
        rows.push(StoredAgent {
            agent_code: row.agent_code,
            prediction: row.prediction,
            performance_level: row.performance_level.filter(|s| !s.is_empty()),
            recommendations,
        });
    }

    Ok(OutputTable { rows, has_prediction, has_performance_level })
}

pub fn load_scored(path: &Path) -> ScoreResult<OutputTable> {
    let file = File::open(path).map_err(|e| {
        ScoreError::Other(anyhow::anyhow!("Cannot read {}: {e}", path.display()))
    })?;
    read_scored(file)
}

impl From<&ScoredAgent> for StoredAgent {
    fn from(row: &ScoredAgent) -> Self {
        Self {
            agent_code: row.agent_code.clone(),
            prediction: Some(row.prediction),
            performance_level: row.performance_level.map(|t| t.as_str().to_string()),
            recommendations: row.recommendations.clone().unwrap_or_default(),
        }
    }
}

impl StoredAgent {
    pub fn tier(&self) -> Option<Tier> {
        self.performance_level.as_deref().and_then(Tier::parse)
    }
}
