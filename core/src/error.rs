use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Required column '{column}' is missing from the input")]
    InputSchema { column: String },

    #[error("Invalid date in row {row}, column '{column}': {value:?}")]
    InvalidDate { row: usize, column: String, value: String },

    #[error("Agent '{agent_id}' not found")]
    UnknownAgent { agent_id: String },

    #[error("Aggregation field '{field}' is missing from the served data")]
    MissingAggregationField { field: String },

    #[error("Not enough data to fit {what}: need {needed}, got {got}")]
    InsufficientData { what: &'static str, needed: usize, got: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ScoreResult<T> = Result<T, ScoreError>;
