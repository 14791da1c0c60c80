//! Agent scoring: sales-risk prediction, performance tiering and
//! intervention recommendations for insurance sales agents.

pub mod classifier;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod forest;
pub mod kmeans;
pub mod output;
pub mod preprocess;
pub mod query;
pub mod recommend;
pub mod records;
pub mod rng;
pub mod types;
