//! Dashboard queries over a loaded output table.

use agentscore_core::{
    error::ScoreError,
    output::{read_scored, OutputTable, StoredAgent},
    query::{error_status, QueryRequest, ScoredSnapshot},
};
use serde_json::json;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn row(code: &str, prediction: Option<u8>, level: Option<&str>) -> StoredAgent {
    StoredAgent {
        agent_code: code.into(),
        prediction,
        performance_level: level.map(str::to_string),
        recommendations: vec![format!("rec for {code}")],
    }
}

fn snapshot(rows: Vec<StoredAgent>) -> ScoredSnapshot {
    ScoredSnapshot::new(OutputTable { rows, has_prediction: true, has_performance_level: true })
}

// ── Single agent ─────────────────────────────────────────────────────────────

#[test]
fn known_agent_returns_stored_fields() {
    let snap = snapshot(vec![row("A1", Some(1), Some("High"))]);
    let p = snap.performance("A1").unwrap();
    assert_eq!(p.agent_code, "A1");
    assert_eq!(p.prediction, Some(1));
    assert_eq!(p.performance_level.as_deref(), Some("High"));
    assert_eq!(p.recommendations, vec!["rec for A1".to_string()]);
}

#[test]
fn unknown_agent_is_not_found() {
    let snap = snapshot(vec![row("A1", Some(1), Some("High"))]);
    match snap.performance("NOPE") {
        Err(ScoreError::UnknownAgent { agent_id }) => assert_eq!(agent_id, "NOPE"),
        other => panic!("expected UnknownAgent, got {other:?}"),
    }
}

/// Duplicate agent codes keep the first row so lookups are deterministic.
#[test]
fn duplicate_codes_keep_first_row() {
    let snap = snapshot(vec![
        row("A1", Some(1), Some("Low")),
        row("A1", Some(0), Some("High")),
        row("B2", Some(0), None),
    ]);
    assert_eq!(snap.len(), 2);
    let p = snap.performance("A1").unwrap();
    assert_eq!(p.prediction, Some(1));
    assert_eq!(p.performance_level.as_deref(), Some("Low"));
}

// ── Distributions ────────────────────────────────────────────────────────────

#[test]
fn distributions_count_present_values() {
    let snap = snapshot(vec![
        row("A", Some(1), Some("High")),
        row("B", Some(1), Some("Low")),
        row("C", Some(0), Some("Low")),
        row("D", Some(1), None),
        row("E", None, Some("Medium")),
    ]);

    let tiers = snap.performance_distribution().unwrap().performance_distribution;
    assert_eq!(tiers.get("High"), Some(&1));
    assert_eq!(tiers.get("Low"), Some(&2));
    assert_eq!(tiers.get("Medium"), Some(&1));
    assert_eq!(tiers.values().sum::<usize>(), 4);

    let preds = snap.prediction_distribution().unwrap().prediction_distribution;
    assert_eq!(preds.get("1"), Some(&3));
    assert_eq!(preds.get("0"), Some(&1));
}

#[test]
fn distribution_serializes_under_named_key() {
    let snap = snapshot(vec![row("A", Some(1), Some("High"))]);
    let json = serde_json::to_value(snap.prediction_distribution().unwrap()).unwrap();
    assert_eq!(json, serde_json::json!({ "prediction_distribution": { "1": 1 } }));
}

/// A table without a performance_level column cannot be aggregated by tier.
#[test]
fn missing_column_is_reported() {
    let csv = "agent_code,prediction\nA,1\nB,0\n";
    let snap = ScoredSnapshot::new(read_scored(csv.as_bytes()).unwrap());

    match snap.performance_distribution() {
        Err(ScoreError::MissingAggregationField { field }) => assert_eq!(field, "performance_level"),
        other => panic!("expected MissingAggregationField, got {other:?}"),
    }
    assert_eq!(snap.prediction_distribution().unwrap().prediction_distribution.len(), 2);

    let p = snap.performance("A").unwrap();
    assert_eq!(p.performance_level, None);
    assert!(p.recommendations.is_empty());
}

// ── Request loop ─────────────────────────────────────────────────────────────

#[test]
fn requests_parse_by_type_tag() {
    let req: QueryRequest = serde_json::from_str(r#"{"type":"performance","agent_id":"A1"}"#).unwrap();
    assert_eq!(req, QueryRequest::Performance { agent_id: "A1".into() });
    let req: QueryRequest = serde_json::from_str(r#"{"type":"prediction_distribution"}"#).unwrap();
    assert_eq!(req, QueryRequest::PredictionDistribution);
}

#[test]
fn respond_returns_agent_body() {
    let snap = snapshot(vec![row("A1", Some(1), Some("High"))]);
    let body = snap.respond(r#"{"type":"performance","agent_id":"A1"}"#).unwrap();
    assert_eq!(
        body,
        json!({
            "agent_code": "A1",
            "prediction": 1,
            "performance_level": "High",
            "recommendations": ["rec for A1"],
        })
    );
}

#[test]
fn unknown_agent_gets_404_body() {
    let snap = snapshot(vec![row("A1", Some(1), Some("High"))]);
    let body = snap.respond(r#"{"type":"performance","agent_id":"ZZ"}"#).unwrap();
    assert_eq!(body, json!({ "status": 404, "detail": "Agent not found" }));
}

/// Each missing aggregation column has its own 400 text.
#[test]
fn missing_columns_get_400_bodies() {
    let no_level = ScoredSnapshot::new(read_scored("agent_code,prediction\nA,1\n".as_bytes()).unwrap());
    assert_eq!(
        no_level.respond(r#"{"type":"performance_distribution"}"#).unwrap(),
        json!({ "status": 400, "detail": "Performance level data is missing" })
    );

    let no_pred = ScoredSnapshot::new(read_scored("agent_code,performance_level\nA,Low\n".as_bytes()).unwrap());
    assert_eq!(
        no_pred.respond(r#"{"type":"prediction_distribution"}"#).unwrap(),
        json!({ "status": 400, "detail": "Prediction data is missing" })
    );
    assert_eq!(
        no_pred.respond(r#"{"type":"performance_distribution"}"#).unwrap(),
        json!({ "performance_distribution": { "Low": 1 } })
    );
}

/// A malformed line is answered with a 400 and the loop keeps going.
#[test]
fn malformed_request_gets_400_body() {
    let snap = snapshot(vec![row("A1", Some(1), Some("High"))]);
    for line in ["not json", r#"{"type":"explode"}"#, r#"{"type":"performance"}"#] {
        let body = snap.respond(line).unwrap();
        assert_eq!(body["status"], 400, "line {line:?} gave {body}");
        assert!(body["detail"].as_str().is_some_and(|d| !d.is_empty()));
    }
}

#[test]
fn quit_ends_the_loop() {
    let snap = snapshot(vec![]);
    assert!(snap.respond(r#"{"type":"quit"}"#).is_none());
}

#[test]
fn error_status_mapping() {
    assert_eq!(error_status(&ScoreError::UnknownAgent { agent_id: "x".into() }).0, 404);
    assert_eq!(
        error_status(&ScoreError::MissingAggregationField { field: "prediction".into() }),
        (400, "Prediction data is missing".to_string())
    );
    assert_eq!(error_status(&ScoreError::InvalidConfig("boom".into())).0, 500);
}
