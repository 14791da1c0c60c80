//! End-to-end runs: merge semantics, file output and the run summary.

mod common;

use agentscore_core::{
    classifier::SalesPrediction,
    config::PipelineConfig,
    engine::{merge_left, PerformanceResult, ScoringEngine},
    error::ScoreError,
    output::{load_scored, read_scored, write_scored, ScoredAgent, StoredAgent},
    types::Tier,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn sale(code: &str, prediction: u8) -> SalesPrediction {
    SalesPrediction { agent_code: code.into(), prediction }
}

fn perf(code: &str, tier: Tier, recs: &[&str]) -> PerformanceResult {
    PerformanceResult {
        agent_code: code.into(),
        performance_level: Some(tier),
        recommendations: recs.iter().map(|s| s.to_string()).collect(),
    }
}

fn engine(name: &str) -> ScoringEngine {
    common::init_logging();
    ScoringEngine::new(name.into(), PipelineConfig::default_test()).unwrap()
}

// ── Merge ────────────────────────────────────────────────────────────────────

/// A sales row with no performance match is kept with an empty performance side.
#[test]
fn unmatched_sales_rows_are_kept() {
    let merged = merge_left(&[sale("A", 1), sale("B", 0)], &[perf("A", Tier::High, &["x"])]);

    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].performance_level, Some(Tier::High));
    assert_eq!(merged[0].recommendations, Some(vec!["x".to_string()]));
    assert_eq!(
        merged[1],
        ScoredAgent { agent_code: "B".into(), prediction: 0, performance_level: None, recommendations: None }
    );
}

/// Performance rows without a sales row are dropped.
#[test]
fn performance_only_rows_are_dropped() {
    let merged = merge_left(&[sale("A", 1)], &[perf("Z", Tier::Low, &[]), perf("A", Tier::Medium, &[])]);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].agent_code, "A");
    assert_eq!(merged[0].performance_level, Some(Tier::Medium));
}

/// Repeated keys produce one output row per matching pair, in input order.
#[test]
fn repeated_keys_multiply() {
    let merged = merge_left(
        &[sale("A", 1), sale("A", 0)],
        &[perf("A", Tier::High, &[]), perf("A", Tier::Low, &[])],
    );
    let pairs: Vec<(u8, Option<Tier>)> = merged.iter().map(|r| (r.prediction, r.performance_level)).collect();
    assert_eq!(
        pairs,
        vec![
            (1, Some(Tier::High)),
            (1, Some(Tier::Low)),
            (0, Some(Tier::High)),
            (0, Some(Tier::Low)),
        ]
    );
}

// ── Output table ─────────────────────────────────────────────────────────────

/// Recommendations survive the CSV as a JSON array, commas and quotes included.
#[test]
fn output_round_trips_recommendations() {
    let rows = vec![
        ScoredAgent {
            agent_code: "A".into(),
            prediction: 1,
            performance_level: Some(Tier::Low),
            recommendations: Some(vec!["Say \"hi\", then wait.".into(), "Second".into()]),
        },
        ScoredAgent { agent_code: "B".into(), prediction: 0, performance_level: None, recommendations: None },
    ];

    let mut buf = Vec::new();
    write_scored(&mut buf, &rows).unwrap();
    let text = String::from_utf8(buf.clone()).unwrap();
    assert!(text.starts_with("agent_code,prediction,performance_level,recommendations"));

    let table = read_scored(buf.as_slice()).unwrap();
    assert!(table.has_prediction && table.has_performance_level);
    let expected: Vec<StoredAgent> = rows.iter().map(StoredAgent::from).collect();
    assert_eq!(table.rows, expected);
    assert_eq!(table.rows[0].tier(), Some(Tier::Low));
    assert_eq!(table.rows[1].performance_level, None);
}

#[test]
fn empty_output_still_has_header() {
    let mut buf = Vec::new();
    write_scored(&mut buf, &[]).unwrap();
    let table = read_scored(buf.as_slice()).unwrap();
    assert!(table.rows.is_empty());
    assert!(table.has_prediction);
}

// ── Full run ─────────────────────────────────────────────────────────────────

#[test]
fn full_run_writes_every_inference_row() {
    let train = common::temp_path("run-train.csv");
    let infer = common::temp_path("run-infer.csv");
    let out = common::temp_path("run-out.csv");
    std::fs::write(&train, common::to_csv(&common::population(90, 21))).unwrap();
    std::fs::write(&infer, common::to_csv(&common::population(15, 22))).unwrap();

    let summary = engine("run-full").run(&train, &infer, &out).unwrap();
    assert_eq!(summary.train_rows, 90);
    assert_eq!(summary.inference_rows, 15);
    assert_eq!(summary.output_rows, 15);
    assert_eq!(summary.unmatched_rows, 0);
    assert_eq!(summary.tier_distribution.values().sum::<usize>(), 15);
    assert_eq!(summary.prediction_distribution.values().sum::<usize>(), 15);

    let table = load_scored(&out).unwrap();
    assert_eq!(table.rows.len(), 15);
    for row in &table.rows {
        assert!(row.prediction.is_some());
        let tier = row.tier().expect("every row has a tier");
        if tier == Tier::High {
            assert_eq!(row.recommendations.len(), 5);
        } else {
            assert!(row.recommendations.len() >= 2);
        }
    }
}

/// A bad inference file aborts the run before anything is written.
#[test]
fn failed_run_writes_nothing() {
    let train = common::temp_path("fail-train.csv");
    let infer = common::temp_path("fail-infer.csv");
    let out = common::temp_path("fail-out.csv");
    let _ = std::fs::remove_file(&out);
    std::fs::write(&train, common::to_csv(&common::population(30, 23))).unwrap();
    let broken = common::to_csv(&common::population(3, 24)).replacen("agent_age", "age", 1);
    std::fs::write(&infer, broken).unwrap();

    let err = engine("run-fail").run(&train, &infer, &out).unwrap_err();
    assert!(matches!(err, ScoreError::InputSchema { .. }), "unexpected error: {err:?}");
    assert!(!out.exists());
}

/// The shipped defaults must pass validation, or no run can start.
#[test]
fn default_config_builds_an_engine() {
    let engine = ScoringEngine::new("defaults".into(), PipelineConfig::default()).unwrap();
    assert_eq!(engine.config().composite_weights.len(), 11);
}

#[test]
fn invalid_config_is_rejected_up_front() {
    let mut config = PipelineConfig::default_test();
    config.clustering.k = 4;
    assert!(matches!(
        ScoringEngine::new("bad".into(), config),
        Err(ScoreError::InvalidConfig(_))
    ));
}
