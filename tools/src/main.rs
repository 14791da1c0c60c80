//! score-runner: headless training and query runner for agent scoring.
//!
//! Usage:
//!   score-runner --train train.csv --test test.csv --out database.csv
//!   score-runner --train train.csv --test test.csv --config pipeline.json
//!   score-runner --serve database.csv
//!
//! In --serve mode the runner reads one JSON request per line on stdin
//! and writes one JSON response per line on stdout.

use agentscore_core::{
    config::PipelineConfig,
    engine::{RunSummary, ScoringEngine},
    output::load_scored,
    query::ScoredSnapshot,
};
use anyhow::Result;
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if let Some(table) = flag_value(&args, "--serve") {
        let snapshot = ScoredSnapshot::new(load_scored(Path::new(table))?);
        log::info!("serving {} agents from {table}", snapshot.len());
        return run_query_loop(&snapshot);
    }

    let train = flag_value(&args, "--train").unwrap_or("train_storming_round.csv");
    let test = flag_value(&args, "--test").unwrap_or("test_storming_round.csv");
    let out = flag_value(&args, "--out").unwrap_or("database.csv");

    let mut config = match flag_value(&args, "--config") {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(seed) = flag_value(&args, "--seed").and_then(|s| s.parse().ok()) {
        config.seeds.split = seed;
        config.seeds.forest = seed;
        config.seeds.clustering = seed;
    }

    println!("Agent scoring: score-runner");
    println!("  train:     {train}");
    println!("  test:      {test}");
    println!("  out:       {out}");
    println!("  seeds:     {:?}", config.seeds);
    println!("  trees:     {}", config.forest.n_trees);
    println!();

    let run_id = format!("run-{}-{}", config.seeds.forest, unix_secs());
    let engine = ScoringEngine::new(run_id, config)?;
    let summary = engine.run(Path::new(train), Path::new(test), Path::new(out))?;
    print_summary(&summary);

    Ok(())
}

fn run_query_loop(snapshot: &ScoredSnapshot) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let Some(body) = snapshot.respond(&buffer) else {
            break;
        };
        writeln!(stdout, "{}", body)?;
        stdout.flush()?;
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let r = &summary.report;
    println!("=== RUN SUMMARY ===");
    println!("  run_id:           {}", summary.run_id);
    println!("  training rows:    {}", summary.train_rows);
    println!("  inference rows:   {}", summary.inference_rows);
    println!("  output rows:      {}", summary.output_rows);
    println!("  without tier:     {}", summary.unmatched_rows);
    println!();
    println!("=== CLASSIFIER HOLDOUT ===");
    println!("  train / holdout:  {} / {}", r.train_rows, r.holdout_rows);
    println!("  no-sale share:    {:.1}%", r.no_sale_share * 100.0);
    println!("  accuracy:         {:.3}", r.holdout_accuracy);
    println!("  precision:        {:.3}", r.holdout_precision);
    println!("  recall:           {:.3}", r.holdout_recall);
    println!();
    println!("=== DISTRIBUTIONS ===");
    for (tier, n) in &summary.tier_distribution {
        println!("  {tier:<8} {n}");
    }
    for (prediction, n) in &summary.prediction_distribution {
        println!("  prediction={prediction} {n}");
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn unix_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
