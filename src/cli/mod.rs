//! Command-line interface for profiling, analysis, training and prediction

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::{CsvWriter, SerWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::AutoMLConfig;
use crate::engine::{AutoMLEngine, TrainedModel};
use crate::ingest::CsvIngestor;
use crate::intelligence::IntelligenceClassifier;
use crate::persistence::DirectoryArtifactStore;
use crate::profiling::{profile_dataset, DatasetProfile};
use crate::table::{Table, Value};
use crate::training::{AlgorithmRegistry, TaskKind};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<18} {}", muted(key), val.white());
}

fn score_color(score: f64) -> ColoredString {
    let text = format!("{:.1}", score);
    if score >= 80.0 {
        text.green()
    } else if score >= 50.0 {
        text.yellow()
    } else {
        text.red()
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "automl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automated tabular machine learning with an auditable decision log")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Profile every column of a CSV file
    Profile {
        /// Input CSV file
        data: PathBuf,
    },

    /// Infer column roles and the problem type
    Analyze {
        /// Input CSV file
        data: PathBuf,

        /// Target column name, overriding inference
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Run the full pipeline and keep the best model
    Train {
        /// Input CSV file
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: Option<String>,

        /// Comma-separated feature columns
        #[arg(short, long, value_delimiter = ',')]
        features: Option<Vec<String>>,

        /// JSON run configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of cross-validation folds
        #[arg(long)]
        folds: Option<usize>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Directory receiving the run artifacts
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Predict with a model saved by `train`
    Predict {
        /// Directory written by `train --output`
        model_dir: PathBuf,

        /// Input CSV file
        data: PathBuf,

        /// Output CSV file for predictions
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Profile { data } => cmd_profile(&data),
        Commands::Analyze { data, target } => cmd_analyze(&data, target),
        Commands::Train { data, target, features, config, folds, seed, output } => {
            let mut run_config = match config {
                Some(path) => AutoMLConfig::load(path)?,
                None => AutoMLConfig::default(),
            };
            if let Some(target) = target {
                run_config = run_config.with_target(target);
            }
            if let Some(features) = features {
                run_config = run_config.with_features(features);
            }
            if let Some(folds) = folds {
                run_config = run_config.with_cv_folds(folds);
            }
            if let Some(seed) = seed {
                run_config = run_config.with_random_seed(seed);
            }
            cmd_train(&data, run_config, output.as_deref())
        }
        Commands::Predict { model_dir, data, output } => {
            cmd_predict(&model_dir, &data, output.as_deref())
        }
    }
}

// ─── Data loading ──────────────────────────────────────────────────────────────

pub fn load_data(path: &Path) -> anyhow::Result<Table> {
    step_run("Loading data");
    let start = Instant::now();
    let (table, meta) = CsvIngestor::new().load(path)?;
    step_done(&format!(
        "{} rows × {} cols, {:.2} MB in {:?}",
        meta.n_rows,
        meta.n_cols,
        meta.size_bytes as f64 / 1024.0 / 1024.0,
        start.elapsed()
    ));
    Ok(table)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

fn print_profile(profile: &DatasetProfile) {
    kv("Rows", &profile.n_rows.to_string());
    kv("Columns", &profile.n_cols.to_string());
    kv("Duplicates", &format!("{:.1}%", profile.duplicate_pct));
    println!("  {:<18} {}", muted("Quality"), score_color(profile.overall_quality_score));
    println!();

    println!(
        "  {:<20} {:<12} {:>8} {:>8} {:>8}",
        muted("Column"), muted("Type"), muted("Missing"), muted("Unique"), muted("Score")
    );
    println!("  {}", dim(&"─".repeat(60)));
    for column in profile.ordered() {
        println!(
            "  {:<20} {:<12} {:>7.1}% {:>8} {:>8}",
            column.name,
            column.semantic_type.as_str(),
            column.missing_pct,
            column.unique_count,
            score_color(column.quality_score)
        );
    }

    if !profile.recommendations.is_empty() {
        println!();
        for rec in &profile.recommendations {
            println!("  {} {}", accent("›"), rec);
        }
    }
}

pub fn cmd_profile(data_path: &Path) -> anyhow::Result<()> {
    section("Profile");
    let table = load_data(data_path)?;
    let profile = profile_dataset(&table, &Default::default());
    println!();
    print_profile(&profile);
    println!();
    Ok(())
}

pub fn cmd_analyze(data_path: &Path, target: Option<String>) -> anyhow::Result<()> {
    section("Analyze");
    let table = load_data(data_path)?;
    let profile = profile_dataset(&table, &Default::default());
    let overrides = crate::intelligence::ColumnOverrides { target, features: None };
    let result = IntelligenceClassifier::new().analyze_with_overrides(&profile, &overrides)?;

    println!();
    kv("Problem type", result.problem_type.as_str());
    kv("Confidence", &format!("{:.2}", result.confidence));
    kv("Target", result.roles.target.as_deref().unwrap_or("-"));
    kv("Features", &result.roles.features.join(", "));
    if !result.roles.identifiers.is_empty() {
        kv("Identifiers", &result.roles.identifiers.join(", "));
    }
    if !result.roles.ignore.is_empty() {
        kv("Ignored", &result.roles.ignore.join(", "));
    }
    println!();
    for line in &result.reasoning {
        println!("  {} {}", dim("·"), line);
    }
    println!();
    Ok(())
}

pub fn cmd_train(
    data_path: &Path,
    config: AutoMLConfig,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");
    let table = load_data(data_path)?;

    step_run("Running pipeline");
    let start = Instant::now();
    let engine = AutoMLEngine::new(config);
    let run = engine.run(&table)?;
    step_done(&format!("{:?}", start.elapsed()));

    let result = &run.result;
    println!();
    kv("Problem type", run.intelligence.problem_type.as_str());
    kv("Target", run.intelligence.roles.target.as_deref().unwrap_or("-"));
    kv("Strategy", run.pipeline.strategy.as_str());
    println!();

    println!(
        "  {:<24} {:>10} {:>10} {:>10}",
        muted("Model"),
        muted(&format!("cv {}", result.scoring.name())),
        muted("± std"),
        muted("test")
    );
    println!("  {}", dim(&"─".repeat(58)));
    for model in &result.ranked {
        let name = if model.algorithm == result.best_model.algorithm {
            model.algorithm.green().bold()
        } else {
            model.algorithm.normal()
        };
        println!(
            "  {:<24} {:>10.4} {:>10.4} {:>10.4}",
            name, model.cv_mean, model.cv_std, model.test_score
        );
    }
    for failure in &result.failed_candidates {
        println!("  {:<24} {}", failure.algorithm, format!("failed: {}", failure.reason).red());
    }
    println!();
    kv("Confidence", result.confidence_level.as_str());
    for rec in &result.recommendations {
        println!("  {} {}", accent("›"), rec);
    }

    if let Some(dir) = output {
        step_run("Writing artifacts");
        let store = DirectoryArtifactStore::new(dir)?;
        let written = engine.persist(&run, &store)?;
        step_done(&format!("{} files in {}", written.len(), dir.display()));
    }
    println!();
    Ok(())
}

pub fn cmd_predict(model_dir: &Path, data_path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    section("Predict");
    let model = TrainedModel::load(model_dir.join("model.json"), &AlgorithmRegistry::builtin())?;
    kv("Model", model.algorithm());
    let table = load_data(data_path)?;

    step_run("Predicting");
    let start = Instant::now();
    let predictions = model.predict(&table)?;
    step_done(&format!("{} rows in {:?}", predictions.len(), start.elapsed()));

    let mut df = match model.task() {
        TaskKind::Regression => {
            let values: Vec<Option<f64>> = predictions.iter().map(Value::as_f64).collect();
            polars::df!("prediction" => values)?
        }
        TaskKind::Classification => {
            let values: Vec<Option<String>> = predictions.iter().map(Value::key).collect();
            polars::df!("prediction" => values)?
        }
    };

    match output {
        Some(path) => {
            let mut file = std::fs::File::create(path)?;
            CsvWriter::new(&mut file).finish(&mut df)?;
            step_run("Saved");
            step_done(&path.display().to_string());
        }
        None => println!("{}", df),
    }
    println!();
    Ok(())
}
