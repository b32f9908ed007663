//! Command-line interface
//!
//! `run` executes the whole pipeline; `ingest` and `validate` stop after that
//! stage; `config` prints the resolved settings.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{PipelineConfig, PipelineSettings};
use crate::pipeline::TrainingPipeline;
use crate::sync::NoopSync;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString { s.truecolor(100, 210, 120) }
fn bad(s: &str) -> ColoredString { s.truecolor(230, 110, 110) }

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn step_run(msg: &str) {
    println!("  {} {}", accent("›"), msg);
}

fn step_done(msg: &str, detail: &str) {
    println!("  {} {} {}", ok("✓"), msg, dim(detail));
}

fn kv(key: &str, val: &str) {
    println!("    {:<28} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "netsec")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Network security training pipeline")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run ingestion, validation, transformation and training
    Run {
        /// Settings file (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Skip syncing artifacts to S3
        #[arg(long)]
        no_sync: bool,
    },

    /// Run ingestion only
    Ingest {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run ingestion and validation
    Validate {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the resolved settings
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

fn build_pipeline(config_path: Option<&Path>) -> anyhow::Result<TrainingPipeline> {
    let settings = PipelineSettings::load(config_path)?;
    let config = PipelineConfig::now(settings);
    kv("Artifacts", &config.artifact_dir.display().to_string());
    Ok(TrainingPipeline::from_config(config))
}

pub fn cmd_run(config_path: Option<&Path>, no_sync: bool) -> anyhow::Result<()> {
    section("Training pipeline");
    let mut pipeline = build_pipeline(config_path)?;
    if no_sync {
        pipeline = pipeline.with_sync(Box::new(NoopSync));
    }

    let start = Instant::now();
    step_run("Ingestion, validation, transformation, training");
    let outcome = pipeline.run_with_progress(|stage, artifact| {
        step_done(&stage.to_string(), &artifact.to_string());
    })?;
    if !outcome.validation.validation_status {
        println!(
            "  {} validation reported errors, continuing with the valid split paths",
            bad("!")
        );
    }
    let trainer = outcome.trainer;

    println!();
    kv("Model", &trainer.trained_model_file_path.display().to_string());
    kv("Test F1", &format!("{:.4}", trainer.test_metric.f1_score));
    kv("Test precision", &format!("{:.4}", trainer.test_metric.precision_score));
    kv("Test recall", &format!("{:.4}", trainer.test_metric.recall_score));
    kv("Elapsed", &format!("{:.2?}", start.elapsed()));
    println!();
    Ok(())
}

pub fn cmd_ingest(config_path: Option<&Path>) -> anyhow::Result<()> {
    section("Ingestion");
    let pipeline = build_pipeline(config_path)?;
    step_run("Ingestion");
    let ingestion = pipeline.start_data_ingestion()?;
    step_done("Ingestion", &ingestion.to_string());
    Ok(())
}

pub fn cmd_validate(config_path: Option<&Path>) -> anyhow::Result<()> {
    section("Validation");
    let pipeline = build_pipeline(config_path)?;
    let ingestion = pipeline.start_data_ingestion()?;
    step_done("Ingestion", &ingestion.to_string());
    step_run("Validation");
    let validation = pipeline.start_data_validation(&ingestion)?;
    step_done("Validation", &validation.to_string());
    kv("Status", if validation.validation_status { "valid" } else { "invalid" });
    Ok(())
}

pub fn cmd_config(config_path: Option<&Path>) -> anyhow::Result<()> {
    let settings = PipelineSettings::load(config_path)?;
    print!("{}", serde_yaml::to_string(&settings)?);
    Ok(())
}
