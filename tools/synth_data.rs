//! Synthetic Data Generator
//!
//! Writes seeded demo datasets for local runs of the service.
//!
//! Usage:
//!   cargo run --bin synth_data -- --out-dir data/processed
//!   cargo run --bin synth_data -- --applications 20000 --seed 7

use anyhow::{Context, Result};
use clap::Parser;
use credit_flywheel::drift::ReferenceDistribution;
use credit_flywheel::models::synthetic::{bad_outcome_probability, SyntheticGenerator, DEFAULT_SEED};
use credit_flywheel::models::uplift::{save_lifecycle_records, UpliftDatasetBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "synth_data")]
#[command(about = "Generate synthetic credit flywheel datasets")]
struct Args {
    /// Output directory
    #[arg(long, default_value = "data/processed")]
    out_dir: PathBuf,

    /// Number of credit applications
    #[arg(long, default_value_t = 5000)]
    applications: usize,

    /// Number of lifecycle accounts
    #[arg(long, default_value_t = 3000)]
    lifecycle: usize,

    /// Number of dealers in the bandit history
    #[arg(long, default_value_t = 30)]
    dealers: usize,

    /// Bandit arms, comma separated
    #[arg(long, value_delimiter = ',', default_value = "layout_a,layout_b,layout_c")]
    arms: Vec<String>,

    /// Buckets of the score reference distribution
    #[arg(long, default_value_t = 10)]
    psi_buckets: usize,

    /// RNG seed
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,
}

/// Flat CSV row of a labeled application
#[derive(Serialize)]
struct ApplicationRow<'a> {
    dealer_id: &'a str,
    vehicle_type: &'a str,
    region: &'a str,
    applicant_income: f64,
    loan_amount: f64,
    vehicle_age: i32,
    bad: u8,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("synth_data=info".parse()?)
                .add_directive("credit_flywheel=info".parse()?),
        )
        .init();

    let args = Args::parse();
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;

    let mut generator = SyntheticGenerator::new(args.seed);

    // Credit applications with a latent bad-outcome label
    let labeled = generator.labeled_applications(args.applications);
    let path = args.out_dir.join("credit_applications.csv");
    let mut writer = csv_writer(&path)?;
    for row in &labeled {
        let app = &row.application;
        writer.serialize(ApplicationRow {
            dealer_id: &app.dealer_id,
            vehicle_type: &app.vehicle_type,
            region: &app.region,
            applicant_income: app.applicant_income,
            loan_amount: app.loan_amount,
            vehicle_age: app.vehicle_age,
            bad: row.bad,
        })?;
    }
    writer.flush()?;
    let bad_rate = labeled.iter().map(|r| r.bad as f64).sum::<f64>() / labeled.len().max(1) as f64;
    info!(path = %path.display(), rows = labeled.len(), bad_rate = bad_rate, "Applications written");

    // Score reference from the latent risk until a trained model supplies scores
    let scores: Vec<f64> = labeled
        .iter()
        .map(|r| bad_outcome_probability(&r.application))
        .collect();
    let reference = ReferenceDistribution::from_scores(&scores, args.psi_buckets)
        .context("Cannot build a score reference; pass --applications > 0")?;
    let path = args.out_dir.join("approval_score_reference.json");
    reference.save(&path)?;
    info!(path = %path.display(), buckets = reference.frequencies.len(), "Score reference written");

    // Lifecycle treatment log and the uplift dataset built from it
    let records = generator.lifecycle_records(args.lifecycle);
    let path = args.out_dir.join("lifecycle_records.csv");
    save_lifecycle_records(&path, &records)?;
    info!(path = %path.display(), rows = records.len(), "Lifecycle records written");

    let dataset = UpliftDatasetBuilder::default().build(&records)?;
    dataset.save(args.out_dir.join("lifecycle_uplift_dataset.csv"))?;
    for group in dataset.summary() {
        info!(
            treatment = %group.treatment,
            rows = group.rows,
            mean_outcome = format!("{:.3}", group.mean_outcome),
            "Treatment group"
        );
    }

    // Dealer click history used to seed the bandit
    let history = generator.bandit_history(args.dealers, &args.arms);
    let path = args.out_dir.join("dealer_bandit_context.csv");
    let mut writer = csv_writer(&path)?;
    for record in &history {
        writer.serialize(record)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = history.len(), "Bandit history written");

    Ok(())
}

fn csv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    csv::Writer::from_path(path).with_context(|| format!("Failed to create {}", path.display()))
}
