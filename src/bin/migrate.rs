//! One-shot copy of every user and prediction from one store into another.
//!
//! Source is `SOURCE_DB_*` (default sqlite), destination `DEST_DB_*`
//! (default postgres). Exits non-zero only when the destination schema
//! cannot be created or the source cannot be read.

use std::process::ExitCode;

use anyhow::Context;
use riskstore::{
    config::StoreConfig,
    migrate::{MigrationReport, Migrator},
    store::{self, OpenMode},
    telemetry, PersistenceBackend,
};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    telemetry::init("riskstore=info");

    println!("{}", "=".repeat(60));
    println!("Starting migration...");
    println!("{}", "=".repeat(60));

    match run().await {
        Ok(report) => {
            print_report(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("\nMigration failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<MigrationReport> {
    let source_cfg = StoreConfig::from_env("SOURCE_", "sqlite")?;
    let dest_cfg = StoreConfig::from_env("DEST_", "postgres")?;
    println!("Source:      {source_cfg:?}");
    println!("Destination: {dest_cfg:?}");

    let source = store::connect_with_mode(&source_cfg, OpenMode::ReadOnly)
        .await
        .context("open source store")?;
    let destination = store::connect(&dest_cfg)
        .await
        .context("open destination store")?;

    let source = PersistenceBackend::new(source);
    let destination = PersistenceBackend::new(destination);
    let report = Migrator::new(&source, &destination)
        .with_progress(|event| println!("{event}"))
        .run()
        .await?;
    Ok(report)
}

fn print_report(report: &MigrationReport) {
    println!();
    println!(
        "  -> Users:       {} migrated, {} skipped",
        report.users_migrated, report.users_skipped
    );
    println!(
        "  -> Predictions: {} migrated, {} skipped",
        report.predictions_migrated, report.predictions_skipped
    );
    println!("{}", "=".repeat(60));
    println!("Migration complete!");
    println!("{}", "=".repeat(60));
}
