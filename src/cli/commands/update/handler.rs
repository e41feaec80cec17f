//! Update command handler

use anyhow::{Context, Result};
use colored::*;
use log::info;
use std::sync::Arc;
use std::time::Instant;

use super::UpdateCommands;
use copper_cli::api::resilience::PermitPolicy;
use copper_cli::api::update::BulkUpdater;
use copper_cli::api::{ChangeSet, CopperClient, DispatchOutcome, SchemaSnapshot, UpdateReport};
use copper_cli::config::{Config, Credentials};

/// Handle `copper-cli update`
pub async fn handle_update_command(args: UpdateCommands, config: &Config) -> Result<()> {
    let mut settings = config.update.clone();
    if let Some(mode) = args.mode {
        settings.mode = mode;
    }
    if let Some(batch_size) = args.batch_size {
        settings.batch_size = batch_size;
    }
    if let Some(max_retries) = args.max_retries {
        settings.max_retries = max_retries;
    }
    if let Some(concurrency) = args.concurrency {
        settings.concurrency_limit = concurrency;
    }
    if args.release_permit_on_backoff {
        settings.permit_policy = PermitPolicy::ReleaseDuringBackoff;
    }

    println!("📄 Reading change-set from: {}", args.file.display().to_string().cyan());
    let change_set = ChangeSet::from_csv_path(&args.file)?;
    println!("   {} row(s), columns: {}", change_set.len(), change_set.columns().join(", ").dimmed());

    let credentials = Credentials::from_env().context("Copper credentials are required")?;
    let client = Arc::new(CopperClient::new(config.base_url(), credentials)?);

    println!("🔄 {}", "Loading custom field definitions...".dimmed());
    let schema = SchemaSnapshot::load(client.as_ref()).await?;
    info!("Schema snapshot holds {} custom field(s)", schema.len());

    let updater = BulkUpdater::new(client, Arc::new(schema)).with_config(settings.to_update_config());

    println!("🚀 Updating in {} mode", settings.mode.to_string().bold());
    let start = Instant::now();
    let report = updater.update(&change_set, args.fields.as_slice(), settings.mode).await?;

    print_report(&report);
    println!("⏱  Finished in {:.2?}", start.elapsed());

    if !report.is_complete() {
        anyhow::bail!(
            "{} of {} record(s) were not updated",
            report.records_failed(),
            report.total_records
        );
    }
    Ok(())
}

fn print_report(report: &UpdateReport) {
    if !report.skipped_fields.is_empty() {
        println!(
            "⚠️  Skipped fields with no matching id: {}",
            report.skipped_fields.join(", ").yellow()
        );
    }
    if !report.missing_columns.is_empty() {
        println!(
            "⚠️  Skipped fields with no column in the CSV: {}",
            report.missing_columns.join(", ").yellow()
        );
    }

    match &report.outcome {
        DispatchOutcome::Sequential(sequential) => {
            if let Some(error) = &sequential.error {
                println!("❌ {}", error.to_string().red());
            }
            println!(
                "{} {}/{} record(s) updated ({} of {} batches)",
                if sequential.error.is_none() { "✅" } else { "⚠️ " },
                sequential.records_updated,
                report.total_records,
                sequential.batches_completed,
                sequential.batches_total
            );
        }
        DispatchOutcome::Concurrent(concurrent) => {
            for failure in concurrent.failures() {
                let reason = failure
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string());
                println!("❌ Batch {}: {}", failure.index, reason.red());
            }
            if concurrent.retry_events > 0 {
                println!("   {} rate-limit retr(ies) along the way", concurrent.retry_events);
            }
            println!(
                "{} {}/{} batches updated successfully",
                if concurrent.batches_failed == 0 { "✅" } else { "⚠️ " },
                concurrent.batches_succeeded,
                concurrent.batches_attempted
            );
        }
    }

    let failed_ids = report.failed_ids();
    if !failed_ids.is_empty() {
        let ids: Vec<String> = failed_ids.iter().map(i64::to_string).collect();
        println!("   Not updated: {}", ids.join(", ").dimmed());
    }
}
