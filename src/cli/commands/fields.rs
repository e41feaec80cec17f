use anyhow::{Context, Result};
use clap::Args;
use colored::*;

use copper_cli::api::{CopperClient, SchemaSnapshot};
use copper_cli::config::{Config, Credentials};

#[derive(Args)]
pub struct FieldsCommands {
    /// Only show fields whose name contains this text (case-insensitive)
    #[arg(short, long)]
    pub filter: Option<String>,
}

/// Handle `copper-cli fields`
pub async fn handle_fields_command(args: FieldsCommands, config: &Config) -> Result<()> {
    let credentials = Credentials::from_env().context("Copper credentials are required")?;
    let client = CopperClient::new(config.base_url(), credentials)?;
    let schema = SchemaSnapshot::load(&client).await?;

    let needle = args.filter.map(|f| f.to_lowercase());
    let mut shown = 0;
    for definition in schema.definitions() {
        if let Some(needle) = &needle {
            if !definition.name.to_lowercase().contains(needle) {
                continue;
            }
        }
        println!(
            "{:>10}  {}  {}",
            definition.id.to_string().cyan(),
            definition.name.bold(),
            definition.data_type.as_deref().unwrap_or("-").dimmed()
        );
        shown += 1;
    }

    println!("\n{} of {} custom field(s)", shown, schema.len());
    Ok(())
}
