use super::commands::fields::FieldsCommands;
use super::commands::update::UpdateCommands;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "copper-cli")]
#[command(about = "Bulk field updates for Copper CRM companies")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Push field values from a CSV file to company records
    Update(UpdateCommands),
    /// List custom field definitions
    Fields(FieldsCommands),
}
