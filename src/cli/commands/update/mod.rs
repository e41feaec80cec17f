//! Update command for pushing CSV change-sets to Copper

pub mod handler;

use clap::Args;
use copper_cli::api::UpdateMode;
use std::path::PathBuf;

pub use handler::handle_update_command;

#[derive(Args)]
pub struct UpdateCommands {
    /// CSV file with an `id` column and one column per field
    pub file: PathBuf,

    /// Fields to update: custom field names or ids, or native company fields.
    /// Use `column=field` when the CSV column is named differently
    /// (e.g. `Region 2025=101`)
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub fields: Vec<String>,

    /// Dispatch mode (defaults to the config file, then sequential)
    #[arg(short, long, value_enum)]
    pub mode: Option<UpdateMode>,

    /// Records per request
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Attempts per batch when rate limited (concurrent mode)
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Requests in flight at once (concurrent mode)
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Free the request slot while a batch waits out a 429
    #[arg(long)]
    pub release_permit_on_backoff: bool,
}
