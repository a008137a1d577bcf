//! # gapi: Google Drive, Gmail and Sheets helpers from the command line
//!
//! Thin wrappers over the `gapi-helper` crates: dumping, copying and backing up
//! spreadsheets, transferring CSV files into sheets, listing Drive files and sending mail.

mod commands;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use gapi_helper::GapiConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// --- CLI Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// YAML configuration file
    #[arg(long, env = "GAPI_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Service-account key file, overriding the configuration
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy the values of every tab of a spreadsheet into another spreadsheet
    Dump(DumpArgs),
    /// Copy a spreadsheet into a Drive folder (formulas included)
    Copy(FolderCopyArgs),
    /// Create a spreadsheet in a Drive folder holding the values of another one
    Duplicate(FolderCopyArgs),
    /// Write the rows of a CSV file into a sheet
    TransferCsv(TransferCsvArgs),
    /// Download tabs of a spreadsheet into the backup directory
    Backup(BackupArgs),
    /// List the Drive files owned by a user
    ListOwned(ListOwnedArgs),
    /// Send an email
    Mail(MailArgs),
}

#[derive(Parser, Debug)]
pub struct DumpArgs {
    /// Source spreadsheet ID or URL
    source: String,
    /// Destination spreadsheet ID or URL
    destination: String,
    #[arg(long)]
    dry_run: bool,
}

#[derive(Parser, Debug)]
pub struct FolderCopyArgs {
    /// User owning the destination folder
    user: String,
    /// Source spreadsheet ID or URL
    source: String,
    /// Destination folder ID
    folder: String,
    /// Name of the new spreadsheet
    #[arg(long, default_value = "copy")]
    name: String,
    #[arg(long)]
    dry_run: bool,
}

#[derive(Parser, Debug)]
pub struct TransferCsvArgs {
    /// CSV file to transfer
    file: PathBuf,
    /// Destination spreadsheet ID or URL
    spreadsheet: String,
    /// Destination tab
    tab: String,
    /// Cells of the CSV data to transfer
    #[arg(long, default_value = "A1:*")]
    source_range: String,
    /// Where the cells go in the tab
    #[arg(long, default_value = "A1:*")]
    range: String,
    #[arg(long, default_value_t = ',')]
    delimiter: char,
    #[arg(long, default_value_t = '"')]
    quote: char,
    /// Clear the destination range first
    #[arg(long)]
    clean: bool,
    #[arg(long)]
    dry_run: bool,
    /// Use testing Google Sheets for writing
    #[arg(long)]
    use_testing: bool,
}

#[derive(Parser, Debug)]
pub struct BackupArgs {
    /// Spreadsheet ID or URL
    spreadsheet: String,
    /// Tabs to back up (all tabs when omitted)
    #[arg(long = "tab")]
    tabs: Vec<String>,
    /// Backup date (today when omitted)
    #[arg(long)]
    date: Option<NaiveDate>,
}

#[derive(Parser, Debug)]
pub struct ListOwnedArgs {
    user: String,
}

#[derive(Parser, Debug)]
pub struct MailArgs {
    /// Sending user (domain-wide delegation)
    sender: String,
    to: String,
    subject: String,
    #[arg(long, default_value = "")]
    body: String,
    #[arg(long)]
    cc: Vec<String>,
    #[arg(long)]
    reply_to: Option<String>,
    #[arg(long)]
    attachment: Option<PathBuf>,
    /// Move the sent message to the trash
    #[arg(long)]
    trash: bool,
}

impl Cli {
    /// Builds the configuration from `--config`, `--credentials` and `GAPI_*` variables.
    fn load_config(&self) -> Result<GapiConfig> {
        let mut config = match (&self.config, &self.credentials) {
            (Some(path), _) => GapiConfig::load(Some(path.as_path()))?,
            (None, Some(credentials)) => GapiConfig::new(credentials),
            (None, None) => GapiConfig::load(None)
                .context("Pass --config or --credentials, or set GAPI_CREDENTIALS")?,
        };
        if let Some(credentials) = &self.credentials {
            config.credentials = credentials.clone();
        }
        Ok(config)
    }
}

// --- Main Application Entry ---

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;
    commands::run(&cli.command, &config).await
}
