#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the tender watch toolchain.
//!
//! `serve` runs the API server with its background refresh scheduler.
//! The other subcommands are one-shot operations against the UFSA portal,
//! configured through the same environment variables as the server.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tender_watch_scraper::{UfsaClient, UpstreamConfig};
use tender_watch_tender_models::{Category, DocumentKind, Snapshot};

/// Monitor UFSA public tender listings.
#[derive(Parser)]
#[command(name = "tender_watch")]
#[command(about = "Monitor UFSA public tender listings")]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Start the API server and the refresh scheduler.
    Serve,

    /// Fetch every category once and print or store the snapshot.
    Scrape {
        /// Write the snapshot JSON to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also save the snapshot to the configured persistent store.
        #[arg(long)]
        persist: bool,
    },

    /// Check whether the portal is reachable.
    Probe,

    /// Fetch the detail page of one tender.
    Details {
        /// Category slug: `abertos`, `adjudicados` or `ajustes-directos`.
        #[arg(value_parser = parse_category)]
        category: Category,

        /// Tender reference.
        reference: String,
    },

    /// Download a tender document.
    Document {
        /// Tender reference.
        reference: String,

        /// Which document to fetch (`document` or `announcement`).
        #[arg(long, default_value = "document")]
        kind: DocumentKind,

        /// Destination file (defaults to the portal's file name).
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn parse_category(slug: &str) -> Result<Category, String> {
    Category::from_slug(slug).ok_or_else(|| {
        let known: Vec<&str> = Category::ALL.iter().map(|c| c.slug()).collect();
        format!("unknown category '{slug}' (expected one of {})", known.join(", "))
    })
}

/// Initializes logging and builds a portal client for one-shot commands.
/// `serve` sets up its own logging.
fn connect() -> Result<UfsaClient, Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    Ok(UfsaClient::new(UpstreamConfig::from_env())?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            // The server uses actix-web's runtime, so it runs in a blocking
            // task to avoid nesting runtimes.
            tokio::task::spawn_blocking(|| {
                actix_web::rt::System::new().block_on(tender_watch_server::run_server())
            })
            .await??;
            Ok(())
        }
        Commands::Scrape { output, persist } => cmd_scrape(&connect()?, output, persist).await,
        Commands::Probe => cmd_probe(&connect()?).await,
        Commands::Details {
            category,
            reference,
        } => cmd_details(&connect()?, category, &reference).await,
        Commands::Document {
            reference,
            kind,
            output,
        } => cmd_document(&connect()?, &reference, kind, output).await,
    }
}

/// Fetches every category and emits the resulting snapshot.
async fn cmd_scrape(
    client: &UfsaClient,
    output: Option<PathBuf>,
    persist: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    client.ensure_available().await?;

    let mut data = BTreeMap::new();
    for category in Category::ALL {
        let records = client.fetch_category(category).await?;
        log::info!("{category}: {} records", records.len());
        data.insert(category, records);
    }
    let snapshot = Snapshot::new(data, chrono::Utc::now());

    if persist {
        let gateway = tender_watch_persistence::gateway_from_env()?;
        if !gateway.save(&snapshot).await {
            return Err("Failed to save the snapshot".into());
        }
    }

    let json = serde_json::to_string_pretty(&snapshot)?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, json).await?;
            println!(
                "Wrote {} records to {}",
                snapshot.total_records(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Reports portal availability.
async fn cmd_probe(client: &UfsaClient) -> Result<(), Box<dyn std::error::Error>> {
    client.ensure_available().await?;
    println!("{} is available", client.config().base_url);
    Ok(())
}

/// Prints the parsed detail page as JSON.
async fn cmd_details(
    client: &UfsaClient,
    category: Category,
    reference: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let details = client.fetch_details(category, reference).await?;
    println!("{}", serde_json::to_string_pretty(&details)?);
    Ok(())
}

/// Saves a downloaded document to disk.
async fn cmd_document(
    client: &UfsaClient,
    reference: &str,
    kind: DocumentKind,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let document = client.fetch_document(reference, kind).await?;
    let path = output.unwrap_or_else(|| PathBuf::from(&document.file_name));
    tokio::fs::write(&path, &document.bytes).await?;
    println!(
        "Saved {} ({} bytes, {}) to {}",
        document.file_name,
        document.bytes.len(),
        document.content_type,
        path.display()
    );
    Ok(())
}
