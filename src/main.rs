use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use cis_mapper::record::MergedRecord;
use cis_mapper::{export, extract, fetch};

#[derive(Parser)]
#[command(name = "cis_mapper", about = "CIS benchmark/control mapping scraper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract control mappings from a saved workbench HTML page
    Scrape {
        /// Path to the saved HTML file
        #[arg(short, long)]
        file: PathBuf,
        /// Skip fetching per-recommendation detail pages
        #[arg(long)]
        skip_details: bool,
    },
    /// Convert a previously written <file>.json into <file>.json.csv
    Csv {
        /// Base path used when scraping (reads <file>.json)
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Scrape + csv in one pipeline
    Run {
        /// Path to the saved HTML file
        #[arg(short, long)]
        file: PathBuf,
        /// Skip fetching per-recommendation detail pages
        #[arg(long)]
        skip_details: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scrape { file, skip_details } => {
            scrape(&file, skip_details).await?;
            Ok(())
        }
        Commands::Csv { file } => {
            let out = export::json_to_csv(&json_path_for(&file))?;
            println!("Wrote {}", out.display());
            Ok(())
        }
        Commands::Run { file, skip_details } => {
            let json_path = scrape(&file, skip_details).await?;
            let out = export::json_to_csv(&json_path)?;
            println!("Wrote {}", out.display());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

fn json_path_for(file: &Path) -> PathBuf {
    PathBuf::from(format!("{}.json", file.display()))
}

/// Parse the mapping page, optionally enrich each record from its detail
/// page, and write the result to `<file>.json`. Returns the path written.
async fn scrape(file: &Path, skip_details: bool) -> Result<PathBuf> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let records = extract::parse_control_table(&html);
    println!("Extracted {} records from {}", records.len(), file.display());

    let merged: Vec<MergedRecord> = if skip_details {
        records
            .into_iter()
            .map(|control| MergedRecord {
                control,
                detail: None,
            })
            .collect()
    } else {
        let cfg = fetch::FetchConfig::from_env()?;
        let client = reqwest::Client::new();
        fetch::enrich_records(&client, &cfg, records).await?
    };

    let json_path = json_path_for(file);
    std::fs::write(&json_path, serde_json::to_string_pretty(&merged)?)
        .with_context(|| format!("failed to write {}", json_path.display()))?;
    println!("Wrote {} records to {}", merged.len(), json_path.display());

    Ok(json_path)
}
