use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use cis_mapper::{answer, convert, store};

#[derive(Parser)]
#[command(
    name = "doc_index",
    about = "PDF to markdown conversion and local retrieval index"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a PDF to a markdown file
    Md {
        /// Path to the PDF file
        #[arg(short, long)]
        input: PathBuf,
        /// Path of the markdown file to write
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Build and persist the retrieval index under ./storage
    Index {
        /// Path to the PDF file
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Query the persisted index and answer via the local model
    Query {
        /// Query to run against the indexed document
        #[arg(short, long)]
        query: String,
        /// Number of passages handed to the model
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,
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

    let cli = Cli::parse();

    match cli.command {
        Commands::Md { input, output } => {
            convert::pdf_to_markdown(&input, &output)?;
            println!("Wrote {}", output.display());
        }
        Commands::Index { input } => {
            match store::build_index(&input, Path::new(store::STORAGE_DIR)) {
                Ok(chunks) => println!("Indexed {} chunks", chunks),
                Err(e) => println!("Error: {:#}", e),
            }
        }
        Commands::Query { query, top_k } => {
            println!("{}", query);
            let index = store::DocIndex::open(Path::new(store::STORAGE_DIR))?;
            let passages = index.search(&query, top_k)?;
            let response = answer::answer_query(&query, &passages).await?;
            println!("{}", response);
        }
    }

    Ok(())
}
