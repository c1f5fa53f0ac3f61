//! The `waypoint` command-line launcher: set up the store, ingest markdown
//! travel documents, and run similarity searches against the result.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use tracing::info;
use waypoint_rag::{
    ChunkStore, IngestPipeline, IngestReport, OpenAiEmbedder, PgChunkStore, PipelineConfig,
    SearchHit, SearchRequest,
};

/// Queries run by the interactive prompt when the input line is empty.
const DEMO_QUERIES: &[&str] = &[
    "How do I get to Mount Rigi?",
    "Jungfraujoch ticket prices",
    "One day in Lucerne",
    "Which Swiss travel pass should I buy?",
    "Zurich airport to the city centre",
    "Where to stay in Interlaken",
];

#[derive(Parser)]
#[command(name = "waypoint", version, about = "Markdown travel-content ingestion and vector search")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the store table and indexes
    Setup,
    /// Parse, chunk, embed, and upload markdown documents
    Ingest {
        /// Directory containing markdown files
        #[arg(long, default_value = "markdown_files")]
        dir: PathBuf,
        /// Delete existing rows before uploading (re-running without this
        /// appends duplicates)
        #[arg(long)]
        clear: bool,
    },
    /// Similarity-search the stored content
    Search {
        /// Query text; omit for an interactive prompt
        query: Option<String>,
        /// Maximum number of results
        #[arg(long, default_value_t = 5)]
        limit: usize,
        /// Minimum similarity for a result to qualify
        #[arg(long, default_value_t = 0.7)]
        threshold: f32,
        /// Restrict results to one category
        #[arg(long)]
        category: Option<String>,
    },
    /// Show the number of stored chunks
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env()?;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let store = Arc::new(PgChunkStore::connect(&database_url, &config.table_name).await?);

    match cli.command {
        Command::Setup => {
            store.setup(config.embedding_dimensions).await?;
            println!("store ready: table '{}'", config.table_name);
        }
        Command::Ingest { dir, clear } => {
            if clear {
                let removed = store.clear().await?;
                info!(removed, "cleared existing rows");
            }
            let pipeline = build_pipeline(config, store)?;
            let report = pipeline.run(&dir).await?;
            print_report(&report);
            if !report.upload_complete {
                bail!(
                    "upload incomplete: {}/{} chunks written",
                    report.chunks_uploaded,
                    report.chunks_embedded
                );
            }
        }
        Command::Search { query, limit, threshold, category } => {
            let pipeline = build_pipeline(config, store)?;
            let request = SearchRequest { limit, threshold, category };
            match query {
                Some(query) => run_search(&pipeline, &query, &request).await,
                None => interactive_search(&pipeline, &request).await?,
            }
        }
        Command::Stats => {
            println!("{} chunks stored", store.count().await?);
        }
    }

    Ok(())
}

fn build_pipeline(config: PipelineConfig, store: Arc<PgChunkStore>) -> anyhow::Result<IngestPipeline> {
    let embedder = OpenAiEmbedder::from_env()?
        .with_model(config.embedding_model.clone())
        .with_dimensions(config.embedding_dimensions);
    let pipeline = IngestPipeline::builder()
        .config(config)
        .embedder(Arc::new(embedder))
        .store(store)
        .build()?;
    Ok(pipeline)
}

fn print_report(report: &IngestReport) {
    println!("documents processed: {}", report.documents_processed);
    println!("documents skipped:   {}", report.documents_skipped);
    println!("chunks created:      {}", report.chunks_created);
    println!("chunks embedded:     {}", report.chunks_embedded);
    println!("chunks dropped:      {}", report.chunks_dropped);
    println!("chunks uploaded:     {}", report.chunks_uploaded);
    println!("parent links:        {}", report.links_created);
    if report.link_failures > 0 {
        println!("link failures:       {}", report.link_failures);
    }
    println!("rows in store:       {}", report.store_total);
}

async fn run_search(pipeline: &IngestPipeline, query: &str, request: &SearchRequest) {
    println!("searching: '{query}'");
    match pipeline.search(query, request).await {
        Ok(hits) if hits.is_empty() => println!("no results"),
        Ok(hits) => {
            for (rank, hit) in hits.iter().enumerate() {
                print_hit(rank + 1, hit);
            }
        }
        Err(e) => eprintln!("search failed: {e}"),
    }
}

fn print_hit(rank: usize, hit: &SearchHit) {
    let section = hit.section_title.as_deref().unwrap_or("main");
    let preview: String = hit.content.chars().take(200).collect();
    let ellipsis = if hit.content.chars().count() > 200 { "…" } else { "" };

    println!("{rank}. [{:.3}] {} > {}", hit.similarity, hit.title, section);
    println!("   {} (chunk {}/{})", hit.file_name, hit.chunk_index + 1, hit.total_chunks);
    println!("   {preview}{ellipsis}");
    println!();
}

async fn interactive_search(
    pipeline: &IngestPipeline,
    request: &SearchRequest,
) -> anyhow::Result<()> {
    let mut editor = rustyline::DefaultEditor::new()?;
    println!("Enter a query (empty line runs the demo set, Ctrl-D exits)");

    loop {
        match editor.readline("query> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    for query in DEMO_QUERIES {
                        run_search(pipeline, query, request).await;
                        println!("{}", "=".repeat(72));
                    }
                } else {
                    editor.add_history_entry(line).ok();
                    run_search(pipeline, line, request).await;
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
