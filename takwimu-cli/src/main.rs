//! # Takwimu CLI (`takwimu`)
//!
//! Command-line front end for the answering pipeline.
//!
//! ## Usage
//!
//! ```bash
//! takwimu --config ./config/takwimu.yaml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `takwimu ingest <dir>` | Ingest `.pdf` and `.txt` reports from a directory |
//! | `takwimu ask "<question>"` | Answer a question against the ingested corpus |
//!
//! Credentials travel through the environment: `OPENAI_API_KEY` for
//! embeddings, plus `GROQ_API_KEY` / `OPENAI_API_KEY` / `GEMINI_API_KEY`
//! for the generation backends. A backend whose key is absent stays in its
//! priority slot but reports itself unavailable.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use takwimu_rag::{
    AnswerComposer, AssistantConfig, BackendSelector, EmbeddingProvider, ExtractorChain,
    FixedWindowChunker, InMemoryVectorStore, IngestionPipeline, OpenAiEmbeddingProvider,
    RawDocument, Retriever, SourceMeta, VectorStore,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "takwimu",
    version,
    about = "Grounded Q&A over Kenya's official statistical reports"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, global = true, default_value = "config/takwimu.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest .pdf and .txt reports from a directory into the vector store.
    Ingest {
        /// Directory to scan recursively.
        path: PathBuf,
    },
    /// Ask a question against the ingested corpus.
    Ask {
        /// The question to answer.
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("takwimu=info,takwimu_rag=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Command::Ingest { path } => ingest(&config, &path).await,
        Command::Ask { question } => ask(&config, &question).await,
    }
}

fn load_config(path: &Path) -> Result<AssistantConfig> {
    if path.exists() {
        let config = AssistantConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?;
        Ok(config)
    } else {
        info!(path = %path.display(), "config file not found, using defaults");
        Ok(AssistantConfig::default())
    }
}

fn build_embeddings(config: &AssistantConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider = OpenAiEmbeddingProvider::from_env(
        &config.embedding.model,
        Duration::from_secs(config.embedding.request_timeout_secs),
    )
    .context("set OPENAI_API_KEY to embed documents and queries")?;
    Ok(Arc::new(provider))
}

fn build_store(config: &AssistantConfig) -> Arc<dyn VectorStore> {
    #[cfg(feature = "qdrant")]
    if let Some(url) = &config.store.qdrant_url {
        match takwimu_rag::QdrantVectorStore::new(url) {
            Ok(store) => return Arc::new(store),
            Err(err) => warn!(%err, "cannot connect to qdrant, falling back to in-memory store"),
        }
    }
    #[cfg(not(feature = "qdrant"))]
    if config.store.qdrant_url.is_some() {
        warn!("qdrant_url is set but this binary was built without the 'qdrant' feature");
    }
    warn!("using the in-memory store; ingested data does not outlive this process");
    Arc::new(InMemoryVectorStore::new())
}

fn is_report_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf") || ext.eq_ignore_ascii_case("txt"))
}

/// Walk a directory and queue every readable report file for ingestion.
/// Unreadable files are logged and skipped, matching the per-document
/// degradation the pipeline itself applies.
fn collect_documents(root: &Path) -> Vec<RawDocument> {
    let mut documents = Vec::new();
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_report_file(path) {
            continue;
        }
        let source_name =
            path.file_stem().and_then(|s| s.to_str()).unwrap_or("unnamed").to_string();

        let is_pdf = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        let raw = if is_pdf {
            match std::fs::read(path) {
                Ok(bytes) => RawDocument::pdf(SourceMeta::named(source_name), bytes),
                Err(err) => {
                    warn!(file = %path.display(), %err, "cannot read file, skipping");
                    continue;
                }
            }
        } else {
            match std::fs::read_to_string(path) {
                Ok(text) => RawDocument::text(SourceMeta::named(source_name), text),
                Err(err) => {
                    warn!(file = %path.display(), %err, "cannot read file, skipping");
                    continue;
                }
            }
        };
        info!(file = %path.display(), "queued for ingestion");
        documents.push(raw);
    }
    documents
}

async fn ingest(config: &AssistantConfig, path: &Path) -> Result<()> {
    let documents = collect_documents(path);
    if documents.is_empty() {
        bail!("no .pdf or .txt files found under {}", path.display());
    }

    let chunker = Arc::new(FixedWindowChunker::new(
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    )?);
    let pipeline = IngestionPipeline::new(
        chunker,
        build_embeddings(config)?,
        build_store(config),
        ExtractorChain::default(),
        &config.store.collection_name,
        config.store.embed_batch_size,
    )?;

    let report = pipeline.ingest(documents).await?;

    println!(
        "Ingestion complete: {}/{} documents, {} chunks.",
        report.documents_succeeded, report.documents_attempted, report.chunks_created
    );
    for failure in &report.failures {
        println!("  failed: {} ({})", failure.source_name, failure.reason);
    }
    Ok(())
}

async fn ask(config: &AssistantConfig, question: &str) -> Result<()> {
    let retriever = Retriever::new(
        build_embeddings(config)?,
        build_store(config),
        &config.store.collection_name,
        config.retrieval.top_k,
        config.retrieval.distance_threshold,
    )?;
    let composer = AnswerComposer::new(
        retriever,
        BackendSelector::from_config(&config.generation)?,
        config.generation.max_tokens,
        config.generation.max_response_chars,
        config.generation.grounding_policy,
        config.generation.instruction.clone(),
    );

    let answer = composer.answer(question).await?;

    println!("{}", answer.text);
    if !answer.citations.is_empty() {
        println!("\nSources:");
        for citation in &answer.citations {
            println!("  {citation}");
        }
    }
    info!(backend = %answer.backend_used, "answer generated");
    Ok(())
}
