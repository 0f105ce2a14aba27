//! # ragline CLI
//!
//! Command-line interface for the ragline retrieval-augmented execution
//! pipeline: ingest documents into a per-owner vector index, search it,
//! and run templated prompts grounded in retrieved context.
//!
//! ## Commands
//!
//! - `ragline ingest <FILE>` - extract, chunk, embed, and index a document
//! - `ragline query <QUERY>` - search the owner's index
//! - `ragline ask <QUESTION>` - retrieve context and run a completion
//! - `ragline delete <ID>` - remove a document and its index entries
//! - `ragline status` - show the owner's index statistics
//!
//! ## Examples
//!
//! ```bash
//! ragline ingest handbook.pdf
//! ragline query "vacation policy"
//! ragline ask "How many vacation days do I get?" --format json
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ragline_chunker::RecursiveChunker;
use ragline_core::{DocumentFormat, TemplateVars};
use ragline_embed::{EmbedderPool, OpenAiEmbedder};
use ragline_execute::{ExecutionEngine, OpenAiCompletions};
use ragline_extract::ExtractorRegistry;
use ragline_index::{DocumentRegistry, PipelineService};
use ragline_retrieve::ContextRetriever;
use ragline_store::FlatIndex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod config;

use config::{data_dir, Config};

#[derive(Parser)]
#[command(name = "ragline")]
#[command(about = "Retrieval-augmented execution over per-owner document indexes")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/ragline/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Owner whose documents and index to operate on
    #[arg(short, long, global = true, default_value = "default")]
    owner: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a document into the owner's index
    Ingest {
        /// File to ingest
        file: PathBuf,

        /// Declared format (pdf, docx, text, markdown); inferred from the
        /// file name when omitted
        #[arg(long)]
        format: Option<String>,
    },

    /// Search the owner's index
    Query {
        /// Query string
        query: String,

        /// Maximum results
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Restrict the search to these document ids
        #[arg(long = "document")]
        documents: Vec<Uuid>,
    },

    /// Retrieve context and run a completion
    Ask {
        /// The question to answer
        question: String,

        /// Prompt template with {{variable}} placeholders
        /// (default: "{{question}}")
        #[arg(long)]
        template: Option<String>,

        /// Template variable as name=value (repeatable)
        #[arg(long = "var", value_parser = parse_key_val)]
        vars: Vec<(String, String)>,
    },

    /// Delete a document and its index entries
    Delete {
        /// Document id
        id: Uuid,
    },

    /// Show the owner's index status
    Status,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))
}

/// Output structure for ingest results.
#[derive(Serialize)]
struct IngestOutput {
    id: String,
    name: String,
    status: String,
    chunks: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Output structure for query results.
#[derive(Serialize)]
struct QueryOutput {
    query: String,
    results: Vec<ResultItem>,
}

#[derive(Serialize)]
struct ResultItem {
    document_id: String,
    similarity: f32,
    rerank_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    section: Option<String>,
    content: String,
}

/// Output structure for ask results.
#[derive(Serialize)]
struct AskOutput {
    answer: String,
    model: String,
    total_tokens: u32,
    latency_ms: u64,
    sources: Vec<String>,
}

/// Output structure for status.
#[derive(Serialize)]
struct StatusOutput {
    owner: String,
    total_vectors: usize,
    total_documents: usize,
    dimension: usize,
}

/// Resolve the document format from a declared tag or the file name.
fn detect_format(path: &Path, declared: Option<&str>) -> Result<DocumentFormat> {
    if let Some(tag) = declared {
        return DocumentFormat::from_extension(tag)
            .with_context(|| format!("unknown format tag: {tag}"));
    }

    if let Some(format) = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(DocumentFormat::from_extension)
    {
        return Ok(format);
    }

    // fall back to mime inference for unusual extensions
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    match mime.essence_str() {
        "application/pdf" => Ok(DocumentFormat::Pdf),
        "text/markdown" => Ok(DocumentFormat::Markdown),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            Ok(DocumentFormat::Docx)
        }
        essence if essence.starts_with("text/") => Ok(DocumentFormat::PlainText),
        essence => bail!("cannot infer a supported format from {} ({essence})", path.display()),
    }
}

/// Create the standard component stack.
fn create_components(config: &Config) -> Result<(Arc<PipelineService>, ContextRetriever)> {
    let api_key = config.api_key()?;

    let embedder = OpenAiEmbedder::new(
        &api_key,
        &config.service.embed_base_url,
        config.embedding.clone(),
    )?;
    let pool = Arc::new(EmbedderPool::new(
        Arc::new(embedder),
        config.service.max_concurrent_embeds,
        config.embedding.batch_size,
    ));

    let index_root = data_dir()
        .context("failed to resolve data directory")?
        .join("indexes");
    let index = Arc::new(FlatIndex::with_root(config.embedding.dimension, index_root));

    let pipeline = Arc::new(PipelineService::new(
        Arc::new(ExtractorRegistry::with_defaults()),
        Arc::new(RecursiveChunker::new()),
        pool.clone(),
        index.clone(),
        Arc::new(DocumentRegistry::new()),
        config.chunking.clone(),
    ));
    let retriever = ContextRetriever::new(pool, index, config.retrieval.clone());

    Ok((pipeline, retriever))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Ingest { file, format } => {
            if !file.exists() {
                bail!("file does not exist: {}", file.display());
            }
            let format = detect_format(&file, format.as_deref())?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;

            let (pipeline, _) = create_components(&config)?;
            let document = pipeline
                .ingest_document(&cli.owner, &name, format, &bytes)
                .await?;
            if document.status == ragline_core::DocumentStatus::Indexed {
                pipeline.save_index(&cli.owner).await?;
            }

            let output = IngestOutput {
                id: document.id.to_string(),
                name: document.name.clone(),
                status: format!("{:?}", document.status).to_lowercase(),
                chunks: document.chunk_count,
                error: document.error.clone(),
            };
            match cli.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
                OutputFormat::Text => {
                    println!("{} -> {} ({} chunks)", output.name, output.status, output.chunks);
                    if let Some(error) = &output.error {
                        println!("  error: {error}");
                    }
                    println!("  id: {}", output.id);
                }
            }
        }

        Commands::Query {
            query,
            limit,
            documents,
        } => {
            let (_, retriever) = create_components(&config)?;
            let filter = if documents.is_empty() {
                None
            } else {
                Some(documents)
            };
            let result = retriever.retrieve(&cli.owner, &query, filter).await?;

            match cli.format {
                OutputFormat::Json => {
                    let output = QueryOutput {
                        query: query.clone(),
                        results: result
                            .chunks
                            .iter()
                            .take(limit)
                            .map(|chunk| ResultItem {
                                document_id: chunk.document_id.to_string(),
                                similarity: chunk.similarity,
                                rerank_score: chunk.rerank_score,
                                page: chunk.page,
                                section: chunk.section.clone(),
                                content: truncate(&chunk.content, 200),
                            })
                            .collect(),
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    println!("Query: {query}\n");
                    if result.chunks.is_empty() {
                        println!("No results found.");
                    } else {
                        for (i, chunk) in result.chunks.iter().take(limit).enumerate() {
                            println!(
                                "{}. {} (similarity: {:.3}, rerank: {:.3})",
                                i + 1,
                                chunk.document_id,
                                chunk.similarity,
                                chunk.rerank_score
                            );
                            if let Some(page) = chunk.page {
                                println!("   Page: {page}");
                            }
                            if let Some(ref section) = chunk.section {
                                println!("   Section: {section}");
                            }
                            println!("   {}", truncate(&chunk.content, 100));
                            println!();
                        }
                    }
                }
            }
        }

        Commands::Ask {
            question,
            template,
            vars,
        } => {
            let (_, retriever) = create_components(&config)?;
            let result = retriever.retrieve(&cli.owner, &question, None).await?;
            info!(
                chunks = result.context.chunk_ids.len(),
                context_tokens = result.context.token_count,
                "retrieved context"
            );

            let client = OpenAiCompletions::new(
                &config.api_key()?,
                &config.service.completion_base_url,
                config.execution.clone(),
            )?;
            let engine = ExecutionEngine::new(Arc::new(client), config.execution.clone());

            let template = template.unwrap_or_else(|| "{{question}}".to_string());
            let mut template_vars: TemplateVars = vars.into_iter().collect();
            template_vars.insert("question".to_string(), question);

            let record = engine
                .execute(&template, &template_vars, Some(&result.context))
                .await?;

            match cli.format {
                OutputFormat::Json => {
                    let output = AskOutput {
                        answer: record.response_text.clone(),
                        model: record.model.clone(),
                        total_tokens: record.total_tokens,
                        latency_ms: record.latency_ms,
                        sources: record
                            .used_chunk_ids
                            .iter()
                            .map(Uuid::to_string)
                            .collect(),
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    println!("{}", record.response_text);
                    println!();
                    println!(
                        "[{} | {} tokens | {} ms | {} sources]",
                        record.model,
                        record.total_tokens,
                        record.latency_ms,
                        record.used_chunk_ids.len()
                    );
                }
            }
        }

        Commands::Delete { id } => {
            let (pipeline, _) = create_components(&config)?;
            let document = pipeline.delete_document(&cli.owner, id).await?;
            pipeline.save_index(&cli.owner).await?;
            match cli.format {
                OutputFormat::Json => {
                    println!(r#"{{"deleted": "{}"}}"#, document.id);
                }
                OutputFormat::Text => {
                    println!("Deleted {} ({})", document.name, document.id);
                }
            }
        }

        Commands::Status => {
            let config_dim = config.embedding.dimension;
            let index_root = data_dir()
                .context("failed to resolve data directory")?
                .join("indexes");
            let index = FlatIndex::with_root(config_dim, index_root);
            let stats = ragline_core::VectorIndex::stats(&index, &cli.owner).await?;

            match cli.format {
                OutputFormat::Json => {
                    let output = StatusOutput {
                        owner: cli.owner.clone(),
                        total_vectors: stats.total_vectors,
                        total_documents: stats.total_documents,
                        dimension: stats.dimension,
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => {
                    println!("Owner: {}", cli.owner);
                    println!("Documents: {}", stats.total_documents);
                    println!("Vectors: {}", stats.total_vectors);
                    println!("Dimension: {}", stats.dimension);
                }
            }
        }
    }

    Ok(())
}

/// Truncate to a display length on a char boundary.
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
