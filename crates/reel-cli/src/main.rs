//! reel CLI - Command-line interface for hybrid movie search.

mod app;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use reel_chunk::chunk_text;
use reel_core::{DocId, ReelConfig, Result};
use reel_embed::{preview_embedding, EmbeddingRole};
use reel_query::{
    document_search, evaluate, keyword_search, normalize_scores, AnswerStyle, QueryEnhancement,
    RerankMethod, RrfOptions,
};

use app::{App, Needs};

/// reel - Hybrid keyword and semantic movie search
#[derive(Parser)]
#[command(name = "reel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/reel/config.toml, then ./reel.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Cache database path (overrides the config)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Corpus JSON path (overrides the config)
    #[arg(long, global = true)]
    corpus: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the lexical index and chunk embeddings from the corpus
    Build,

    /// BM25 keyword search
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Term frequency of a single term in a document
    Tf {
        #[arg(allow_negative_numbers = true)]
        doc_id: DocId,
        term: String,
    },

    /// Smoothed inverse document frequency of a single term
    Idf { term: String },

    /// TF-IDF of a single term in a document
    Tfidf {
        #[arg(allow_negative_numbers = true)]
        doc_id: DocId,
        term: String,
    },

    /// BM25 inverse document frequency of a single term
    Bm25idf { term: String },

    /// BM25 saturated term-frequency score of a single term in a document
    Bm25tf {
        #[arg(allow_negative_numbers = true)]
        doc_id: DocId,
        term: String,

        /// Term-frequency saturation (default from config)
        #[arg(long)]
        k1: Option<f32>,

        /// Length normalization (default from config)
        #[arg(long)]
        b: Option<f32>,
    },

    /// Split text into overlapping sentence windows
    Chunk {
        text: String,

        /// Sentences per chunk
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Sentences shared between consecutive chunks
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Chunk-level semantic search
    SemanticSearch {
        query: String,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Semantic search over whole-document embeddings
    DocumentSearch {
        query: String,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Embed text as a document and show the leading components
    EmbedText {
        text: String,

        /// Components to show
        #[arg(long, default_value_t = 3)]
        head: usize,
    },

    /// Embed a search query and show the leading components
    EmbedQuery {
        query: String,

        /// Components to show
        #[arg(long, default_value_t = 5)]
        head: usize,
    },

    /// Load (or rebuild) both embedding caches and report their shape
    VerifyEmbeddings,

    /// Min-max normalize a list of scores
    Normalize {
        #[arg(required = true, allow_negative_numbers = true)]
        scores: Vec<f32>,
    },

    /// Weighted keyword + semantic search
    WeightedSearch {
        query: String,

        /// Keyword weight in [0, 1]
        #[arg(short, long)]
        alpha: Option<f32>,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Reciprocal rank fusion search
    RrfSearch {
        query: String,

        /// RRF smoothing constant
        #[arg(short)]
        k: Option<f32>,

        #[arg(short, long)]
        limit: Option<usize>,

        /// Rewrite the query first: spell, rewrite or expand
        #[arg(long)]
        enhance: Option<QueryEnhancement>,

        /// Rerank candidates: individual, batch or cross-encoder
        #[arg(long)]
        rerank_method: Option<RerankMethod>,
    },

    /// Answer a query from the top RRF results
    Answer {
        query: String,

        /// rag, summarize, citations or question
        #[arg(short, long, default_value = "rag")]
        style: AnswerStyle,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Score RRF search against the golden dataset
    Evaluate {
        /// Cutoff k for precision@k and recall@k
        #[arg(short, long)]
        limit: Option<usize>,

        /// Golden dataset path (overrides the config)
        #[arg(long)]
        golden: Option<PathBuf>,
    },
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config(cli: &Cli) -> Result<ReelConfig> {
    let mut config = match &cli.config {
        Some(path) => ReelConfig::load(path)?,
        None => ReelConfig::load_default()?,
    };
    if let Some(path) = &cli.database {
        config.storage.database_path = path.clone();
    }
    if let Some(path) = &cli.corpus {
        config.storage.corpus_path = path.clone();
    }
    Ok(config)
}

/// Print `value` as JSON or through `render`.
fn emit<T: Serialize>(json: bool, value: &T, render: impl FnOnce(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", render(value));
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error [{}]: {}", e.error_code(), e);
        if e.needs_rebuild() {
            eprintln!("Run 'reel build' to (re)create the index and embeddings.");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let json = cli.json;
    let default_limit = config.search.default_limit;

    match cli.command {
        Commands::Build => {
            let corpus = config.storage.corpus_path.clone();
            let summary = App::open(config)?.build().await?;
            println!(
                "Indexed {} documents ({} terms, {} chunks) from {}",
                summary.documents,
                summary.terms,
                summary.chunks,
                corpus.display()
            );
        }
        Commands::Search { query, limit } => {
            let snippet_chars = config.chunking.snippet_chars;
            let lexical = App::open(config)?.lexical()?;
            let results =
                keyword_search(&lexical, &query, limit.unwrap_or(default_limit), snippet_chars)?;
            emit(json, &results, output::format_results)?;
        }
        Commands::Tf { doc_id, term } => {
            let index = App::open(config)?.lexical()?;
            let tf = index.get_term_frequency(doc_id, &term)?;
            println!("Term frequency of '{}' in document {}: {}", term, doc_id, tf);
        }
        Commands::Idf { term } => {
            let index = App::open(config)?.lexical()?;
            println!("Inverse document frequency of '{}': {:.2}", term, index.get_idf(&term)?);
        }
        Commands::Tfidf { doc_id, term } => {
            let index = App::open(config)?.lexical()?;
            let score = index.tf_idf(doc_id, &term)?;
            println!("TF-IDF score of '{}' in document {}: {:.2}", term, doc_id, score);
        }
        Commands::Bm25idf { term } => {
            let index = App::open(config)?.lexical()?;
            println!("BM25 IDF score of '{}': {:.2}", term, index.get_bm25_idf(&term)?);
        }
        Commands::Bm25tf { doc_id, term, k1, b } => {
            let params = config.lexical;
            let index = App::open(config)?.lexical()?;
            let score = index.get_bm25_term_score(
                doc_id,
                &term,
                k1.unwrap_or(params.k1),
                b.unwrap_or(params.b),
            )?;
            println!("BM25 TF score of '{}' in document {}: {:.2}", term, doc_id, score);
        }
        Commands::Chunk {
            text,
            chunk_size,
            overlap,
        } => {
            let chunks = chunk_text(
                &text,
                chunk_size.unwrap_or(config.chunking.chunk_size),
                overlap.unwrap_or(config.chunking.overlap),
            )?;
            emit(json, &chunks, |c| output::format_chunks(c))?;
        }
        Commands::SemanticSearch { query, limit } => {
            let engine = App::open(config)?.engine(Needs::default()).await?;
            let results = engine
                .semantic_search(&query, limit.unwrap_or(default_limit))
                .await?;
            emit(json, &results, output::format_results)?;
        }
        Commands::DocumentSearch { query, limit } => {
            let snippet_chars = config.chunking.snippet_chars;
            let index = App::open(config)?.documents().await?;
            let results =
                document_search(&index, &query, limit.unwrap_or(default_limit), snippet_chars)
                    .await?;
            emit(json, &results, output::format_results)?;
        }
        Commands::EmbedText { text, head } => {
            let embedder = App::open(config)?.embedder()?;
            let preview =
                preview_embedding(embedder.as_ref(), &text, EmbeddingRole::Document, head).await?;
            emit(json, &preview, output::format_preview)?;
        }
        Commands::EmbedQuery { query, head } => {
            let embedder = App::open(config)?.embedder()?;
            let preview =
                preview_embedding(embedder.as_ref(), &query, EmbeddingRole::Query, head).await?;
            emit(json, &preview, output::format_preview)?;
        }
        Commands::VerifyEmbeddings => {
            let report = App::open(config)?.verify_embeddings().await?;
            emit(json, &report, output::format_embedding_report)?;
        }
        Commands::Normalize { scores } => {
            let normalized = normalize_scores(&scores);
            if json {
                println!("{}", serde_json::to_string(&normalized)?);
            } else {
                for score in normalized {
                    println!("* {:.4}", score);
                }
            }
        }
        Commands::WeightedSearch {
            query,
            alpha,
            limit,
        } => {
            let alpha = alpha.unwrap_or(config.search.hybrid_alpha);
            let engine = App::open(config)?.engine(Needs::default()).await?;
            let results = engine
                .weighted_search(&query, alpha, limit.unwrap_or(default_limit))
                .await?;
            emit(json, &results, output::format_results)?;
        }
        Commands::RrfSearch {
            query,
            k,
            limit,
            enhance,
            rerank_method,
        } => {
            let k = k.unwrap_or(config.search.rrf_k);
            let needs = Needs {
                llm: enhance.is_some()
                    || matches!(
                        rerank_method,
                        Some(RerankMethod::Individual | RerankMethod::Batch)
                    ),
                scorer: rerank_method == Some(RerankMethod::CrossEncoder),
            };
            let options = RrfOptions {
                enhancement: enhance,
                rerank: rerank_method,
            };

            let engine = App::open(config)?.engine(needs).await?;
            let results = engine
                .rrf_search(&query, k, limit.unwrap_or(default_limit), &options)
                .await?;
            emit(json, &results, output::format_results)?;
        }
        Commands::Answer {
            query,
            style,
            limit,
        } => {
            let needs = Needs {
                llm: true,
                scorer: false,
            };
            let engine = App::open(config)?.engine(needs).await?;
            let answer = engine
                .answer(&query, style, limit.unwrap_or(default_limit))
                .await?;
            emit(json, &answer, output::format_answer)?;
        }
        Commands::Evaluate { limit, golden } => {
            let mut config = config;
            if let Some(path) = golden {
                config.storage.golden_path = path;
            }
            let app = App::open(config)?;
            let dataset = app.golden_dataset()?;
            let engine = app.engine(Needs::default()).await?;
            let report = evaluate(&engine, &dataset, limit.unwrap_or(default_limit)).await?;
            emit(json, &report, output::format_report)?;
        }
    }

    Ok(())
}
