//! nlq CLI - Ask natural-language questions against a configured database.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

use nlq_core::{
    CollectionTag, Document, Embedder, NlqConfig, NlqError, Result, SchemaLoader,
};
use nlq_embed::{MockEmbedder, OnnxEmbedder};
use nlq_exec::PgExecutor;
use nlq_flow::{ConversationState, RunOutcome, WorkflowOrchestrator};
use nlq_index::DocumentStore;
use nlq_llm::{HttpCompletionClient, SqlGenerator};
use nlq_retrieve::HybridRetriever;
use nlq_schema::{PgIntrospector, SchemaProvider};

/// nlq - natural-language questions answered as SQL plus a chart
#[derive(Parser)]
#[command(name = "nlq")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.config/nlq/config.toml, then ./nlq.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question against the configured data source
    Ask {
        /// The question to answer
        question: String,

        /// JSONL knowledge files loaded before answering (repeatable)
        #[arg(short, long)]
        docs: Vec<PathBuf>,
    },

    /// Load a JSONL knowledge file and report what it contains
    Sync {
        /// Path to the JSONL file
        path: PathBuf,
    },

    /// Print the introspected schema of the configured data source
    Schema {
        /// Restrict to these tables
        #[arg(short, long, value_delimiter = ',')]
        tables: Vec<String>,
    },
}

/// One line of a knowledge JSONL file.
#[derive(Deserialize)]
struct SyncRecord {
    collection: CollectionTag,
    content: String,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config(path: Option<&PathBuf>) -> Result<NlqConfig> {
    match path {
        Some(path) => NlqConfig::load(path),
        None => NlqConfig::load_default(),
    }
}

fn build_embedder(config: &NlqConfig) -> Arc<dyn Embedder + Send + Sync> {
    if !config.embedding.enabled {
        return Arc::new(MockEmbedder::unavailable());
    }
    match OnnxEmbedder::load(&config.embedding) {
        Ok(embedder) => Arc::new(embedder),
        Err(e) => {
            warn!("Embedding model unavailable, retrieval is keyword-only: {}", e);
            Arc::new(MockEmbedder::unavailable())
        }
    }
}

fn load_documents(path: &PathBuf) -> Result<Vec<Document>> {
    let content = fs::read_to_string(path)?;
    let mut documents = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: SyncRecord = serde_json::from_str(line).map_err(|e| {
            NlqError::config(format!(
                "{}:{}: invalid knowledge record: {}",
                path.display(),
                line_no + 1,
                e
            ))
        })?;
        let mut document = Document::new(record.collection, &record.content);
        document.metadata = record.metadata;
        documents.push(document);
    }
    Ok(documents)
}

async fn populate_store(
    store: &DocumentStore,
    paths: &[PathBuf],
    embedder: &Arc<dyn Embedder + Send + Sync>,
) -> Result<()> {
    let mut by_collection: HashMap<CollectionTag, Vec<Document>> = HashMap::new();
    for path in paths {
        for document in load_documents(path)? {
            by_collection
                .entry(document.collection)
                .or_default()
                .push(document);
        }
    }
    for (tag, documents) in by_collection {
        store.replace(tag, documents, embedder).await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Ask { question, docs } => {
            ask(&config, &question, &docs).await?;
        }
        Commands::Sync { path } => {
            sync(&config, &path).await?;
        }
        Commands::Schema { tables } => {
            schema(&config, &tables).await?;
        }
    }

    Ok(())
}

async fn ask(config: &NlqConfig, question: &str, docs: &[PathBuf]) -> Result<()> {
    let embedder = build_embedder(config);

    let store = Arc::new(DocumentStore::new());
    populate_store(&store, docs, &embedder).await?;

    let retriever = Arc::new(HybridRetriever::new(
        Arc::clone(&store),
        embedder,
        config.retrieval.clone(),
    ));

    let provider = Arc::new(SchemaProvider::new(
        PgIntrospector::new(config.data_source.clone()),
        &config.data_source.id,
        Duration::from_secs(config.data_source.schema_ttl_secs),
        config.data_source.sample_rows,
    ));

    let client = HttpCompletionClient::new(config.llm.clone())?;
    let generator = SqlGenerator::new(Arc::new(client));
    let executor = Arc::new(PgExecutor::new(config.data_source.clone()));

    let orchestrator = WorkflowOrchestrator::new(
        provider,
        retriever,
        generator,
        executor,
        config.retrieval.clone(),
        config.workflow.clone(),
    );

    let mut conversation = ConversationState::new(config.workflow.history_turns);
    let run = orchestrator.answer(&mut conversation, question).await;

    match run.outcome {
        RunOutcome::Done {
            sql,
            results,
            chart,
        } => {
            println!("SQL: {}\n", sql);
            println!("Chart: {:?} (x: {:?}, y: {:?})\n", chart.kind, chart.x, chart.y);
            println!("{}", results.columns.join(" | "));
            for row in &results.rows {
                let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                println!("{}", cells.join(" | "));
            }
            if results.truncated {
                println!("(truncated at {} rows)", results.row_count());
            }
        }
        RunOutcome::Failed {
            reason,
            last_sql,
            errors,
        } => {
            eprintln!("Failed after {} attempt(s): {}", run.trace.attempts, reason);
            if let Some(sql) = last_sql {
                eprintln!("Last SQL: {}", sql);
            }
            for error in errors {
                eprintln!("  - {}", error);
            }
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn sync(config: &NlqConfig, path: &PathBuf) -> Result<()> {
    let embedder = build_embedder(config);
    let documents = load_documents(path)?;

    let store = DocumentStore::new();
    let mut by_collection: HashMap<CollectionTag, Vec<Document>> = HashMap::new();
    for document in documents {
        by_collection
            .entry(document.collection)
            .or_default()
            .push(document);
    }
    for (tag, documents) in by_collection {
        store.replace(tag, documents, &embedder).await;
    }

    for tag in CollectionTag::ALL {
        println!("{}: {} document(s)", tag, store.len(tag).await);
    }
    if !embedder.available() {
        println!("(embedder unavailable - documents indexed for keyword search only)");
    }
    Ok(())
}

async fn schema(config: &NlqConfig, tables: &[String]) -> Result<()> {
    let provider = SchemaProvider::new(
        PgIntrospector::new(config.data_source.clone()),
        &config.data_source.id,
        Duration::from_secs(config.data_source.schema_ttl_secs),
        config.data_source.sample_rows,
    );

    let filter = if tables.is_empty() { None } else { Some(tables) };
    let snapshot = provider.load_schema(filter).await?;
    print!("{}", snapshot.render());
    Ok(())
}
