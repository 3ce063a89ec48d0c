use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use retrieval::persist::{load_snapshot, save_snapshot, SnapshotPaths};
use retrieval::store::Metadata;
use retrieval::{Engine, EngineConfig, NewDocument, TokenizerConfig};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    #[serde(default)]
    id: Option<String>,
    #[serde(alias = "content")]
    page_content: String,
    #[serde(default)]
    metadata: Metadata,
}

impl From<InputDoc> for NewDocument {
    fn from(doc: InputDoc) -> Self {
        NewDocument { content: doc.page_content, metadata: doc.metadata, id: doc.id }
    }
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Load documents into a BM25 snapshot and query it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a snapshot from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output snapshot directory
        #[arg(long)]
        output: String,
        /// Supplementary vocabulary for Chinese segmentation
        #[arg(long)]
        user_dict: Option<PathBuf>,
    },
    /// Run a query against a snapshot and print the results as JSON
    Search {
        #[arg(long)]
        snapshot: String,
        #[arg(long)]
        query: String,
        /// Number of results (defaults to the engine default)
        #[arg(long)]
        k: Option<usize>,
        #[arg(long, default_value_t = retrieval::config::BM25_K1)]
        k1: f64,
        #[arg(long, default_value_t = retrieval::config::BM25_B)]
        b: f64,
        #[arg(long)]
        user_dict: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, user_dict } => build_snapshot(&input, &output, user_dict),
        Commands::Search { snapshot, query, k, k1, b, user_dict } => {
            let config = EngineConfig { k1, b, ..EngineConfig::default() };
            search_snapshot(&snapshot, &query, k, config, user_dict)
        }
    }
}

fn build_snapshot(input: &str, output: &str, user_dict: Option<PathBuf>) -> Result<()> {
    let files = collect_input_files(Path::new(input));
    let mut batch: Vec<NewDocument> = Vec::new();
    for file in &files {
        let before = batch.len();
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(file, &mut batch)?;
        } else {
            read_json(file, &mut batch)?;
        }
        tracing::debug!(file = %file.display(), docs = batch.len() - before, "read input file");
    }

    let tokenizer = TokenizerConfig { user_dict, ..TokenizerConfig::default() };
    let engine = Engine::with_tokenizer_config(EngineConfig::default(), &tokenizer)?;
    engine.add_documents(batch)?;
    tracing::info!(num_docs = engine.len(), files = files.len(), "ingested documents");

    save_snapshot(&SnapshotPaths::new(output), &engine.snapshot())?;
    tracing::info!(output, "snapshot build complete");
    Ok(())
}

fn search_snapshot(dir: &str, query: &str, k: Option<usize>, config: EngineConfig, user_dict: Option<PathBuf>) -> Result<()> {
    let snapshot = load_snapshot(&SnapshotPaths::new(dir)).with_context(|| format!("loading snapshot from {dir}"))?;
    let tokenizer = TokenizerConfig { user_dict, ..TokenizerConfig::default() };
    let engine = Engine::with_tokenizer_config(config, &tokenizer)?;
    engine.restore(snapshot)?;
    let results = engine.search(query, k)?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

fn collect_input_files(input_path: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    }
    files
}

fn read_jsonl(file: &Path, batch: &mut Vec<NewDocument>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: InputDoc = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
        batch.push(doc.into());
    }
    Ok(())
}

fn read_json(file: &Path, batch: &mut Vec<NewDocument>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                let doc: InputDoc = serde_json::from_value(v)?;
                batch.push(doc.into());
            }
        }
        serde_json::Value::Object(_) => {
            let doc: InputDoc = serde_json::from_value(json)?;
            batch.push(doc.into());
        }
        _ => tracing::warn!(file = %file.display(), "skipping input that is neither an object nor an array"),
    }
    Ok(())
}
