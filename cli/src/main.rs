mod settings;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docqa_retrieval::{Answer, DocumentQa};
use docqa_vector_store::InMemoryVectorIndex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use crate::settings::{Settings, default_data_dir};

/// File extensions picked up when ingesting a directory.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

#[derive(Parser)]
#[command(name = "docqa", about = "Ask questions about your documents", version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Index snapshot file (default: <data dir>/docqa/index.json)
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add or replace documents; directories are searched for .txt and .md files
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Ask a question
    Ask {
        question: String,

        /// Print the full answer as JSON
        #[arg(long)]
        json: bool,
    },

    /// List indexed documents
    List,

    /// Remove a document from the index
    Delete {
        /// Document name as shown by `list`
        source: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())?;
    let data_dir = default_data_dir();
    let index_path = cli.index.unwrap_or_else(|| data_dir.join("index.json"));

    let embedder = settings.embedder(&data_dir).await?;
    let index = Arc::new(
        InMemoryVectorIndex::open(&index_path, embedder.default_dimension())
            .await
            .with_context(|| format!("opening index {}", index_path.display()))?,
    );
    let qa = DocumentQa::builder()
        .with_config(settings.engine.clone())
        .with_index(index.clone())
        .with_embedder(embedder)
        .with_generator(settings.generator())
        .build()?;

    match cli.command {
        Command::Ingest { paths } => {
            let mut documents = 0;
            for file in collect_files(&paths) {
                let Some(source_id) = file.file_name().and_then(|n| n.to_str()) else {
                    warn!("Skipping file with a non UTF-8 name: {}", file.display());
                    continue;
                };
                let text = tokio::fs::read_to_string(&file)
                    .await
                    .with_context(|| format!("reading {}", file.display()))?;
                let fragments = qa.ingest_document(source_id, &text).await?;
                println!("{source_id}: {fragments} fragments");
                documents += 1;
            }
            index.save(&index_path).await?;
            info!("Ingested {documents} documents into {}", index_path.display());
        }
        Command::Ask { question, json } => {
            let answer = qa.answer(&question).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&answer)?);
            } else {
                print_answer(&answer);
            }
        }
        Command::List => {
            let documents = qa.list_documents().await?;
            if documents.is_empty() {
                println!("No documents indexed.");
            }
            for document in documents {
                println!("{document}");
            }
        }
        Command::Delete { source } => {
            let removed = qa.remove_document(&source).await?;
            if removed == 0 {
                println!("No document named {source}.");
            } else {
                index.save(&index_path).await?;
                println!("Removed {source} ({removed} fragments).");
            }
        }
    }

    Ok(())
}

/// Expand directories into the text files beneath them, in a stable order.
fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(std::result::Result::ok)
                .filter(|entry| entry.file_type().is_file() && is_text_file(entry.path()))
                .map(walkdir::DirEntry::into_path)
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    files
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text);
    if answer.sources.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for source in &answer.sources {
        println!("  {} ({})", source.source_id, source.position);
    }
    println!(
        "Confidence: {:.2} from {} fragments{}",
        answer.confidence,
        answer.retrieved,
        if answer.truncated { ", context truncated" } else { "" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collect_files_filters_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.md"), "b").unwrap();
        std::fs::write(dir.path().join("nested/a.TXT"), "a").unwrap();
        std::fs::write(dir.path().join("image.png"), "x").unwrap();
        let explicit = dir.path().join("image.png");

        let files = collect_files(&[dir.path().to_path_buf(), explicit.clone()]);

        assert_eq!(
            files,
            vec![
                dir.path().join("b.md"),
                dir.path().join("nested/a.TXT"),
                explicit
            ]
        );
    }

    #[test]
    fn test_cli_parses_ask_with_json() {
        let cli = Cli::parse_from(["docqa", "--index", "/tmp/i.json", "ask", "what?", "--json"]);
        assert_eq!(cli.index, Some(PathBuf::from("/tmp/i.json")));
        assert!(matches!(
            cli.command,
            Command::Ask { ref question, json: true } if question == "what?"
        ));
    }
}
