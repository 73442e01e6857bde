use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use super::{parse_mode, runtime};
use ragchat::config::{Config, RagMode};
use ragchat::embeddings::store::Document;
use ragchat::embeddings::VectorStore;
use ragchat::error::{ChatError, Result};
use ragchat::pipeline::{embedder_for, retriever_from_config, Retriever};

fn read_documents(files: &[PathBuf]) -> Result<Vec<Document>> {
    if files.is_empty() {
        return Err(ChatError::EmptyInput("No files uploaded.".into()));
    }
    files
        .iter()
        .map(|path| {
            let text = std::fs::read_to_string(path)?;
            Ok(Document::new(path.display().to_string(), text))
        })
        .collect()
}

pub fn cmd_ingest(
    config: &Config,
    api_key: Option<String>,
    files: &[PathBuf],
    mode: Option<&str>,
) -> Result<()> {
    let mode = parse_mode(mode, config.settings.rag.mode)?;
    let documents = read_documents(files)?;
    // A rebuild replaces the server store wholesale, so its old file is not read
    let retriever = match mode {
        RagMode::Server => Retriever::new(
            Arc::new(VectorStore::new(config.store_path(mode))),
            embedder_for(config, api_key, mode),
        ),
        RagMode::Client => retriever_from_config(config, api_key, mode)?,
    };

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message("Indexing knowledge documents...");
    pb.enable_steady_tick(Duration::from_millis(100));

    let rt = runtime()?;
    let result = rt.block_on(async {
        match mode {
            RagMode::Server => retriever
                .store
                .rebuild(&documents, retriever.embedder.as_ref())
                .await
                .map(|report| {
                    format!(
                        "Successfully indexed {} file(s). ({} chunks)",
                        report.documents, report.records
                    )
                }),
            RagMode::Client => retriever
                .store
                .insert_documents(&documents, retriever.embedder.as_ref())
                .await
                .map(|added| {
                    format!("Knowledge documents indexed locally. ({} new chunks)", added)
                }),
        }
    });
    pb.finish_and_clear();

    match result {
        Ok(message) => {
            println!("{} {}", "Done!".green().bold(), message);
            Ok(())
        }
        Err(e) => {
            eprintln!("{} Failed to process documents.", "Error:".red());
            Err(e)
        }
    }
}

pub fn cmd_knowledge_status(config: &Config) -> Result<()> {
    for mode in [RagMode::Server, RagMode::Client] {
        let path = config.store_path(mode);
        let marker = if mode == config.settings.rag.mode {
            "*".green().to_string()
        } else {
            " ".to_string()
        };
        let count = match VectorStore::open(path.clone()) {
            Ok(store) => format!("{:>6} chunks", store.len()),
            Err(e) => format!("{} ({})", "unreadable".red(), e),
        };
        println!(
            "{} {:<7} {}  {}",
            marker,
            mode.to_string(),
            count,
            path.display().to_string().dimmed()
        );
    }
    Ok(())
}

pub fn cmd_knowledge_search(
    config: &Config,
    api_key: Option<String>,
    query: &str,
    top_k: usize,
    mode: Option<&str>,
) -> Result<()> {
    let mode = parse_mode(mode, config.settings.rag.mode)?;
    let retriever = retriever_from_config(config, api_key, mode)?;

    if retriever.store.is_empty() {
        println!("{}", "Knowledge base is empty. Run 'ragchat ingest' first.".yellow());
        return Ok(());
    }

    let rt = runtime()?;
    let hits = rt.block_on(async {
        let query_embedding = retriever.embedder.embed(query).await?;
        retriever.store.search(&query_embedding, top_k)
    })?;

    println!("{} Results for '{}':\n", "Search".green().bold(), query);
    for (score, record) in hits {
        println!("  {} ({:.1}%)", ">".green(), score * 100.0);
        println!("    {}\n", truncate_text(record.text.trim(), 150));
    }
    Ok(())
}

pub fn cmd_knowledge_clear(config: &Config, mode: Option<&str>) -> Result<()> {
    let mode = parse_mode(mode, config.settings.rag.mode)?;
    // Clearing must work even when the current file cannot be loaded
    let store = VectorStore::new(config.store_path(mode));
    runtime()?.block_on(store.clear())?;
    println!("{} Cleared {} knowledge store.", "Done!".green().bold(), mode);
    Ok(())
}

fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}...", cut)
}
