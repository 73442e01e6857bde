use colored::Colorize;

use ragchat::config::{Config, RagMode};
use ragchat::error::{ChatError, Result};

pub fn cmd_rag_set_enabled(config: &mut Config, enabled: bool) -> Result<()> {
    config.settings.rag.enabled = enabled;
    config.save_settings()?;
    let state = if enabled { "enabled" } else { "disabled" };
    println!("{} Retrieval augmentation {}.", "Done!".green().bold(), state);
    Ok(())
}

pub fn cmd_rag_mode(config: &mut Config, mode: &str) -> Result<()> {
    let mode = RagMode::from_str_loose(mode)
        .ok_or_else(|| ChatError::Config(format!("Unknown RAG mode: {}. Use: server, client", mode)))?;
    config.settings.rag.mode = mode;
    config.save_settings()?;
    println!("{} RAG mode set to {}.", "Done!".green().bold(), mode.to_string().cyan());
    Ok(())
}

pub fn cmd_rag_status(config: &Config) -> Result<()> {
    let rag = &config.settings.rag;
    let enabled = if rag.enabled {
        "enabled".green()
    } else {
        "disabled".yellow()
    };
    println!("{} {}", "Retrieval:".bold(), enabled);
    println!("{} {}", "Mode:".bold(), rag.mode);
    println!("{} {}", "Settings:".bold(), config.settings_path().display());
    Ok(())
}
