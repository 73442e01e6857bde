pub mod ask;
pub mod auth;
pub mod chat;
pub mod knowledge;
pub mod rag;

use ragchat::config::RagMode;
use ragchat::error::{ChatError, Result};

/// Per-command runtime; every command is a short-lived client.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ChatError::Config(format!("tokio runtime: {}", e)))
}

/// Parse a `--mode` flag, falling back to `default`
pub fn parse_mode(mode: Option<&str>, default: RagMode) -> Result<RagMode> {
    match mode {
        None => Ok(default),
        Some(name) => RagMode::from_str_loose(name).ok_or_else(|| {
            ChatError::Config(format!("Unknown RAG mode: {}. Use: server, client", name))
        }),
    }
}
