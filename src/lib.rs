// Library interface for ragchat

pub mod auth;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod stream;

// Re-export commonly used types
pub use config::Config;
pub use error::{ChatError, Result};
