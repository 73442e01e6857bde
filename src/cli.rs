use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ragchat",
    about = "Streaming Gemini chat assistant with retrieval over your own documents",
    version
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(global = true, long, short)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(global = true, long, short)]
    pub quiet: bool,

    /// Gemini API key for this invocation (overrides env and stored key)
    #[arg(global = true, long)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Chat with the assistant, streaming the reply
    Chat {
        /// Send one message and exit instead of starting a session
        #[arg(short, long)]
        message: Option<String>,

        /// Files to send inline with the first message
        #[arg(long)]
        attach: Vec<PathBuf>,

        /// Print raw `data: {...}` events instead of rendered text
        #[arg(long)]
        json: bool,

        /// Skip retrieval augmentation for this session
        #[arg(long)]
        no_rag: bool,

        /// Retrieval mode for this session (server, client)
        #[arg(long)]
        mode: Option<String>,
    },

    /// Ask a single question and print the complete answer
    Ask {
        /// Question text
        message: String,

        /// Skip retrieval augmentation
        #[arg(long)]
        no_rag: bool,
    },

    /// Index knowledge documents for retrieval
    Ingest {
        /// Plain-text or markdown files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Store to index into (server replaces, client appends)
        #[arg(long)]
        mode: Option<String>,
    },

    /// Inspect or reset the knowledge stores
    Knowledge {
        #[command(subcommand)]
        command: KnowledgeCommand,
    },

    /// Manage the Gemini API key
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },

    /// Configure retrieval augmentation
    Rag {
        #[command(subcommand)]
        command: RagCommand,
    },
}

#[derive(Subcommand)]
pub enum KnowledgeCommand {
    /// Show record counts for both stores
    Status,

    /// Show the snippets a message would retrieve
    Search {
        /// Query text
        query: String,

        /// Number of results
        #[arg(short = 'k', long, default_value = "3")]
        top_k: usize,

        /// Store to search (server, client)
        #[arg(long)]
        mode: Option<String>,
    },

    /// Remove every record from a store
    Clear {
        /// Store to clear (server, client)
        #[arg(long)]
        mode: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AuthCommand {
    /// Save the API key (prompts when omitted)
    SetKey {
        /// API key
        key: Option<String>,
    },
    /// Show which key is active and where it comes from
    Status,
    /// Remove the stored key
    Logout,
}

#[derive(Subcommand)]
pub enum RagCommand {
    /// Turn retrieval augmentation on
    Enable,
    /// Turn retrieval augmentation off
    Disable,
    /// Select the retrieval mode
    Mode {
        /// server or client
        mode: String,
    },
    /// Show the current retrieval settings
    Status,
}
