mod cli;
mod commands;

use clap::Parser;
use cli::{AuthCommand, Cli, Commands, KnowledgeCommand, RagCommand};
use colored::Colorize;
use ragchat::auth;
use ragchat::config::Config;
use ragchat::error::Result;

use commands::ask::cmd_ask;
use commands::auth::{cmd_auth_logout, cmd_auth_set_key, cmd_auth_status};
use commands::chat::{cmd_chat, ChatOptions};
use commands::knowledge::{
    cmd_ingest, cmd_knowledge_clear, cmd_knowledge_search, cmd_knowledge_status,
};
use commands::rag::{cmd_rag_mode, cmd_rag_set_enabled, cmd_rag_status};

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    // reqwest/hyper internals are noisy at debug
    if !cli.verbose {
        builder.filter_module("hyper", log::LevelFilter::Warn);
        builder.filter_module("reqwest", log::LevelFilter::Warn);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn run(cli: Cli) -> Result<()> {
    // Auth commands operate on auth.json directly; no Config needed
    if let Commands::Auth { command } = cli.command {
        return match command {
            AuthCommand::SetKey { key } => cmd_auth_set_key(key),
            AuthCommand::Status => cmd_auth_status(cli.api_key.as_deref()),
            AuthCommand::Logout => cmd_auth_logout(),
        };
    }

    let mut config = Config::load()?;

    if let Commands::Rag { command } = cli.command {
        return match command {
            RagCommand::Enable => cmd_rag_set_enabled(&mut config, true),
            RagCommand::Disable => cmd_rag_set_enabled(&mut config, false),
            RagCommand::Mode { mode } => cmd_rag_mode(&mut config, &mode),
            RagCommand::Status => cmd_rag_status(&config),
        };
    }

    let api_key = auth::resolve_api_key(cli.api_key.as_deref())?.map(|(key, _)| key);

    match cli.command {
        Commands::Chat {
            message,
            attach,
            json,
            no_rag,
            mode,
        } => cmd_chat(
            &config,
            api_key,
            ChatOptions {
                message,
                attach,
                json,
                no_rag,
                mode,
            },
        ),
        Commands::Ask { message, no_rag } => {
            let key = auth::require_api_key(cli.api_key.as_deref())?;
            cmd_ask(&config, Some(key), &message, no_rag)
        }
        Commands::Ingest { files, mode } => cmd_ingest(&config, api_key, &files, mode.as_deref()),
        Commands::Knowledge { command } => match command {
            KnowledgeCommand::Status => cmd_knowledge_status(&config),
            KnowledgeCommand::Search { query, top_k, mode } => {
                cmd_knowledge_search(&config, api_key, &query, top_k, mode.as_deref())
            }
            KnowledgeCommand::Clear { mode } => cmd_knowledge_clear(&config, mode.as_deref()),
        },
        Commands::Auth { .. } | Commands::Rag { .. } => Ok(()),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
