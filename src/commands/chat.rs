use std::io::{BufRead, Write};
use std::path::PathBuf;

use colored::Colorize;

use super::{parse_mode, runtime};
use ragchat::config::Config;
use ragchat::error::Result;
use ragchat::llm::{Attachment, ChatMessage};
use ragchat::pipeline::{failure_message, transcript_entries, Assistant};
use ragchat::stream::StreamEvent;

pub struct ChatOptions {
    pub message: Option<String>,
    pub attach: Vec<PathBuf>,
    pub json: bool,
    pub no_rag: bool,
    pub mode: Option<String>,
}

pub fn cmd_chat(config: &Config, api_key: Option<String>, opts: ChatOptions) -> Result<()> {
    let mut config = config.clone();
    if opts.no_rag {
        config.settings.rag.enabled = false;
    }
    config.settings.rag.mode = parse_mode(opts.mode.as_deref(), config.settings.rag.mode)?;

    let assistant = Assistant::from_config(&config, api_key)?;
    let mut attachments = opts
        .attach
        .iter()
        .map(|path| Attachment::from_path(path))
        .collect::<Result<Vec<_>>>()?;

    let rt = runtime()?;
    let mut history: Vec<ChatMessage> = Vec::new();

    if let Some(message) = opts.message {
        return run_turn(&rt, &assistant, &mut history, &message, &attachments, opts.json);
    }

    let rag = assistant.pipeline().settings();
    eprintln!(
        "{} (rag: {}, mode: {}). /clear resets history, /exit quits",
        "ragchat".green().bold(),
        if rag.enabled { "on" } else { "off" },
        rag.mode
    );

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{} ", ">".cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let input = line.trim();

        match input {
            "" => continue,
            "/exit" | "/quit" => break,
            "/clear" => {
                history.clear();
                eprintln!("{}", "History cleared.".dimmed());
                continue;
            }
            _ => {}
        }

        let turn_attachments = std::mem::take(&mut attachments);
        // Failures are already shown; the session keeps going.
        let _ = run_turn(&rt, &assistant, &mut history, input, &turn_attachments, opts.json);
    }

    Ok(())
}

fn run_turn(
    rt: &tokio::runtime::Runtime,
    assistant: &Assistant,
    history: &mut Vec<ChatMessage>,
    input: &str,
    attachments: &[Attachment],
    json: bool,
) -> Result<()> {
    let entries = transcript_entries(input, attachments);
    let mut renderer = Renderer::new(json);

    let result = rt.block_on(assistant.send_turn(history, input, attachments, |event| {
        renderer.render(&event)
    }));
    renderer.finish();

    history.extend(entries);
    match result {
        Ok(outcome) => {
            history.push(ChatMessage::assistant(outcome.text));
            Ok(())
        }
        Err(e) => {
            history.push(ChatMessage::assistant(failure_message(&e)));
            Err(e)
        }
    }
}

/// Prints events to the terminal. Chunks are cumulative, so only the unseen
/// suffix is written.
struct Renderer {
    json: bool,
    shown: String,
}

impl Renderer {
    fn new(json: bool) -> Self {
        Self {
            json,
            shown: String::new(),
        }
    }

    fn render(&mut self, event: &StreamEvent) {
        if self.json {
            match event.to_sse() {
                Ok(frame) => print!("{}", frame),
                Err(e) => log::warn!("Could not encode event: {}", e),
            }
            std::io::stdout().flush().ok();
            return;
        }

        match event {
            StreamEvent::Chunk { text } => {
                match text.strip_prefix(self.shown.as_str()) {
                    Some(suffix) => print!("{}", suffix),
                    None => print!("\n{}", text),
                }
                self.shown = text.clone();
            }
            StreamEvent::Final { text } => {
                if *text != self.shown {
                    if !self.shown.is_empty() {
                        println!("\n{}", "(corrected)".dimmed());
                    }
                    print!("{}", text);
                    self.shown = text.clone();
                }
            }
            StreamEvent::Error { message } => {
                if !self.shown.is_empty() {
                    println!();
                }
                eprintln!("{} {}", "Error:".red(), message);
                self.shown.clear();
            }
        }
        std::io::stdout().flush().ok();
    }

    fn finish(&self) {
        if !self.json && !self.shown.is_empty() {
            println!();
        }
    }
}
