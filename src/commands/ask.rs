use super::runtime;
use ragchat::config::Config;
use ragchat::error::Result;
use ragchat::llm::{GenerateRequest, GenerationClient};
use ragchat::pipeline::pipeline_from_config;

/// Non-streaming question: augment, call generateContent once, print.
pub fn cmd_ask(config: &Config, api_key: Option<String>, message: &str, no_rag: bool) -> Result<()> {
    let mut config = config.clone();
    if no_rag {
        config.settings.rag.enabled = false;
    }

    let pipeline = pipeline_from_config(&config, api_key.clone())?;
    let client = GenerationClient::new(&config, api_key);

    let rt = runtime()?;
    let reply = rt.block_on(async {
        let upstream = pipeline.prepare(message.trim()).await?;
        let request = GenerateRequest::for_turn(&[], &upstream, &[]);
        client.generate(&request).await
    });

    println!("{}", reply?);
    Ok(())
}
