use std::sync::Arc;

use crate::config::{Config, RagMode, RagSettings, RAG_TOP_K};
use crate::embeddings::{Embedder, GeminiEmbedder, RemoteEmbedder, VectorStore};
use crate::error::{ChatError, Result};
use crate::llm::message::{Attachment, ChatMessage, GenerateRequest};
use crate::llm::prompts::{attachments_note, ASSISTANT_ERROR};
use crate::llm::{ByteStream, GenerationClient, Generator};
use crate::stream::{StreamEvent, StreamOrchestrator, StreamOutcome};

/// A store plus the embedder used to fill and query it
#[derive(Clone)]
pub struct Retriever {
    pub store: Arc<VectorStore>,
    pub embedder: Arc<dyn Embedder>,
}

impl Retriever {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }
}

/// Decides what text goes upstream for a user message.
pub struct AugmentationPipeline {
    rag: RagSettings,
    server: Retriever,
    local: Retriever,
    top_k: usize,
}

impl AugmentationPipeline {
    pub fn new(rag: RagSettings, server: Retriever, local: Retriever) -> Self {
        Self {
            rag,
            server,
            local,
            top_k: RAG_TOP_K,
        }
    }

    pub fn settings(&self) -> &RagSettings {
        &self.rag
    }

    pub fn retriever(&self, mode: RagMode) -> &Retriever {
        match mode {
            RagMode::Server => &self.server,
            RagMode::Client => &self.local,
        }
    }

    /// Whether the active mode has anything to retrieve from
    pub fn has_knowledge_base(&self) -> bool {
        !self.retriever(self.rag.mode).store.is_empty()
    }

    /// The text to send upstream in place of `user_text`: unchanged when
    /// retrieval is off or the active store is empty, otherwise wrapped in
    /// retrieved context.
    pub async fn prepare(&self, user_text: &str) -> Result<String> {
        if !self.rag.enabled || !self.has_knowledge_base() {
            return Ok(user_text.to_string());
        }

        let retriever = self.retriever(self.rag.mode);
        retriever
            .store
            .query(user_text, retriever.embedder.as_ref(), self.top_k)
            .await
    }
}

/// Runs chat turns: augmentation, request building, streaming.
pub struct Assistant {
    pipeline: AugmentationPipeline,
    generator: Arc<dyn Generator>,
    history_limit: usize,
    stream_buffer_limit: Option<usize>,
}

impl Assistant {
    pub fn new(
        pipeline: AugmentationPipeline,
        generator: Arc<dyn Generator>,
        history_limit: usize,
        stream_buffer_limit: Option<usize>,
    ) -> Self {
        Self {
            pipeline,
            generator,
            history_limit,
            stream_buffer_limit,
        }
    }

    /// Wire up both stores, the embedders and the Gemini client from `config`.
    pub fn from_config(config: &Config, api_key: Option<String>) -> Result<Self> {
        let pipeline = pipeline_from_config(config, api_key.clone())?;
        let generator = Arc::new(GenerationClient::new(config, api_key));
        Ok(Self::new(
            pipeline,
            generator,
            config.history_limit,
            config.stream_buffer_limit,
        ))
    }

    pub fn pipeline(&self) -> &AugmentationPipeline {
        &self.pipeline
    }

    /// Send one user turn and stream the reply through `on_event`.
    ///
    /// `history` is the transcript before this turn; only its last
    /// `history_limit` entries go upstream. Failures before the stream opens
    /// are reported as an `Error` event too, so a consumer only ever has to
    /// watch the event sequence.
    pub async fn send_turn<F>(
        &self,
        history: &[ChatMessage],
        input: &str,
        attachments: &[Attachment],
        mut on_event: F,
    ) -> Result<StreamOutcome>
    where
        F: FnMut(StreamEvent),
    {
        let text = input.trim();
        if text.is_empty() && attachments.is_empty() {
            return Err(ChatError::EmptyInput("message is empty".into()));
        }

        let body = match self.open(history, text, attachments).await {
            Ok(body) => body,
            Err(e) => {
                log::error!("Chat turn failed: {}", e);
                on_event(StreamEvent::Error {
                    message: failure_message(&e),
                });
                return Err(e);
            }
        };

        let mut orchestrator = StreamOrchestrator::new(self.stream_buffer_limit);
        orchestrator.run(body, on_event).await
    }

    async fn open(
        &self,
        history: &[ChatMessage],
        text: &str,
        attachments: &[Attachment],
    ) -> Result<ByteStream> {
        let upstream_text = if text.is_empty() {
            String::new()
        } else {
            self.pipeline.prepare(text).await?
        };

        let recent = &history[history.len().saturating_sub(self.history_limit)..];
        let request = GenerateRequest::for_turn(recent, &upstream_text, attachments);
        self.generator.open_stream(&request).await
    }
}

/// Embedder used for `mode`: Gemini for the server store; the configured
/// embedding service for the local store, falling back to Gemini.
pub fn embedder_for(config: &Config, api_key: Option<String>, mode: RagMode) -> Arc<dyn Embedder> {
    match (mode, config.embed_url.as_deref()) {
        (RagMode::Client, Some(url)) => Arc::new(RemoteEmbedder::new(url)),
        _ => Arc::new(GeminiEmbedder::new(
            &config.endpoint,
            &config.embed_model,
            api_key,
        )),
    }
}

/// Open the store for `mode` with its embedder. Only that store's file is read.
pub fn retriever_from_config(
    config: &Config,
    api_key: Option<String>,
    mode: RagMode,
) -> Result<Retriever> {
    let store = VectorStore::open(config.store_path(mode))?;
    Ok(Retriever::new(
        Arc::new(store),
        embedder_for(config, api_key, mode),
    ))
}

/// Build the retrieval side for chat. The active mode's store is loaded; the
/// other one is never queried during a session, so its file is not read.
pub fn pipeline_from_config(config: &Config, api_key: Option<String>) -> Result<AugmentationPipeline> {
    let active = config.settings.rag.mode;
    let retriever = |mode: RagMode| -> Result<Retriever> {
        if mode == active {
            return retriever_from_config(config, api_key.clone(), mode);
        }
        Ok(Retriever::new(
            Arc::new(VectorStore::new(config.store_path(mode))),
            embedder_for(config, api_key.clone(), mode),
        ))
    };

    Ok(AugmentationPipeline::new(
        config.settings.rag.clone(),
        retriever(RagMode::Server)?,
        retriever(RagMode::Client)?,
    ))
}

/// Transcript entries recorded for a user turn. These always carry the text
/// the user typed, never the augmented prompt.
pub fn transcript_entries(input: &str, attachments: &[Attachment]) -> Vec<ChatMessage> {
    let mut entries = Vec::new();
    if !attachments.is_empty() {
        let names: Vec<String> = attachments.iter().map(|a| a.name.clone()).collect();
        entries.push(ChatMessage::user(attachments_note(&names)));
    }
    let text = input.trim();
    if !text.is_empty() {
        entries.push(ChatMessage::user(text));
    }
    entries
}

/// What the user sees when a turn fails
pub fn failure_message(err: &ChatError) -> String {
    match err {
        ChatError::Auth(msg) => msg.clone(),
        ChatError::EmptyInput(msg) => msg.clone(),
        _ => ASSISTANT_ERROR.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Sender;

    #[test]
    fn test_transcript_entries_keep_original_text() {
        let attachment = Attachment {
            name: "report.pdf".into(),
            mime_type: "application/pdf".into(),
            data: vec![1, 2, 3],
        };
        let entries = transcript_entries("  what changed?  ", &[attachment]);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "Files attached: report.pdf");
        assert_eq!(entries[1].text, "what changed?");
        assert!(entries.iter().all(|e| e.sender == Sender::User));
    }

    #[test]
    fn test_failure_message() {
        assert_eq!(
            failure_message(&ChatError::UpstreamMessage("reset".into())),
            ASSISTANT_ERROR
        );
        assert_eq!(
            failure_message(&ChatError::Auth("Gemini API key not provided.".into())),
            "Gemini API key not provided."
        );
    }
}
