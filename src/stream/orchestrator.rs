use std::fmt::Display;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use super::parser::{join_candidate_texts, ChunkParser, FeedOutcome};
use crate::error::{ChatError, Result};
use crate::llm::prompts::ASSISTANT_ERROR;

/// Update delivered to whoever renders the answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Whole answer so far, not a delta
    Chunk { text: String },
    /// Authoritative answer; replaces every earlier chunk
    Final { text: String },
    /// The request failed; no further events follow
    Error { message: String },
}

impl StreamEvent {
    /// Server-sent-events framing: `data: <json>\n\n`
    pub fn to_sse(&self) -> Result<String> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Streaming,
    Finalizing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    /// Final text if the closing parse succeeded, else the last cumulative text
    pub text: String,
    pub finalized: bool,
}

/// Drives one response body through [`ChunkParser`] and produces the event
/// sequence for a single chat turn.
#[derive(Debug)]
pub struct StreamOrchestrator {
    parser: ChunkParser,
    full_buffer: Vec<u8>,
    /// Bytes of a UTF-8 sequence split across reads
    utf8_carry: Vec<u8>,
    answer: String,
    phase: Phase,
}

impl StreamOrchestrator {
    pub fn new(buffer_limit: Option<usize>) -> Self {
        Self {
            parser: ChunkParser::with_limit(buffer_limit),
            full_buffer: Vec::new(),
            utf8_carry: Vec::new(),
            answer: String::new(),
            phase: Phase::Streaming,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Consume `body` to the end, calling `on_event` for every update.
    ///
    /// A transport error mid-stream emits one `Error` event and is returned.
    /// A final parse failure is only logged.
    pub async fn run<S, B, E, F>(&mut self, body: S, mut on_event: F) -> Result<StreamOutcome>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
        F: FnMut(StreamEvent),
    {
        futures::pin_mut!(body);

        while let Some(next) = body.next().await {
            let step = match next {
                Ok(bytes) => self.ingest(bytes.as_ref(), &mut on_event),
                Err(e) => Err(ChatError::UpstreamMessage(e.to_string())),
            };
            if let Err(e) = step {
                log::error!("Response stream failed: {}", e);
                self.phase = Phase::Done;
                on_event(StreamEvent::Error {
                    message: ASSISTANT_ERROR.to_string(),
                });
                return Err(e);
            }
        }

        self.phase = Phase::Finalizing;
        if !self.utf8_carry.is_empty() {
            let rest = String::from_utf8_lossy(&self.utf8_carry).into_owned();
            self.utf8_carry.clear();
            if let Ok(FeedOutcome::Text(text)) = self.parser.feed(&rest) {
                self.push_text(&text, &mut on_event);
            }
        }

        let outcome = match parse_full_response(&self.full_buffer) {
            Ok(text) => {
                on_event(StreamEvent::Final { text: text.clone() });
                StreamOutcome {
                    text,
                    finalized: true,
                }
            }
            Err(e) => {
                log::warn!("Final parse of streamed response failed: {}", e);
                StreamOutcome {
                    text: self.answer.clone(),
                    finalized: false,
                }
            }
        };
        self.phase = Phase::Done;
        Ok(outcome)
    }

    fn ingest<F: FnMut(StreamEvent)>(&mut self, bytes: &[u8], on_event: &mut F) -> Result<()> {
        self.full_buffer.extend_from_slice(bytes);

        let text = self.decode(bytes);
        if text.is_empty() {
            return Ok(());
        }

        match self.parser.feed(&text)? {
            FeedOutcome::Text(extracted) => self.push_text(&extracted, on_event),
            FeedOutcome::Empty => {}
            FeedOutcome::NoProgress => {}
        }
        Ok(())
    }

    fn push_text<F: FnMut(StreamEvent)>(&mut self, extracted: &str, on_event: &mut F) {
        self.answer.push_str(extracted);
        on_event(StreamEvent::Chunk {
            text: self.answer.clone(),
        });
    }

    /// Decode as much of the carried bytes plus `bytes` as forms complete
    /// UTF-8, keeping an unfinished trailing sequence for the next read.
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.utf8_carry.extend_from_slice(bytes);
        match std::str::from_utf8(&self.utf8_carry) {
            Ok(s) => {
                let s = s.to_string();
                self.utf8_carry.clear();
                s
            }
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let s = String::from_utf8_lossy(&self.utf8_carry[..valid]).into_owned();
                self.utf8_carry = self.utf8_carry.split_off(valid);
                s
            }
            Err(_) => {
                let s = String::from_utf8_lossy(&self.utf8_carry).into_owned();
                self.utf8_carry.clear();
                s
            }
        }
    }
}

/// Parse the complete body as one JSON array and join every candidate text
pub fn parse_full_response(buffer: &[u8]) -> Result<String> {
    let value: serde_json::Value = serde_json::from_slice(buffer)
        .map_err(|e| ChatError::MalformedStream(e.to_string()))?;
    let elements = value
        .as_array()
        .ok_or_else(|| ChatError::MalformedStream("response is not a JSON array".into()))?;
    Ok(join_candidate_texts(elements))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn element(text: &str) -> String {
        serde_json::json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
            .to_string()
    }

    fn body(
        fragments: Vec<String>,
    ) -> impl Stream<Item = std::result::Result<Vec<u8>, std::io::Error>> {
        stream::iter(fragments.into_iter().map(|f| Ok(f.into_bytes())))
    }

    #[tokio::test]
    async fn test_cumulative_chunks_then_final() {
        let mut events = Vec::new();
        let mut orchestrator = StreamOrchestrator::new(None);
        let outcome = orchestrator
            .run(
                body(vec![
                    format!("[{}", element("Hi ")),
                    format!(",{}]", element("there")),
                ]),
                |e| events.push(e),
            )
            .await
            .unwrap();

        assert_eq!(
            events,
            vec![
                StreamEvent::Chunk { text: "Hi ".into() },
                StreamEvent::Chunk {
                    text: "Hi there".into()
                },
                StreamEvent::Final {
                    text: "Hi there".into()
                },
            ]
        );
        assert!(outcome.finalized);
        assert_eq!(outcome.text, "Hi there");
        assert_eq!(orchestrator.phase(), Phase::Done);
    }

    #[tokio::test]
    async fn test_truncated_body_keeps_last_chunk() {
        let mut events = Vec::new();
        let outcome = StreamOrchestrator::new(None)
            .run(
                body(vec![
                    format!("[{}", element("partial ")),
                    ",{\"candidates\":[".to_string(),
                ]),
                |e| events.push(e),
            )
            .await
            .unwrap();

        assert_eq!(
            events,
            vec![StreamEvent::Chunk {
                text: "partial ".into()
            }]
        );
        assert!(!outcome.finalized);
        assert_eq!(outcome.text, "partial ");
    }

    #[tokio::test]
    async fn test_transport_error_emits_error_event() {
        let fragments: Vec<std::result::Result<Vec<u8>, String>> = vec![
            Ok(format!("[{}", element("so far")).into_bytes()),
            Err("connection reset".to_string()),
        ];
        let mut events = Vec::new();
        let result = StreamOrchestrator::new(None)
            .run(stream::iter(fragments), |e| events.push(e))
            .await;

        assert!(matches!(result, Err(ChatError::UpstreamMessage(_))));
        assert_eq!(
            events.last(),
            Some(&StreamEvent::Error {
                message: ASSISTANT_ERROR.into()
            })
        );
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_overflow_is_terminal() {
        let mut events = Vec::new();
        let result = StreamOrchestrator::new(Some(8))
            .run(
                body(vec!["[{\"never\":".into(), "\"closes".into()]),
                |e| events.push(e),
            )
            .await;
        assert!(matches!(result, Err(ChatError::StreamOverflow { limit: 8 })));
        assert!(matches!(events.as_slice(), [StreamEvent::Error { .. }]));
    }

    #[tokio::test]
    async fn test_multibyte_split_across_reads() {
        let payload = format!("[{}]", element("héllo wörld"));
        let bytes = payload.into_bytes();
        let split = bytes.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let fragments = vec![
            Ok::<_, std::io::Error>(bytes[..split].to_vec()),
            Ok(bytes[split..].to_vec()),
        ];

        let mut events = Vec::new();
        let outcome = StreamOrchestrator::new(None)
            .run(stream::iter(fragments), |e| events.push(e))
            .await
            .unwrap();
        assert_eq!(outcome.text, "héllo wörld");
        assert_eq!(
            events.first(),
            Some(&StreamEvent::Chunk {
                text: "héllo wörld".into()
            })
        );
    }

    #[test]
    fn test_event_wire_format() {
        let chunk = StreamEvent::Chunk { text: "Hi".into() };
        assert_eq!(
            serde_json::to_string(&chunk).unwrap(),
            r#"{"type":"chunk","text":"Hi"}"#
        );
        assert_eq!(
            StreamEvent::Final { text: "done".into() }.to_sse().unwrap(),
            "data: {\"type\":\"final\",\"text\":\"done\"}\n\n"
        );
    }

    #[test]
    fn test_parse_full_response_rejects_object() {
        assert!(matches!(
            parse_full_response(br#"{"candidates":[]}"#),
            Err(ChatError::MalformedStream(_))
        ));
        assert_eq!(parse_full_response(b"[]").unwrap(), "");
    }
}
