use std::path::Path;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

/// Who wrote a transcript entry. Tags are parsed with [`Sender::from_tag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    /// Role name the generation API expects
    pub fn role(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "model",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Sender> {
        match tag {
            "user" => Ok(Sender::User),
            "assistant" => Ok(Sender::Assistant),
            other => Err(ChatError::UnknownSender(other.to_string())),
        }
    }
}

impl TryFrom<String> for Sender {
    type Error = ChatError;

    fn try_from(tag: String) -> Result<Sender> {
        Sender::from_tag(&tag)
    }
}

/// One transcript entry, as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    /// Epoch millis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<i64>,
}

impl ChatMessage {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            t: Some(chrono::Utc::now().timestamp_millis()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text)
    }
}

/// A file sent inline with a user turn
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            mime_type: guess_mime(path).to_string(),
            name,
            data,
        })
    }

    pub fn to_part(&self) -> Part {
        Part::InlineData {
            inline_data: InlineData {
                data: base64::engine::general_purpose::STANDARD.encode(&self.data),
                mime_type: self.mime_type.clone(),
            },
        }
    }
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub data: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub role: &'static str,
    pub parts: Vec<Part>,
}

/// Body of `generateContent` / `streamGenerateContent`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
}

impl GenerateRequest {
    /// Prior transcript followed by the new user turn. `upstream_text` is what
    /// the model sees for this turn, which may differ from what the transcript
    /// records.
    pub fn for_turn(history: &[ChatMessage], upstream_text: &str, attachments: &[Attachment]) -> Self {
        let mut contents: Vec<Content> = history
            .iter()
            .filter(|m| !m.text.trim().is_empty())
            .map(|m| Content {
                role: m.sender.role(),
                parts: vec![Part::Text {
                    text: m.text.clone(),
                }],
            })
            .collect();

        let mut parts = Vec::with_capacity(attachments.len() + 1);
        if !upstream_text.is_empty() {
            parts.push(Part::Text {
                text: upstream_text.to_string(),
            });
        }
        parts.extend(attachments.iter().map(Attachment::to_part));

        contents.push(Content {
            role: Sender::User.role(),
            parts,
        });

        Self { contents }
    }
}
