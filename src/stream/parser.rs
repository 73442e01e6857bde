//! Reassembly of a streamed JSON array whose fragments do not line up with
//! element boundaries.
//!
//! The parser accumulates text until the buffered portion, with the outer
//! array delimiters stripped, parses as a complete list of elements. Every
//! attempt re-parses the whole pending buffer, so the worst case is quadratic
//! in the size of a single element. Generation responses are small enough
//! that this does not matter; the retry semantics also decide which text is
//! reported as new on each call.

use serde_json::Value;

use crate::error::{ChatError, Result};

/// Result of feeding one fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Buffered text parsed; these are the newly completed candidate texts
    Text(String),
    /// Buffered text parsed but carried no candidate text
    Empty,
    /// Buffered text is not yet valid JSON; it is kept for the next call
    NoProgress,
}

#[derive(Debug, Default)]
pub struct ChunkParser {
    pending_tail: String,
    limit: Option<usize>,
}

impl ChunkParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser that fails with `StreamOverflow` once more than `limit` bytes
    /// would be pending without a successful parse. The offending fragment is
    /// rejected and the pending text is kept as it was. `None` never gives up.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            pending_tail: String::new(),
            limit,
        }
    }

    /// Text carried over from calls that could not be parsed yet
    pub fn pending(&self) -> &str {
        &self.pending_tail
    }

    pub fn feed(&mut self, fragment: &str) -> Result<FeedOutcome> {
        let mut combined = std::mem::take(&mut self.pending_tail);
        combined.push_str(fragment);

        let wrapped = format!("[{}]", strip_array_delimiters(&combined));
        match serde_json::from_str::<Value>(&wrapped) {
            Ok(value) => {
                let text = value
                    .as_array()
                    .map(|elements| join_candidate_texts(elements))
                    .unwrap_or_default();
                if text.is_empty() {
                    Ok(FeedOutcome::Empty)
                } else {
                    Ok(FeedOutcome::Text(text))
                }
            }
            Err(e) => {
                if let Some(limit) = self.limit {
                    if combined.len() > limit {
                        // Drop only the rejected fragment; what was pending stays
                        combined.truncate(combined.len() - fragment.len());
                        self.pending_tail = combined;
                        return Err(ChatError::StreamOverflow { limit });
                    }
                }
                log::debug!(
                    "Incomplete stream fragment ({} bytes pending): {}",
                    combined.len(),
                    e
                );
                self.pending_tail = combined;
                Ok(FeedOutcome::NoProgress)
            }
        }
    }
}

/// Trim, then drop one leading `[` (or a leading `,` separator) and the
/// closing `]`. Elements are objects, so a trailing `]` is always the array
/// closer.
fn strip_array_delimiters(buffer: &str) -> &str {
    let trimmed = buffer.trim();
    let body = trimmed
        .strip_prefix('[')
        .or_else(|| trimmed.strip_prefix(','))
        .unwrap_or(trimmed);
    body.strip_suffix(']').unwrap_or(body)
}

/// `candidates[0].content.parts[0].text` of one response element
pub fn candidate_text(element: &Value) -> Option<&str> {
    element
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.get(0))
        .and_then(|p| p.get("text"))
        .and_then(|t| t.as_str())
}

/// Concatenate the candidate texts of `elements` in order
pub fn join_candidate_texts(elements: &[Value]) -> String {
    elements.iter().filter_map(candidate_text).collect()
}
