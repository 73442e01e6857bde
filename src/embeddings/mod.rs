pub mod provider;
pub mod store;

use std::sync::OnceLock;

use sha2::{Digest, Sha256};

use crate::error::{ChatError, Result};

pub use provider::{Embedder, GeminiEmbedder, RemoteEmbedder};
pub use store::VectorStore;

/// A retrievable chunk of a source document with its embedding
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VectorRecord {
    #[serde(default)]
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl VectorRecord {
    pub fn new(text: String, embedding: Vec<f32>) -> Self {
        Self {
            id: record_id(&text),
            text,
            embedding,
        }
    }
}

/// How documents are cut into retrievable chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPolicy {
    /// Split on blank lines; keep chunks longer than 10 chars once trimmed
    Paragraphs,
    /// Split on `.`, `!`, `?`; skip chunks shorter than 20 chars
    Sentences,
}

impl ChunkPolicy {
    pub fn split(&self, text: &str) -> Vec<String> {
        match self {
            ChunkPolicy::Paragraphs => split_paragraphs(text),
            ChunkPolicy::Sentences => split_sentences(text),
        }
    }
}

/// Paragraph chunks: boundaries are one or more whitespace-only lines.
/// Chunks keep their original whitespace.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    static BLANK_LINE_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = BLANK_LINE_RE.get_or_init(|| regex::Regex::new(r"\n\s*\n").expect("static regex"));

    re.split(text)
        .filter(|chunk| chunk.trim().chars().count() > 10)
        .map(|chunk| chunk.to_string())
        .collect()
}

/// Sentence chunks: maximal runs of text between terminators.
pub fn split_sentences(text: &str) -> Vec<String> {
    static SENTENCE_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = SENTENCE_RE.get_or_init(|| regex::Regex::new(r"[^.!?]+").expect("static regex"));

    re.find_iter(text)
        .map(|m| m.as_str())
        .filter(|chunk| chunk.chars().count() >= 20)
        .map(|chunk| chunk.to_string())
        .collect()
}

/// Cosine similarity between two vectors.
///
/// Vectors of different length are an error rather than a silently
/// truncated score. A zero vector yields NaN, which rankers must sort last.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(ChatError::DimensionMismatch {
            expected: a.len(),
            found: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    Ok(dot_product / (magnitude_a * magnitude_b))
}

/// Ordering for descending similarity with NaN ranked lowest.
pub(crate) fn rank_desc(a: f32, b: f32) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

fn record_id(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}
