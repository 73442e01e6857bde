use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use super::{cosine_similarity, rank_desc, ChunkPolicy, Embedder, VectorRecord};
use crate::error::{ChatError, Result};
use crate::llm::prompts::rag_prompt;

/// Separator placed between retrieved snippets in an augmented prompt
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

/// A text-bearing document handed to ingestion
#[derive(Debug, Clone)]
pub struct Document {
    pub source_id: String,
    pub text: String,
}

impl Document {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebuildReport {
    pub documents: usize,
    pub records: usize,
}

/// In-memory vector store persisted to a JSON file.
///
/// Readers take a snapshot of the current collection and score it without
/// holding any lock; writers build a complete replacement and swap it in.
/// Writers are serialized so two ingestions never interleave.
pub struct VectorStore {
    records: RwLock<Arc<Vec<VectorRecord>>>,
    writer: tokio::sync::Mutex<()>,
    path: PathBuf,
}

impl VectorStore {
    /// Create new empty store backed by `path`
    pub fn new(path: PathBuf) -> Self {
        Self {
            records: RwLock::new(Arc::new(Vec::new())),
            writer: tokio::sync::Mutex::new(()),
            path,
        }
    }

    /// Create a store and load whatever was persisted at `path`
    pub fn open(path: PathBuf) -> Result<Self> {
        let store = Self::new(path);
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the in-memory collection with the persisted one.
    /// A missing file leaves the store empty.
    pub fn load(&self) -> Result<usize> {
        if !self.path.exists() {
            log::info!("No vector store at {}; starting fresh", self.path.display());
            self.swap(Vec::new());
            return Ok(0);
        }

        let content = std::fs::read_to_string(&self.path)?;
        let records: Vec<VectorRecord> = serde_json::from_str(&content)?;
        check_dimensions(&records)?;

        let count = records.len();
        self.swap(records);
        log::info!("Loaded {} vectors from {}", count, self.path.display());
        Ok(count)
    }

    /// Write the current collection to disk
    pub fn persist(&self) -> Result<()> {
        let snapshot = self.snapshot();
        write_records(&self.path, &snapshot)
    }

    pub fn snapshot(&self) -> Arc<Vec<VectorRecord>> {
        let guard = self.records.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    fn swap(&self, records: Vec<VectorRecord>) {
        let mut guard = self.records.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(records);
    }

    /// Discard everything and index `documents` from scratch (paragraph
    /// chunks). Either the whole batch is embedded and persisted, or the
    /// store is left exactly as it was.
    pub async fn rebuild(
        &self,
        documents: &[Document],
        embedder: &dyn Embedder,
    ) -> Result<RebuildReport> {
        let _writer = self.writer.lock().await;

        let mut chunks = Vec::new();
        for doc in documents {
            let doc_chunks = ChunkPolicy::Paragraphs.split(&doc.text);
            log::debug!("{}: {} chunk(s)", doc.source_id, doc_chunks.len());
            chunks.extend(doc_chunks);
        }

        if chunks.is_empty() {
            return Err(ChatError::EmptyInput(
                "documents contain no chunks long enough to index".into(),
            ));
        }

        let mut records = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let embedding = embedder.embed(&chunk).await?;
            records.push(VectorRecord::new(chunk, embedding));
        }
        check_dimensions(&records)?;

        write_records(&self.path, &records)?;
        let report = RebuildReport {
            documents: documents.len(),
            records: records.len(),
        };
        self.swap(records);

        log::info!(
            "Indexing complete. Saved {} vectors to {}",
            report.records,
            self.path.display()
        );
        Ok(report)
    }

    /// Append sentence chunks of `documents` to the store. Returns the number
    /// of records added. Nothing is persisted if any embedding fails.
    pub async fn insert_documents(
        &self,
        documents: &[Document],
        embedder: &dyn Embedder,
    ) -> Result<usize> {
        let _writer = self.writer.lock().await;

        let mut records: Vec<VectorRecord> = self.snapshot().as_ref().clone();
        let before = records.len();

        for doc in documents {
            for chunk in ChunkPolicy::Sentences.split(&doc.text) {
                let embedding = embedder.embed(&chunk).await?;
                records.push(VectorRecord::new(chunk, embedding));
            }
        }
        check_dimensions(&records)?;

        let added = records.len() - before;
        write_records(&self.path, &records)?;
        self.swap(records);

        log::info!(
            "Indexed {} file(s) locally ({} new vectors)",
            documents.len(),
            added
        );
        Ok(added)
    }

    /// Drop every record and persist the empty store
    pub async fn clear(&self) -> Result<()> {
        let _writer = self.writer.lock().await;
        write_records(&self.path, &[])?;
        self.swap(Vec::new());
        Ok(())
    }

    /// Score every record against `query_embedding` and return the best `top_k`,
    /// highest first. Equal scores keep insertion order.
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<(f32, VectorRecord)>> {
        let snapshot = self.snapshot();
        let mut results = Vec::with_capacity(snapshot.len());
        for record in snapshot.iter() {
            let similarity = cosine_similarity(query_embedding, &record.embedding)?;
            results.push((similarity, record));
        }

        results.sort_by(|a, b| rank_desc(a.0, b.0));

        Ok(results
            .into_iter()
            .take(top_k)
            .map(|(score, record)| (score, record.clone()))
            .collect())
    }

    /// Retrieved context for `message`, joined with [`CONTEXT_SEPARATOR`].
    /// `None` when the store is empty.
    pub async fn context_for(
        &self,
        message: &str,
        embedder: &dyn Embedder,
        top_k: usize,
    ) -> Result<Option<String>> {
        if self.is_empty() {
            return Ok(None);
        }

        let query_embedding = embedder.embed(message).await?;
        let hits = self.search(&query_embedding, top_k)?;
        Ok(Some(
            hits.iter()
                .map(|(_, record)| record.text.as_str())
                .collect::<Vec<_>>()
                .join(CONTEXT_SEPARATOR),
        ))
    }

    /// Wrap `message` in the retrieval prompt built from the `top_k` closest
    /// records. An empty store returns `message` unchanged.
    pub async fn query(
        &self,
        message: &str,
        embedder: &dyn Embedder,
        top_k: usize,
    ) -> Result<String> {
        match self.context_for(message, embedder, top_k).await? {
            Some(context) => {
                log::info!("Augmenting prompt with context");
                Ok(rag_prompt(&context, message))
            }
            None => Ok(message.to_string()),
        }
    }
}

/// All embeddings in one collection must share a dimensionality.
fn check_dimensions(records: &[VectorRecord]) -> Result<()> {
    let Some(first) = records.first() else {
        return Ok(());
    };
    let expected = first.embedding.len();
    match records.iter().find(|r| r.embedding.len() != expected) {
        Some(bad) => Err(ChatError::DimensionMismatch {
            expected,
            found: bad.embedding.len(),
        }),
        None => Ok(()),
    }
}

/// Write via a uniquely named sibling temp file and rename, so a concurrent
/// `load` sees either the old collection or the new one, and two processes
/// writing at once never share a temp file.
fn write_records(path: &Path, records: &[VectorRecord]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(records)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(text: &str, embedding: Vec<f32>) -> VectorRecord {
        VectorRecord::new(text.to_string(), embedding)
    }

    fn store_with(dir: &TempDir, records: Vec<VectorRecord>) -> VectorStore {
        let store = VectorStore::new(dir.path().join("vector_store.json"));
        store.swap(records);
        store
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = VectorStore::open(dir.path().join("none.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_search_orders_and_truncates() {
        let dir = TempDir::new().unwrap();
        let store = store_with(
            &dir,
            vec![
                record("far", vec![0.0, 1.0]),
                record("near", vec![1.0, 0.1]),
                record("exact", vec![1.0, 0.0]),
                record("opposite", vec![-1.0, 0.0]),
            ],
        );

        let hits = store.search(&[1.0, 0.0], 3).unwrap();
        let texts: Vec<&str> = hits.iter().map(|(_, r)| r.text.as_str()).collect();
        assert_eq!(texts, vec!["exact", "near", "far"]);
        assert!(hits.windows(2).all(|w| w[0].0 >= w[1].0));
    }

    #[test]
    fn test_search_ties_keep_insertion_order() {
        let dir = TempDir::new().unwrap();
        let store = store_with(
            &dir,
            vec![
                record("first", vec![2.0, 0.0]),
                record("second", vec![1.0, 0.0]),
                record("third", vec![3.0, 0.0]),
            ],
        );
        let hits = store.search(&[1.0, 0.0], 3).unwrap();
        let texts: Vec<&str> = hits.iter().map(|(_, r)| r.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_search_zero_vector_ranks_last() {
        let dir = TempDir::new().unwrap();
        let store = store_with(
            &dir,
            vec![
                record("zero", vec![0.0, 0.0]),
                record("negative", vec![-1.0, 0.0]),
            ],
        );
        let hits = store.search(&[1.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].1.text, "negative");
        assert!(hits[1].0.is_nan());
    }

    #[test]
    fn test_search_dimension_mismatch_is_error() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, vec![record("three dims", vec![1.0, 0.0, 0.0])]);
        assert!(matches!(
            store.search(&[1.0, 0.0], 3),
            Err(ChatError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_load_rejects_mixed_dimensions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector_store.json");
        write_records(
            &path,
            &[record("a", vec![1.0, 0.0]), record("b", vec![1.0, 0.0, 0.0])],
        )
        .unwrap();
        assert!(matches!(
            VectorStore::open(path),
            Err(ChatError::DimensionMismatch {
                expected: 2,
                found: 3
            })
        ));
    }

    #[test]
    fn test_persist_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = store_with(&dir, vec![record("persist me please", vec![0.5, 0.5])]);
        store.persist().unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["vector_store.json"]);
    }

    #[test]
    fn test_concurrent_writers_leave_a_complete_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector_store.json");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let text = format!("writer number {} record", i);
                    let records = vec![record(&text, vec![i as f32, 1.0])];
                    for _ in 0..20 {
                        write_records(&path, &records).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let store = VectorStore::open(path).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.snapshot()[0].text.starts_with("writer number"));
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["vector_store.json"]);
    }

    #[test]
    fn test_records_without_id_still_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vector_store.json");
        std::fs::write(&path, r#"[{"text":"legacy record text","embedding":[1.0,2.0]}]"#).unwrap();
        let store = VectorStore::open(path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshot()[0].id, "");
    }
}
