use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ChatError, Result};

/// Gemini REST base used for both generation and embeddings
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-004";

/// Number of transcript messages sent upstream with each turn
pub const HISTORY_LIMIT: usize = 10;
/// Snippets injected into an augmented prompt
pub const RAG_TOP_K: usize = 3;
/// Cap on text retained by the stream parser between successful parses
pub const DEFAULT_STREAM_BUFFER_LIMIT: usize = 8 * 1024 * 1024;

pub const SETTINGS_FILE: &str = "settings.json";
pub const SERVER_STORE_FILE: &str = "vector_store.json";
pub const LOCAL_STORE_FILE: &str = "local_vectors.json";

/// Which knowledge store retrieval reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RagMode {
    /// Single shared knowledge base, replaced on every upload
    #[default]
    Server,
    /// Per-user local store, grown additively
    Client,
}

impl RagMode {
    pub fn from_str_loose(s: &str) -> Option<RagMode> {
        match s.trim().to_lowercase().as_str() {
            "server" | "server-side" | "remote" => Some(RagMode::Server),
            "client" | "local" | "local-client-side" => Some(RagMode::Client),
            _ => None,
        }
    }
}

impl fmt::Display for RagMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RagMode::Server => write!(f, "server"),
            RagMode::Client => write!(f, "client"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RagSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub mode: RagMode,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: RagMode::Server,
        }
    }
}

fn default_true() -> bool {
    true
}

/// On-disk representation of settings.json
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub rag: RagSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_model: Option<String>,
    /// `{text} -> {embedding}` service used by the client-mode store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<usize>,
    /// 0 disables the cap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_buffer_limit: Option<usize>,
}

impl Settings {
    /// Load from disk, returning defaults if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Holds settings.json and both vector stores
    pub data_dir: PathBuf,
    pub settings: Settings,
    pub endpoint: String,
    pub model: String,
    pub embed_model: String,
    pub embed_url: Option<String>,
    pub history_limit: usize,
    pub stream_buffer_limit: Option<usize>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var("RAGCHAT_DATA_DIR") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => dirs::data_dir()
                .ok_or_else(|| ChatError::Config("Could not determine data directory".into()))?
                .join("ragchat"),
        };
        Self::from_data_dir(data_dir)
    }

    /// Build a config rooted at `data_dir`, with env overrides applied on top
    /// of settings.json.
    pub fn from_data_dir(data_dir: PathBuf) -> Result<Self> {
        let settings = Settings::load(&data_dir.join(SETTINGS_FILE))?;

        let endpoint = env_override("RAGCHAT_ENDPOINT")
            .or_else(|| settings.endpoint.clone())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let model = env_override("RAGCHAT_MODEL")
            .or_else(|| settings.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let embed_model = env_override("RAGCHAT_EMBED_MODEL")
            .or_else(|| settings.embed_model.clone())
            .unwrap_or_else(|| DEFAULT_EMBED_MODEL.to_string());
        let embed_url = env_override("RAGCHAT_EMBED_URL").or_else(|| settings.embed_url.clone());

        let history_limit = settings.history_limit.unwrap_or(HISTORY_LIMIT);
        let stream_buffer_limit = match settings.stream_buffer_limit {
            Some(0) => None,
            Some(n) => Some(n),
            None => Some(DEFAULT_STREAM_BUFFER_LIMIT),
        };

        Ok(Config {
            data_dir,
            settings,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
            embed_model,
            embed_url,
            history_limit,
            stream_buffer_limit,
        })
    }

    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILE)
    }

    pub fn server_store_path(&self) -> PathBuf {
        self.data_dir.join(SERVER_STORE_FILE)
    }

    pub fn local_store_path(&self) -> PathBuf {
        self.data_dir.join(LOCAL_STORE_FILE)
    }

    pub fn store_path(&self, mode: RagMode) -> PathBuf {
        match mode {
            RagMode::Server => self.server_store_path(),
            RagMode::Client => self.local_store_path(),
        }
    }

    pub fn save_settings(&self) -> Result<()> {
        self.settings.save(&self.settings_path())
    }
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_settings_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(&dir.path().join(SETTINGS_FILE)).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.rag.enabled);
        assert_eq!(settings.rag.mode, RagMode::Server);
    }

    #[test]
    fn test_settings_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let settings = Settings {
            rag: RagSettings {
                enabled: false,
                mode: RagMode::Client,
            },
            model: Some("gemini-2.0-flash".into()),
            history_limit: Some(4),
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_partial_settings_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{"rag":{"mode":"client"}}"#).unwrap();
        let settings = Settings::load(&path).unwrap();
        assert!(settings.rag.enabled);
        assert_eq!(settings.rag.mode, RagMode::Client);
    }

    #[test]
    fn test_stream_limit_zero_disables_cap() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            stream_buffer_limit: Some(0),
            history_limit: Some(2),
            ..Settings::default()
        };
        settings.save(&dir.path().join(SETTINGS_FILE)).unwrap();
        let config = Config::from_data_dir(dir.path().to_path_buf()).unwrap();
        assert_eq!(config.stream_buffer_limit, None);
        assert_eq!(config.history_limit, 2);
        assert_eq!(config.server_store_path(), dir.path().join(SERVER_STORE_FILE));
    }

    #[test]
    fn test_rag_mode_parsing() {
        assert_eq!(RagMode::from_str_loose("Server"), Some(RagMode::Server));
        assert_eq!(RagMode::from_str_loose("local"), Some(RagMode::Client));
        assert_eq!(RagMode::from_str_loose("hybrid"), None);
        assert_eq!(RagMode::Server.to_string(), "server");
    }
}
