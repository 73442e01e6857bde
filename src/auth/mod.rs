use std::path::PathBuf;

use crate::error::{ChatError, Result};

/// Environment variable holding the shared Gemini credential
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// On-disk representation of auth.json
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Default, PartialEq)]
pub struct AuthStore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Where a resolved key came from, for `auth status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Explicit,
    Env,
    Stored,
}

impl AuthStore {
    /// Path to auth.json
    pub fn path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ChatError::Auth("Could not determine config directory".into()))?;
        Ok(config_dir.join("ragchat").join("auth.json"))
    }

    /// Load from disk, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Save to disk with 0600 permissions
    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    pub fn set_key(&mut self, key: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ChatError::Auth("API key cannot be empty".into()));
        }
        self.api_key = Some(key.to_string());
        self.updated_at = Some(chrono::Utc::now().to_rfc3339());
        Ok(())
    }

    pub fn clear(&mut self) {
        self.api_key = None;
        self.updated_at = None;
    }
}

/// Resolve the shared credential: explicit > env var > auth.json.
pub fn resolve_api_key(explicit: Option<&str>) -> Result<Option<(String, KeySource)>> {
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(Some((key.to_string(), KeySource::Explicit)));
    }

    if let Some(key) = std::env::var(API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
    {
        return Ok(Some((key.trim().to_string(), KeySource::Env)));
    }

    let store = AuthStore::load()?;
    Ok(store
        .api_key
        .filter(|k| !k.trim().is_empty())
        .map(|k| (k, KeySource::Stored)))
}

/// Like [`resolve_api_key`] but a missing key is an `Auth` error.
pub fn require_api_key(explicit: Option<&str>) -> Result<String> {
    resolve_api_key(explicit)?
        .map(|(key, _)| key)
        .ok_or_else(|| {
            ChatError::Auth(format!(
                "Gemini API key not provided. Run `ragchat auth set-key` or set {}.",
                API_KEY_ENV
            ))
        })
}

/// Show only the last four characters of a key
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len().min(12) - 4), tail)
}
