use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FaturaError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    pub provider: Provider,
    pub model: String,
    /// Overrides the provider's public endpoint, e.g. for a proxy.
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Request timeout; the HTTP client default applies when unset.
    pub timeout_secs: Option<u64>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            model: "gemini-2.0-flash".to_string(),
            base_url: None,
            temperature: 0.1,
            max_output_tokens: 1000,
            timeout_secs: None,
            api_key_env: "FATURA_VISION_API_KEY".to_string(),
        }
    }
}

impl VisionSettings {
    pub fn endpoint_base(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => match self.provider {
                Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta".to_string(),
                Provider::OpenAi => "https://api.openai.com/v1".to_string(),
            },
        }
    }

    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_currency")]
    pub default_currency: String,
    #[serde(default = "default_max_image_edge")]
    pub max_image_edge: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub vision: VisionSettings,
}

fn default_currency() -> String {
    "EUR".to_string()
}

fn default_max_image_edge() -> u32 {
    crate::imaging::DEFAULT_MAX_EDGE
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            default_currency: default_currency(),
            max_image_edge: default_max_image_edge(),
            log_level: default_log_level(),
            vision: VisionSettings::default(),
        }
    }
}

impl Settings {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_path().join("fatura.db")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_path().join("uploads")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.data_path().join("exports")
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("fatura")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("fatura")
}

/// Defaults when there is no settings file yet. A file that exists but
/// cannot be read or parsed is an error, never silently replaced.
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&settings_path())
}

fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| FaturaError::Settings(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| FaturaError::Settings(format!("{}: {e}", path.display())))
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| FaturaError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn settings_file_exists() -> bool {
    settings_path().exists()
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.default_currency, "EUR");
        assert_eq!(s.max_image_edge, 1600);
        assert_eq!(s.vision.provider, Provider::Gemini);
        assert_eq!(s.vision.max_output_tokens, 1000);
        assert!(s.vision.timeout_secs.is_none());
        assert!(!s.data_dir.is_empty());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "vision": {"provider": "openai", "model": "gpt-4o-mini"}}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.data_dir, "/tmp/test");
        assert_eq!(s.max_image_edge, 1600);
        assert_eq!(s.vision.provider, Provider::OpenAi);
        assert_eq!(s.vision.model, "gpt-4o-mini");
        assert_eq!(s.vision.api_key_env, "FATURA_VISION_API_KEY");
        assert!((s.vision.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings_from(&dir.path().join("settings.json")).unwrap();
        assert_eq!(s.default_currency, "EUR");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"data_dir": "/srv/ledger", "default_currency": "USD",}"#).unwrap();
        let err = load_settings_from(&path).unwrap_err();
        assert!(matches!(err, FaturaError::Settings(_)));
        assert!(err.to_string().contains("settings.json"));
    }

    #[test]
    fn test_paths_hang_off_data_dir() {
        let s = Settings {
            data_dir: "/data/fatura".to_string(),
            ..Settings::default()
        };
        assert_eq!(s.db_path(), PathBuf::from("/data/fatura/fatura.db"));
        assert_eq!(s.uploads_dir(), PathBuf::from("/data/fatura/uploads"));
    }

    #[test]
    fn test_endpoint_base() {
        let mut v = VisionSettings::default();
        assert!(v.endpoint_base().contains("generativelanguage"));
        v.provider = Provider::OpenAi;
        assert_eq!(v.endpoint_base(), "https://api.openai.com/v1");
        v.base_url = Some("http://localhost:8080/v1/".to_string());
        assert_eq!(v.endpoint_base(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_api_key_read_from_named_env_var() {
        let v = VisionSettings {
            api_key_env: "FATURA_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..VisionSettings::default()
        };
        assert!(v.api_key().is_none());
    }
}
