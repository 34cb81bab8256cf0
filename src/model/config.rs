use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

const ENV_CONFIG_PATH: &str = "COMPLIANCE_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

const ENV_API_KEY: &str = "API_KEY";
const ENV_LLM_BASE_URL: &str = "LLM_BASE_URL";
const ENV_LLM_MODEL: &str = "LLM_MODEL";
const ENV_STATE_DIR: &str = "STATE_DIR";

const DEFAULT_LLM_BASE_URL: &str = "https://api.aitunnel.ru/v1";
const DEFAULT_LLM_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_STATE_DIR: &str = ".compliance-state";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Remote model endpoint settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible API, e.g. `https://host/v1`
    pub base_url: String,
    /// Model identifier sent with every request
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
        }
    }
}

impl LlmConfig {
    /// URL of the chat completions endpoint
    pub fn completions_url(&self) -> Result<Url, url::ParseError> {
        let mut base = self.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        Url::parse(&base)?.join("chat/completions")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the persisted workflow entries
    pub state_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Largest accepted JSON body, uploads are base64 inside it
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    /// Bearer credential for the model API; checked on each call, not at startup
    pub api_key: Option<String>,
    pub port: u16,
    pub host: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
            api_key: None,
            port: 8080,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let config_path = std::env::var(ENV_CONFIG_PATH)
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut file = Self::load_config_file(&config_path).unwrap_or_default();

        if let Ok(base_url) = std::env::var(ENV_LLM_BASE_URL) {
            file.llm.base_url = base_url;
        }
        if let Ok(model) = std::env::var(ENV_LLM_MODEL) {
            file.llm.model = model;
        }
        if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
            file.storage.state_dir = PathBuf::from(dir);
        }

        let api_key = std::env::var(ENV_API_KEY)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        Self {
            llm: file.llm,
            storage: file.storage,
            server: file.server,
            api_key,
            port,
            host,
        }
    }

    /// Load configuration from YAML file
    fn load_config_file(path: &str) -> Option<ConfigFile> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => Self::parse_config(path, &contents),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                None
            }
        }
    }

    fn parse_config(path: &Path, contents: &str) -> Option<ConfigFile> {
        let contents = contents.trim();
        if contents.is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Some(ConfigFile::default());
        }

        match serde_yaml::from_str(contents) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded configuration from file");
                Some(config)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to parse config file, using defaults");
                None
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url_keeps_version_segment() {
        let llm = LlmConfig::default();
        assert_eq!(
            llm.completions_url().unwrap().as_str(),
            "https://api.aitunnel.ru/v1/chat/completions"
        );

        let trailing = LlmConfig {
            base_url: "http://localhost:9000/api/v1/".to_string(),
            ..LlmConfig::default()
        };
        assert_eq!(
            trailing.completions_url().unwrap().as_str(),
            "http://localhost:9000/api/v1/chat/completions"
        );
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let parsed = Config::parse_config(
            Path::new("config.yaml"),
            "llm:\n  model: gpt-4o-mini\nstorage:\n  state_dir: /tmp/state\n",
        )
        .unwrap();
        assert_eq!(parsed.llm.model, "gpt-4o-mini");
        assert_eq!(parsed.llm.base_url, DEFAULT_LLM_BASE_URL);
        assert_eq!(parsed.storage.state_dir, PathBuf::from("/tmp/state"));
        assert_eq!(parsed.server.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_empty_and_invalid_yaml() {
        let empty = Config::parse_config(Path::new("c.yaml"), "   \n").unwrap();
        assert_eq!(empty.llm.model, DEFAULT_LLM_MODEL);
        assert!(Config::parse_config(Path::new("c.yaml"), "llm: [1, 2").is_none());
    }
}
