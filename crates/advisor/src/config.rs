use crate::error::{AdvisorError, Result};
use nutrikid_retrieval::{EmbeddingMode, RetrievalSettings, DEFAULT_TOP_K};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when none is given explicitly.
pub const DEFAULT_CONFIG_FILE: &str = "nutrikid.toml";

pub const ENV_INDEX_PATH: &str = "NUTRIKID_INDEX_PATH";
pub const ENV_DOCUMENTS_PATH: &str = "NUTRIKID_DOCUMENTS_PATH";
pub const ENV_MODEL_DIR: &str = "NUTRIKID_MODEL_DIR";
pub const ENV_EMBEDDING_MODE: &str = "NUTRIKID_EMBEDDING_MODE";
pub const ENV_GENERATION_URL: &str = "NUTRIKID_GENERATION_URL";
pub const ENV_GENERATION_MODEL: &str = "NUTRIKID_GENERATION_MODEL";
pub const ENV_GENERATION_TIMEOUT_SECS: &str = "NUTRIKID_GENERATION_TIMEOUT_SECS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub index_path: PathBuf,
    pub documents_path: PathBuf,
    pub model_dir: PathBuf,
    pub embedding_mode: EmbeddingMode,
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("data/index.json"),
            documents_path: PathBuf::from("data/documents.json"),
            model_dir: PathBuf::from("models"),
            embedding_mode: EmbeddingMode::default(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base URL of an OpenAI-compatible chat-completion API.
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the bearer token.
    pub api_token_env: String,
    pub timeout_secs: u64,
    pub plan_max_tokens: u32,
    pub plan_temperature: f32,
    pub qa_max_tokens: u32,
    pub qa_temperature: f32,
    pub analysis_max_tokens: u32,
    pub analysis_temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.huggingface.co/v1".to_string(),
            model: "mistralai/Mistral-7B-Instruct-v0.2".to_string(),
            api_token_env: "HF_TOKEN".to_string(),
            timeout_secs: 60,
            plan_max_tokens: 1500,
            plan_temperature: 0.2,
            qa_max_tokens: 600,
            qa_temperature: 0.3,
            analysis_max_tokens: 600,
            analysis_temperature: 0.2,
        }
    }
}

impl AdvisorConfig {
    /// Defaults, then the config file, then `NUTRIKID_*` environment overrides.
    ///
    /// An explicit `path` must exist. Without one, [`DEFAULT_CONFIG_FILE`] is
    /// read only if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| AdvisorError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded config from {}", path.display());
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Applies overrides from `lookup`; blank values are ignored.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = get(ENV_INDEX_PATH) {
            self.retrieval.index_path = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_DOCUMENTS_PATH) {
            self.retrieval.documents_path = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_MODEL_DIR) {
            self.retrieval.model_dir = PathBuf::from(value);
        }
        if let Some(value) = get(ENV_EMBEDDING_MODE) {
            self.retrieval.embedding_mode =
                EmbeddingMode::parse(&value).map_err(|_| AdvisorError::InvalidEnv {
                    key: ENV_EMBEDDING_MODE,
                    value,
                })?;
        }
        if let Some(value) = get(ENV_GENERATION_URL) {
            self.generation.base_url = value;
        }
        if let Some(value) = get(ENV_GENERATION_MODEL) {
            self.generation.model = value;
        }
        if let Some(value) = get(ENV_GENERATION_TIMEOUT_SECS) {
            self.generation.timeout_secs =
                value.parse().map_err(|_| AdvisorError::InvalidEnv {
                    key: ENV_GENERATION_TIMEOUT_SECS,
                    value,
                })?;
        }
        Ok(())
    }

    #[must_use]
    pub fn retrieval_settings(&self) -> RetrievalSettings {
        RetrievalSettings {
            index_path: self.retrieval.index_path.clone(),
            documents_path: self.retrieval.documents_path.clone(),
            model_dir: self.retrieval.model_dir.clone(),
            embedding_mode: self.retrieval.embedding_mode,
        }
    }

    /// Bearer token from the configured environment variable, if set.
    #[must_use]
    pub fn api_token(&self) -> Option<String> {
        let token = std::env::var(&self.generation.api_token_env)
            .ok()
            .filter(|token| !token.trim().is_empty());
        if token.is_none() {
            log::warn!(
                "{} is not set; generation requests may be rejected",
                self.generation.api_token_env
            );
        }
        token
    }

    #[must_use]
    pub const fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation.timeout_secs)
    }
}
