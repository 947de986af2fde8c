use crate::config::AdvisorConfig;
use crate::error::Result;
use nutrikid_generation::{
    CompletionRequest, GenerationBackend, GenerationError, HttpBackendConfig,
    HttpGenerationBackend,
};
use nutrikid_retrieval::{Retrieval, DEFAULT_TOP_K};
use std::sync::Arc;
use std::time::Duration;

/// Token budget and temperature for one kind of generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorSettings {
    pub top_k: usize,
    pub generation_timeout: Duration,
    pub plan: Sampling,
    pub qa: Sampling,
    pub analysis: Sampling,
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        Self::from(&AdvisorConfig::default())
    }
}

impl From<&AdvisorConfig> for AdvisorSettings {
    fn from(config: &AdvisorConfig) -> Self {
        let generation = &config.generation;
        Self {
            top_k: if config.retrieval.top_k == 0 {
                DEFAULT_TOP_K
            } else {
                config.retrieval.top_k
            },
            generation_timeout: config.generation_timeout(),
            plan: Sampling {
                max_tokens: generation.plan_max_tokens,
                temperature: generation.plan_temperature,
            },
            qa: Sampling {
                max_tokens: generation.qa_max_tokens,
                temperature: generation.qa_temperature,
            },
            analysis: Sampling {
                max_tokens: generation.analysis_max_tokens,
                temperature: generation.analysis_temperature,
            },
        }
    }
}

/// Everything a request needs, built once at startup and shared read-only.
#[derive(Clone)]
pub struct AdvisorContext {
    retrieval: Arc<Retrieval>,
    backend: Arc<dyn GenerationBackend>,
    settings: AdvisorSettings,
}

impl AdvisorContext {
    #[must_use]
    pub fn new(
        retrieval: Arc<Retrieval>,
        backend: Arc<dyn GenerationBackend>,
        settings: AdvisorSettings,
    ) -> Self {
        Self {
            retrieval,
            backend,
            settings,
        }
    }

    /// Loads the corpus and builds the HTTP generation client described by `config`.
    pub async fn from_config(config: &AdvisorConfig) -> Result<Self> {
        let retrieval = Retrieval::load(&config.retrieval_settings()).await;
        Self::with_retrieval(config, retrieval)
    }

    /// Like [`AdvisorContext::from_config`] but skips the corpus, for flows that never retrieve.
    pub fn generation_only(config: &AdvisorConfig) -> Result<Self> {
        Self::with_retrieval(config, Retrieval::unavailable())
    }

    fn with_retrieval(config: &AdvisorConfig, retrieval: Retrieval) -> Result<Self> {
        let backend = HttpGenerationBackend::new(HttpBackendConfig {
            base_url: config.generation.base_url.clone(),
            model: config.generation.model.clone(),
            api_token: config.api_token(),
            timeout: config.generation_timeout(),
        })?;
        log::info!(
            "Advisor ready (corpus loaded: {}, generation model: {})",
            retrieval.corpus_loaded(),
            config.generation.model
        );
        Ok(Self::new(
            Arc::new(retrieval),
            Arc::new(backend),
            AdvisorSettings::from(config),
        ))
    }

    #[must_use]
    pub fn retrieval(&self) -> &Retrieval {
        &self.retrieval
    }

    #[must_use]
    pub fn backend(&self) -> &dyn GenerationBackend {
        self.backend.as_ref()
    }

    #[must_use]
    pub const fn settings(&self) -> &AdvisorSettings {
        &self.settings
    }

    /// One bounded attempt against the backend.
    pub(crate) async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<String, GenerationError> {
        let timeout = self.settings.generation_timeout;
        match tokio::time::timeout(timeout, self.backend.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(timeout)),
        }
    }
}

impl std::fmt::Debug for AdvisorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisorContext")
            .field("corpus_loaded", &self.retrieval.corpus_loaded())
            .field("backend", &self.backend.name())
            .field("settings", &self.settings)
            .finish()
    }
}
