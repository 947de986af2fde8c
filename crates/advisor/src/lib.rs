//! # NutriKid Advisor
//!
//! Request flows over a shared, read-only [`AdvisorContext`]:
//!
//! - **Q&A** ([`answer_question`]): retrieve reference passages, prompt for a
//!   short + detailed answer, split on [`ANSWER_SEPARATOR`].
//! - **Plans** ([`plan::generate_plan`]): deficiency detection, the risk gate,
//!   then at most one bounded generation call parsed into a [`plan::DietPlanResponse`].
//! - **Intake analysis** ([`analyze_intake`]): model-based analysis with a
//!   deterministic food-group fallback.
//!
//! None of the flows surface backend failures as errors: each degrades to a
//! documented fallback response instead.

mod analysis;
mod config;
mod context;
mod error;
pub mod plan;
mod qa;

pub use analysis::{analyze_intake, AnalysisRequest};
pub use config::{
    AdvisorConfig, GenerationConfig, RetrievalConfig, DEFAULT_CONFIG_FILE, ENV_DOCUMENTS_PATH,
    ENV_EMBEDDING_MODE, ENV_GENERATION_MODEL, ENV_GENERATION_TIMEOUT_SECS, ENV_GENERATION_URL,
    ENV_INDEX_PATH, ENV_MODEL_DIR,
};
pub use context::{AdvisorContext, AdvisorSettings, Sampling};
pub use error::{AdvisorError, Result};
pub use qa::{answer_question, Audience, QaAnswer, QaRequest, ANSWER_SEPARATOR, SAFE_MODE_NOTICE};
