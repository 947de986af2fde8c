//! # NutriKid Generation
//!
//! The seam between the advisor and whatever text-generation service backs it.
//!
//! - [`GenerationBackend`] is the port: one chat-completion request in, the
//!   assistant's text out.
//! - [`HttpGenerationBackend`] speaks the OpenAI-compatible
//!   `POST {base_url}/chat/completions` protocol with a bearer token.
//! - [`extract`] turns free-form replies into typed values.

mod backend;
mod error;
pub mod extract;
mod http;

pub use backend::{ChatMessage, CompletionRequest, GenerationBackend, ResponseFormat, Role};
pub use error::{ExtractError, GenerationError, Result};
pub use extract::{extract_json_object, parse_structured};
pub use http::{HttpBackendConfig, HttpGenerationBackend};
