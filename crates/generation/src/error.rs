use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GenerationError>;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Generation timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("Generation service rejected credentials (HTTP {0})")]
    Auth(u16),

    #[error("Generation service rate limited the request")]
    RateLimited,

    #[error("Generation service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request to generation service failed: {0}")]
    Request(String),

    #[error("Malformed generation response: {0}")]
    Malformed(String),
}

impl GenerationError {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Why no structured value could be pulled out of model text.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("No JSON object found in model output")]
    NotFound,

    #[error("Extracted JSON is not an object")]
    NotAnObject,

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
