use crate::api::ApiResponse;
use axum::{http::StatusCode, response::Json};
use tracing::{error, info, warn};

/// Failures surfaced by the quiz session engine
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("A display name must be set before starting a quiz")]
    MissingDisplayName,

    #[error("Quiz not found: {0}")]
    UnknownQuiz(String),

    #[error("Quiz '{0}' has no questions")]
    EmptyQuiz(String),

    #[error("Cannot {action} while in {state} state")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },

    #[error("Question {index} is not the current question ({current})")]
    QuestionNotCurrent { index: usize, current: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Failures talking to the AI assistant endpoint or its upstream gateway
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("AI credits exhausted. Please add more credits.")]
    CreditsExhausted,

    #[error("AI service error (status {status})")]
    Upstream { status: u16 },

    #[error("Assistant API key is not configured")]
    MissingApiKey,

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl AssistantError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => AssistantError::RateLimited,
            402 => AssistantError::CreditsExhausted,
            other => AssistantError::Upstream { status: other },
        }
    }
}

/// Centralized error types for consistent API error handling
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Assistant(#[from] AssistantError),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Error context for structured logging
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: String,
    pub resource_id: Option<String>,
    pub resource_type: String,
}

impl ErrorContext {
    pub fn new(operation: &str, resource_type: &str) -> Self {
        Self {
            operation: operation.to_string(),
            resource_id: None,
            resource_type: resource_type.to_string(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }
}

impl ApiError {
    /// Convert API error to HTTP response with consistent structure and logging
    pub fn to_response_with_context(
        self,
        context: ErrorContext,
    ) -> (StatusCode, Json<ApiResponse<()>>) {
        match &self {
            ApiError::NotFound(_) => {
                info!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Resource not found"
                );
                (
                    StatusCode::NOT_FOUND,
                    Json(ApiResponse::error(format!("{} not found", context.resource_type))),
                )
            }
            ApiError::BadRequest(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    error = %self,
                    "Bad request"
                );
                (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::error(self.to_string())),
                )
            }
            ApiError::Assistant(inner) => {
                let status = match inner {
                    AssistantError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                    AssistantError::CreditsExhausted => StatusCode::PAYMENT_REQUIRED,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let message = match inner {
                    AssistantError::RateLimited
                    | AssistantError::CreditsExhausted
                    | AssistantError::MissingApiKey => inner.to_string(),
                    _ => "AI service error".to_string(),
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    error!(
                        operation = %context.operation,
                        resource_type = %context.resource_type,
                        error = %self,
                        "AI assistant error"
                    );
                } else {
                    warn!(
                        operation = %context.operation,
                        resource_type = %context.resource_type,
                        error = %self,
                        "AI assistant unavailable"
                    );
                }
                (status, Json(ApiResponse::error(message)))
            }
            ApiError::InternalError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Internal server error"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::error(
                        "An internal error occurred. Please try again.".to_string(),
                    )),
                )
            }
        }
    }
}
