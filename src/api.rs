use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::{
    assistant::{AssistantProxy, AssistantRequest},
    catalog::QuizCatalog,
    errors::{ApiError, ErrorContext},
    models::{QuizDefinition, QuizSummary},
};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<QuizCatalog>,
    pub assistant: AssistantProxy,
}

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub quiz_count: usize,
    pub assistant_configured: bool,
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthStatus>> {
    Json(ApiResponse::success(HealthStatus {
        status: "ok",
        quiz_count: state.catalog.len(),
        assistant_configured: state.assistant.is_configured(),
    }))
}

pub async fn list_quizzes(State(state): State<AppState>) -> Json<ApiResponse<Vec<QuizSummary>>> {
    let summaries = state.catalog.summaries();
    debug!(quiz_count = summaries.len(), "Listing quizzes");
    Json(ApiResponse::success(summaries))
}

pub async fn get_quiz(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<QuizDefinition> {
    match state.catalog.get(&id) {
        Some(quiz) => {
            debug!(quiz_id = %id, question_count = quiz.question_count(), "Quiz retrieved");
            Ok(Json(ApiResponse::success(quiz.as_ref().clone())))
        }
        None => {
            let error = ApiError::NotFound(format!("Quiz '{}' not found", id));
            let context = ErrorContext::new("get_quiz", "Quiz").with_id(&id);
            Err(error.to_response_with_context(context))
        }
    }
}

/// Forward a chat or semantic-search request and stream the gateway's event stream back
pub async fn ai_knowledge_assistant(
    State(state): State<AppState>,
    Json(request): Json<AssistantRequest>,
) -> Result<Response, (StatusCode, Json<ApiResponse<()>>)> {
    if request.messages.is_empty() {
        let error = ApiError::BadRequest("At least one message is required".to_string());
        let context = ErrorContext::new("ai_knowledge_assistant", "assistant");
        return Err(error.to_response_with_context(context));
    }

    let mode = request.mode;
    match state.assistant.forward(request).await {
        Ok(upstream) => {
            info!(mode = %mode, "Streaming assistant reply");
            let body = Body::from_stream(upstream.bytes_stream());
            Ok(([(header::CONTENT_TYPE, "text/event-stream")], body).into_response())
        }
        Err(e) => {
            let context = ErrorContext::new("ai_knowledge_assistant", "assistant")
                .with_id(mode.as_str());
            Err(ApiError::from(e).to_response_with_context(context))
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/quizzes", get(list_quizzes))
        .route("/api/quizzes/:id", get(get_quiz))
        .route("/api/ai-knowledge-assistant", post(ai_knowledge_assistant))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}
