//! Request handlers and the error-to-response mapping.
//!
//! 5xx bodies carry a fixed, generic message per endpoint; the detail is only
//! logged. 400 bodies describe what was wrong with the request.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use biochat_core::conversation::SessionId;
use biochat_core::error::{Error, ErrorKind};

use crate::{SESSION_HEADER, SharedState};

const EMBEDDING_FAILURE: &str = "Failed to create embedding.";
const MATCH_FAILURE: &str = "Failed to find nearest match.";

/// Longest client-supplied session id that is honored.
const MAX_SESSION_ID_LEN: usize = 128;

// --- DTOs ---

#[derive(Debug, Deserialize)]
pub struct CreateEmbeddingRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEmbeddingResponse {
    pub embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
pub struct FindNearestMatchRequest {
    pub embedding: Vec<f32>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContentResponse {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    sessions: usize,
}

// --- Errors ---

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Map a pipeline error. Anything the caller cannot fix becomes a 500
    /// with `public` as the body.
    fn from_pipeline(err: Error, public: &'static str) -> Self {
        if err.is_client_error() {
            return Self::bad_request(err.to_string());
        }
        error!(kind = ?err.kind(), error = %err, "{public}");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: public.to_string(),
        }
    }

    fn from_rejection(rejection: JsonRejection) -> Self {
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

// --- Handlers ---

pub async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.pipeline.sessions().len().await,
    })
}

/// `POST /api/createEmbedding`: `{message}` to `{embedding}`.
pub async fn create_embedding_handler(
    State(state): State<SharedState>,
    payload: Result<Json<CreateEmbeddingRequest>, JsonRejection>,
) -> Result<Json<CreateEmbeddingResponse>, ApiError> {
    let Json(request) = payload.map_err(ApiError::from_rejection)?;
    if request.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    let embedding = state
        .pipeline
        .embed(&request.message)
        .await
        .map_err(|e| ApiError::from_pipeline(e, EMBEDDING_FAILURE))?;

    Ok(Json(CreateEmbeddingResponse { embedding }))
}

/// `POST /api/findNearestMatch`: `{embedding, message}` to `{content}`.
pub async fn find_nearest_match_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<FindNearestMatchRequest>, JsonRejection>,
) -> Response {
    let session = session_from_headers(&headers);

    let result: Result<ContentResponse, ApiError> = async {
        let Json(request) = payload.map_err(ApiError::from_rejection)?;
        let content = state
            .pipeline
            .answer_with_embedding(&session, &request.embedding, &request.message)
            .await
            .map_err(|e| ApiError::from_pipeline(e, MATCH_FAILURE))?;
        Ok(ContentResponse { content })
    }
    .await;

    in_session(&session, result)
}

/// `POST /api/chat`: embed, retrieve, and answer in one call.
pub async fn chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let session = session_from_headers(&headers);

    let result: Result<ContentResponse, ApiError> = async {
        let Json(request) = payload.map_err(ApiError::from_rejection)?;
        let content = state
            .pipeline
            .answer(&session, &request.message)
            .await
            .map_err(|e| {
                let public = match e.kind() {
                    ErrorKind::EmbeddingUnavailable => EMBEDDING_FAILURE,
                    _ => MATCH_FAILURE,
                };
                ApiError::from_pipeline(e, public)
            })?;
        Ok(ContentResponse { content })
    }
    .await;

    in_session(&session, result)
}

/// The caller's session id, or a fresh one when absent or unusable.
fn session_from_headers(headers: &HeaderMap) -> SessionId {
    let supplied = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_SESSION_ID_LEN);

    match supplied {
        Some(id) => SessionId::from(id),
        None => {
            let id = SessionId::new();
            info!(session = %id, "New session");
            id
        }
    }
}

fn in_session(session: &SessionId, result: Result<ContentResponse, ApiError>) -> Response {
    let mut response = match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => e.into_response(),
    };
    if let Ok(value) = HeaderValue::from_str(session.as_str()) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}
