use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use orchestrator::{ChatRequest, Correction, Orchestrator, OrchestratorError};
use serde::{Deserialize, Serialize};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
struct AppState {
    api_token: Option<String>,
    orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatPayload {
    #[serde(default)]
    query: String,
    #[serde(default, alias = "chatbot_id")]
    chatbot_id: String,
    #[serde(default, alias = "session_id")]
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatReply {
    answer: String,
    session_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CorrectionPayload {
    #[serde(default, alias = "chatbot_id")]
    chatbot_id: String,
    #[serde(default, alias = "error_type")]
    error_type: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "correct_answer")]
    correct_answer: String,
    #[serde(default, alias = "additional_notes")]
    additional_notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CorrectionReply {
    correction_id: i64,
}

#[derive(Debug, Serialize)]
struct Health {
    status: String,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,orchestrator=debug,agent_actions=debug"));

    let json = env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("API_PORT").unwrap_or_else(|_| "8787".to_string());
    let api_token = env::var("API_TOKEN").ok().filter(|t| !t.trim().is_empty());
    let cors = cors_layer(env::var("CORS_ALLOWED_ORIGINS").ok().as_deref());

    let orchestrator = Arc::new(Orchestrator::from_env().await?);
    let state = AppState {
        api_token,
        orchestrator: orchestrator.clone(),
    };

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!(%addr, auth = state.api_token.is_some(), "Chat API listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state, cors))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, flushing pending conversation writes");
    orchestrator.flush().await;
    Ok(())
}

fn router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/corrections", post(add_correction))
        .layer(cors)
        .with_state(state)
}

/// Any origin unless `origins` is a comma-separated list of allowed ones.
fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let listed: Vec<HeaderValue> = origins
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty() && *origin != "*")
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if listed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(listed)
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
    }
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    authorize(&state, &headers)?;
    let Json(payload) = payload?;

    let request = ChatRequest {
        query: payload.query,
        chatbot_id: payload.chatbot_id,
        session_id: payload.session_id,
        user_id: caller_id(&headers),
    };
    let response = state.orchestrator.process(request).await?;

    Ok(Json(ChatReply {
        answer: response.answer,
        session_id: response.session_id,
    }))
}

async fn add_correction(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CorrectionPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<CorrectionReply>), ApiError> {
    authorize(&state, &headers)?;
    let Json(payload) = payload?;

    let correction = Correction {
        error_type: payload.error_type,
        description: payload.description,
        correct_answer: payload.correct_answer,
        additional_notes: payload.additional_notes,
    };
    let correction_id = state
        .orchestrator
        .add_correction(&payload.chatbot_id, correction)
        .await?;

    Ok((StatusCode::CREATED, Json(CorrectionReply { correction_id })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.api_token.as_deref() else {
        return Ok(());
    };

    let Some(value) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Err(ApiError::Unauthorized);
    };

    let Ok(value) = value.to_str() else {
        return Err(ApiError::Unauthorized);
    };

    let token = value.strip_prefix("Bearer ").unwrap_or(value);
    if token != expected {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}

fn caller_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Debug)]
enum ApiError {
    Unauthorized,
    InvalidBody(String),
    Chat(OrchestratorError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection.body_text())
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        ApiError::Chat(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, kind) = match self {
            ApiError::Unauthorized => {
                warn!("Unauthorized request");
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string(), "auth_error")
            }
            ApiError::InvalidBody(message) => {
                warn!(%message, "Request body rejected");
                (StatusCode::BAD_REQUEST, message, "invalid_request_error")
            }
            ApiError::Chat(err) => {
                let status = StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                if status.is_server_error() {
                    error!(error = %err, "Request failed");
                } else {
                    warn!(error = %err, "Request rejected");
                }
                let kind = if status.is_server_error() {
                    "server_error"
                } else {
                    "invalid_request_error"
                };
                (status, err.public_message(), kind)
            }
        };

        let body = serde_json::json!({
            "error": {
                "message": message,
                "type": kind
            }
        });
        (status, Json(body)).into_response()
    }
}
