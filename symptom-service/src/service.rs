use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use intake_flow::{
    ConversationOrchestrator, DiseaseCandidate, InMemoryConversationStore,
    InMemoryDiseaseMatcher, InMemoryHealthLookup, IntakeError, TurnRequest,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::{
    backend::AnthropicMessagesBackend,
    models::{
        StartConversationRequest, StartConversationResponse, SubmitTurnRequest,
        SubmitTurnResponse,
    },
};

type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "conversation_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn map_intake_error(err: IntakeError) -> ApiError {
    match err {
        IntakeError::Validation(message) => bad_request_error(&message),
        IntakeError::ConversationNotFound(id) => not_found_error("Conversation not found", &id),
        other => {
            error!("Request failed: {other}");
            internal_error("Internal Server Error", &other.to_string())
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ConversationOrchestrator>,
}

pub async fn create_app() -> anyhow::Result<Router> {
    let app_state = create_app_state()?;
    Ok(build_router(app_state))
}

fn create_app_state() -> anyhow::Result<AppState> {
    let llm = Arc::new(AnthropicMessagesBackend::from_env()?);
    let orchestrator = ConversationOrchestrator::new(
        Arc::new(InMemoryConversationStore::new()),
        Arc::new(InMemoryHealthLookup::new()),
        Arc::new(InMemoryDiseaseMatcher::new(load_disease_catalog()?)),
        llm,
    );

    Ok(AppState {
        orchestrator: Arc::new(orchestrator),
    })
}

/// Load the disease knowledge base from DISEASE_CATALOG_PATH (a JSON array
/// of candidates), or start with an empty catalog.
fn load_disease_catalog() -> anyhow::Result<Vec<DiseaseCandidate>> {
    let Ok(path) = std::env::var("DISEASE_CATALOG_PATH") else {
        info!("DISEASE_CATALOG_PATH not set, starting with an empty disease catalog");
        return Ok(Vec::new());
    };
    let contents = std::fs::read_to_string(&path)?;
    let catalog: Vec<DiseaseCandidate> = serde_json::from_str(&contents)?;
    info!("Loaded {} disease candidates from {}", catalog.len(), path);
    Ok(catalog)
}

fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/conversations/start", post(start_conversation))
        .route("/conversations/turn", post(submit_turn))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Symptom Intake Service",
        "version": "0.1.0",
        "description": "Conversational health-symptom intake backed by an LLM",
        "endpoints": {
            "POST /conversations/start": "Start or resume a conversation",
            "POST /conversations/turn": "Submit a user turn and get the assistant's analysis",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn start_conversation(
    State(state): State<AppState>,
    Json(request): Json<StartConversationRequest>,
) -> Result<(StatusCode, Json<StartConversationResponse>), ApiError> {
    info!(user_id = %request.user_id, "Start-or-resume request");

    let outcome = state
        .orchestrator
        .start_or_resume(&request.user_id, request.conversation_id)
        .await
        .map_err(map_intake_error)?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(StartConversationResponse {
            conversation_id: outcome.conversation.id,
            user_id: outcome.conversation.user_id,
            messages: outcome.conversation.messages,
        }),
    ))
}

async fn submit_turn(
    State(state): State<AppState>,
    Json(request): Json<SubmitTurnRequest>,
) -> Result<Json<SubmitTurnResponse>, ApiError> {
    info!(conversation_id = %request.conversation_id, "Submit-turn request");

    let outcome = state
        .orchestrator
        .submit_turn(TurnRequest {
            conversation_id: request.conversation_id,
            user_id: request.user_id,
            user_message: request.user_message,
            symptoms: request.symptoms,
        })
        .await
        .map_err(map_intake_error)?;

    Ok(Json(SubmitTurnResponse {
        conversation_id: outcome.conversation_id,
        assistant_reply: outcome.assistant_reply,
        messages: outcome.messages,
    }))
}
