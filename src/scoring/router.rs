use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    CompanyId, EntityPair, EscalationStatus, PersonId, Signal, SignalDetail, SignalId, SignalType,
};
use super::repository::{EngineStore, RuleStore, StoreError};
use super::runner::{BatchRunner, EngineError, ScoringSettings};

/// Shared state for the scoring endpoints: the store, the rule source, and
/// the run settings.
pub struct EngineState<S, R> {
    pub store: Arc<S>,
    pub rules: Arc<R>,
    pub settings: ScoringSettings,
}

static SIGNAL_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_signal_id() -> SignalId {
    let id = SIGNAL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SignalId(format!("sig-{id:06}"))
}

/// Router builder exposing signal intake, batch runs, and the outbound
/// score/trigger tables.
pub fn scoring_router<S, R>(state: Arc<EngineState<S, R>>) -> Router
where
    S: EngineStore + 'static,
    R: RuleStore + 'static,
{
    Router::new()
        .route("/api/v1/signals", post(ingest_handler::<S, R>))
        .route("/api/v1/scoring/runs", post(run_handler::<S, R>))
        .route(
            "/api/v1/scores/:person/:company",
            get(score_handler::<S, R>),
        )
        .route("/api/v1/triggers", get(triggers_handler::<S, R>))
        .route("/api/v1/escalations", get(escalations_handler::<S, R>))
        .route(
            "/api/v1/escalations/:escalation_id/status",
            post(escalation_status_handler::<S, R>),
        )
        .route(
            "/api/v1/triggers/:trigger_id/processed",
            post(trigger_processed_handler::<S, R>),
        )
        .with_state(state)
}

/// Inbound signal shape; producers may post at any time, independent of the
/// engine's run cadence.
#[derive(Debug, Deserialize)]
pub struct SignalSubmission {
    #[serde(default)]
    pub id: Option<String>,
    pub person_id: String,
    pub company_id: String,
    pub signal_type: String,
    pub source: String,
    pub detail: SignalDetail,
    pub occurred_at: DateTime<Utc>,
}

async fn ingest_handler<S, R>(
    State(state): State<Arc<EngineState<S, R>>>,
    axum::Json(submission): axum::Json<SignalSubmission>,
) -> Response
where
    S: EngineStore + 'static,
    R: RuleStore + 'static,
{
    let signal = Signal {
        id: submission.id.map(SignalId).unwrap_or_else(next_signal_id),
        person: PersonId(submission.person_id),
        company: CompanyId(submission.company_id),
        signal_type: SignalType::new(submission.signal_type),
        source: submission.source,
        detail: submission.detail,
        occurred_at: submission.occurred_at,
        consumed: false,
    };

    match state.store.append(signal) {
        Ok(stored) => {
            let payload = json!({ "signal_id": stored.id.0 });
            (StatusCode::ACCEPTED, axum::Json(payload)).into_response()
        }
        Err(StoreError::Conflict) => {
            let payload = json!({ "error": "signal already exists" });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(other) => store_error_response(other),
    }
}

async fn run_handler<S, R>(State(state): State<Arc<EngineState<S, R>>>) -> Response
where
    S: EngineStore + 'static,
    R: RuleStore + 'static,
{
    let runner = BatchRunner::new(state.store.as_ref(), state.rules.as_ref(), &state.settings);
    match runner.run(Utc::now()) {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(err @ (EngineError::Rules(_) | EngineError::Store(_))) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(payload)).into_response()
        }
        Err(err) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

async fn score_handler<S, R>(
    State(state): State<Arc<EngineState<S, R>>>,
    Path((person, company)): Path<(String, String)>,
) -> Response
where
    S: EngineStore + 'static,
    R: RuleStore + 'static,
{
    let pair = EntityPair::new(person, company);
    match state.store.fetch(&pair) {
        Ok(Some(record)) => (StatusCode::OK, axum::Json(record)).into_response(),
        Ok(None) => {
            let payload = json!({
                "error": "no score recorded for pair",
                "person_id": pair.person.0,
                "company_id": pair.company.0,
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => store_error_response(other),
    }
}

async fn triggers_handler<S, R>(State(state): State<Arc<EngineState<S, R>>>) -> Response
where
    S: EngineStore + 'static,
    R: RuleStore + 'static,
{
    match state.store.open_triggers() {
        Ok(triggers) => (StatusCode::OK, axum::Json(triggers)).into_response(),
        Err(other) => store_error_response(other),
    }
}

async fn escalations_handler<S, R>(State(state): State<Arc<EngineState<S, R>>>) -> Response
where
    S: EngineStore + 'static,
    R: RuleStore + 'static,
{
    match state.store.pending_escalations() {
        Ok(escalations) => (StatusCode::OK, axum::Json(escalations)).into_response(),
        Err(other) => store_error_response(other),
    }
}

/// Status report from the scheduling consumer.
#[derive(Debug, Deserialize)]
pub struct EscalationStatusUpdate {
    pub status: EscalationStatus,
}

async fn escalation_status_handler<S, R>(
    State(state): State<Arc<EngineState<S, R>>>,
    Path(escalation_id): Path<String>,
    axum::Json(update): axum::Json<EscalationStatusUpdate>,
) -> Response
where
    S: EngineStore + 'static,
    R: RuleStore + 'static,
{
    match state
        .store
        .update_escalation_status(&escalation_id, update.status)
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(StoreError::NotFound) => {
            let payload = json!({ "error": "escalation not found", "escalation_id": escalation_id });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => store_error_response(other),
    }
}

async fn trigger_processed_handler<S, R>(
    State(state): State<Arc<EngineState<S, R>>>,
    Path(trigger_id): Path<String>,
) -> Response
where
    S: EngineStore + 'static,
    R: RuleStore + 'static,
{
    match state.store.mark_trigger_processed(&trigger_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(StoreError::NotFound) => {
            let payload = json!({ "error": "trigger not found", "trigger_id": trigger_id });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => store_error_response(other),
    }
}

fn store_error_response(error: StoreError) -> Response {
    let payload = json!({ "error": error.to_string() });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
}
