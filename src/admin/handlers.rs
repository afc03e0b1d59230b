use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::client::CacheStats;
use crate::health::state::HealthStatus;
use crate::health::tracker::NetworkHealth;
use crate::resilience::circuit_breaker::CircuitState;
use crate::token::HealthReport;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub circuit: CircuitState,
    pub health: HealthStatus,
    pub score: u8,
    pub cached_clients: usize,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub status: &'static str,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let health = state.health.get_network_health();
    let status = match health.circuit.state {
        CircuitState::Closed => "operational",
        CircuitState::HalfOpen => "recovering",
        CircuitState::Open => "unavailable",
    };
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status,
        circuit: health.circuit.state,
        health: health.status,
        score: health.score,
        cached_clients: state.cache.len(),
    })
}

pub async fn get_health(State(state): State<AdminState>) -> Json<NetworkHealth> {
    Json(state.health.get_network_health())
}

pub async fn get_cache(State(state): State<AdminState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

pub async fn analyze_token(
    State(state): State<AdminState>,
    Json(request): Json<AnalyzeRequest>,
) -> Json<HealthReport> {
    Json(state.tokens.clean_and_analyze(request.token.as_deref()))
}

pub async fn reset_state(State(state): State<AdminState>) -> Json<ResetResponse> {
    state.reset();
    Json(ResetResponse { status: "reset" })
}
