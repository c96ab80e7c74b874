// src/handlers/system.rs

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    common::safe_mode::{self, SafeModeStatus},
    config::AppState,
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: &'static str,
    pub safe_mode: SafeModeStatus,
}

// GET /api/health
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "System",
    responses(
        (status = 200, description = "Serviço no ar, com o estado do modo seguro", body = HealthResponse)
    )
)]
pub async fn health(State(app_state): State<AppState>) -> Json<HealthResponse> {
    // Reavaliado a cada chamada, nunca guardado
    Json(HealthResponse {
        status: "ok",
        safe_mode: safe_mode::evaluate(&app_state.config),
    })
}
