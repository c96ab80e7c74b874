// src/handlers/preview.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        rate_limit::RateGate,
        rbac::{AdminOrAbove, Authorized},
    },
    models::preview::{
        CreatePreviewPayload, CreatePreviewResponse, PreviewSessionInfo, PreviewValidation,
        ValidatePreviewQuery,
    },
};

// POST /api/preview/create
#[utoipa::path(
    post,
    path = "/api/preview/create",
    tag = "Preview",
    request_body = CreatePreviewPayload,
    responses(
        (status = 201, description = "Sessão criada; o token só aparece aqui", body = CreatePreviewResponse),
        (status = 403, description = "Cargo insuficiente"),
        (status = 429, description = "Limite de requisições")
    ),
    params(("x-tenant-id" = Uuid, Header, description = "ID do tenant")),
    security(("api_jwt" = []))
)]
pub async fn create_preview(
    State(app_state): State<AppState>,
    Authorized(ctx, _): Authorized<AdminOrAbove>,
    _gate: RateGate,
    Json(payload): Json<CreatePreviewPayload>,
) -> Result<impl IntoResponse, AppError> {
    let created = app_state.preview_service.create(&ctx, payload.role).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// GET /api/preview/validate?token=... (público)
#[utoipa::path(
    get,
    path = "/api/preview/validate",
    tag = "Preview",
    params(ValidatePreviewQuery),
    responses(
        (status = 200, description = "Sessão ativa e suas restrições", body = PreviewValidation),
        (status = 404, description = "Token desconhecido"),
        (status = 410, description = "Sessão expirada ou revogada")
    )
)]
pub async fn validate_preview(
    State(app_state): State<AppState>,
    Query(query): Query<ValidatePreviewQuery>,
) -> Result<Json<PreviewValidation>, AppError> {
    let validation = app_state.preview_service.validate(&query.token).await?;
    Ok(Json(validation))
}

// POST /api/preview/revoke/{id}
#[utoipa::path(
    post,
    path = "/api/preview/revoke/{id}",
    tag = "Preview",
    responses(
        (status = 200, description = "Sessão revogada", body = PreviewSessionInfo),
        (status = 400, description = "Já revogada"),
        (status = 404, description = "Sessão não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da sessão"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant")
    ),
    security(("api_jwt" = []))
)]
pub async fn revoke_preview(
    State(app_state): State<AppState>,
    Authorized(ctx, _): Authorized<AdminOrAbove>,
    Path(id): Path<Uuid>,
) -> Result<Json<PreviewSessionInfo>, AppError> {
    let session = app_state.preview_service.revoke(&ctx, id).await?;
    Ok(Json(session))
}

// GET /api/preview
#[utoipa::path(
    get,
    path = "/api/preview",
    tag = "Preview",
    responses(
        (status = 200, description = "Sessões do tenant com status derivado", body = Vec<PreviewSessionInfo>)
    ),
    params(("x-tenant-id" = Uuid, Header, description = "ID do tenant")),
    security(("api_jwt" = []))
)]
pub async fn list_previews(
    State(app_state): State<AppState>,
    Authorized(ctx, _): Authorized<AdminOrAbove>,
) -> Result<Json<Vec<PreviewSessionInfo>>, AppError> {
    let sessions = app_state.preview_service.list(ctx.tenant_id()).await?;
    Ok(Json(sessions))
}

// DELETE /api/preview/{id}
#[utoipa::path(
    delete,
    path = "/api/preview/{id}",
    tag = "Preview",
    responses(
        (status = 204, description = "Sessão removida"),
        (status = 404, description = "Sessão não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da sessão"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_preview(
    State(app_state): State<AppState>,
    Authorized(ctx, _): Authorized<AdminOrAbove>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.preview_service.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
