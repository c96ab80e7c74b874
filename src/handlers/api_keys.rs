// src/handlers/api_keys.rs

use axum::{
    extract::{Path, State},
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
        tenancy::TenantAccess,
    },
    models::api_keys::{
        known_scopes, ApiKeyInfo, ApiKeySecretResponse, CreateApiKeyPayload, ScopeInfo,
        UpdateScopesPayload,
    },
};

// GET /api/api-keys/scopes
#[utoipa::path(
    get,
    path = "/api/api-keys/scopes",
    tag = "API Keys",
    responses(
        (status = 200, description = "Registro de escopos disponíveis", body = Vec<ScopeInfo>),
        (status = 401, description = "Não autenticado"),
        (status = 403, description = "Sem acesso ao tenant")
    ),
    params(("x-tenant-id" = Uuid, Header, description = "ID do tenant")),
    security(("api_jwt" = []), ("api_key" = []))
)]
pub async fn list_scopes(_access: TenantAccess) -> Json<Vec<ScopeInfo>> {
    Json(known_scopes())
}

// GET /api/api-keys
#[utoipa::path(
    get,
    path = "/api/api-keys",
    tag = "API Keys",
    responses(
        (status = 200, description = "Chaves do tenant (sem segredo)", body = Vec<ApiKeyInfo>),
        (status = 401, description = "Não autenticado"),
        (status = 403, description = "Sem acesso ao tenant ou escopo 'read' ausente")
    ),
    params(("x-tenant-id" = Uuid, Header, description = "ID do tenant")),
    security(("api_jwt" = []), ("api_key" = []))
)]
pub async fn list_keys(
    State(app_state): State<AppState>,
    access: TenantAccess,
) -> Result<Json<Vec<ApiKeyInfo>>, AppError> {
    access.require_scope("read")?;
    let keys = app_state.api_key_service.list(access.tenant_id()).await?;
    Ok(Json(keys))
}

// POST /api/api-keys
#[utoipa::path(
    post,
    path = "/api/api-keys",
    tag = "API Keys",
    request_body = CreateApiKeyPayload,
    responses(
        (status = 201, description = "Chave criada. O valor em `apiKey` não será exibido novamente.", body = ApiKeySecretResponse),
        (status = 400, description = "Nome ou escopos inválidos"),
        (status = 403, description = "Cargo insuficiente"),
        (status = 429, description = "Limite de requisições")
    ),
    params(("x-tenant-id" = Uuid, Header, description = "ID do tenant")),
    security(("api_jwt" = []))
)]
pub async fn create_key(
    State(app_state): State<AppState>,
    Authorized(ctx, _): Authorized<AdminOrAbove>,
    _gate: RateGate,
    Json(payload): Json<CreateApiKeyPayload>,
) -> Result<impl IntoResponse, AppError> {
    let created = app_state.api_key_service.create(&ctx, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// PATCH /api/api-keys/{id}/scopes
#[utoipa::path(
    patch,
    path = "/api/api-keys/{id}/scopes",
    tag = "API Keys",
    request_body = UpdateScopesPayload,
    responses(
        (status = 200, description = "Escopos atualizados", body = ApiKeyInfo),
        (status = 400, description = "Escopo desconhecido ou chave revogada"),
        (status = 404, description = "Chave não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da chave"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_scopes(
    State(app_state): State<AppState>,
    Authorized(ctx, _): Authorized<AdminOrAbove>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateScopesPayload>,
) -> Result<Json<ApiKeyInfo>, AppError> {
    let key = app_state
        .api_key_service
        .update_scopes(&ctx, id, &payload.scopes)
        .await?;
    Ok(Json(key))
}

// POST /api/api-keys/{id}/rotate
#[utoipa::path(
    post,
    path = "/api/api-keys/{id}/rotate",
    tag = "API Keys",
    responses(
        (status = 200, description = "Novo segredo. O anterior deixou de valer.", body = ApiKeySecretResponse),
        (status = 400, description = "Chave revogada"),
        (status = 404, description = "Chave não encontrada"),
        (status = 429, description = "Limite de requisições")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da chave"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant")
    ),
    security(("api_jwt" = []))
)]
pub async fn rotate_key(
    State(app_state): State<AppState>,
    Authorized(ctx, _): Authorized<AdminOrAbove>,
    _gate: RateGate,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiKeySecretResponse>, AppError> {
    let rotated = app_state.api_key_service.rotate(&ctx, id).await?;
    Ok(Json(rotated))
}

// POST /api/api-keys/{id}/revoke
#[utoipa::path(
    post,
    path = "/api/api-keys/{id}/revoke",
    tag = "API Keys",
    responses(
        (status = 200, description = "Chave revogada", body = ApiKeyInfo),
        (status = 400, description = "Chave já revogada"),
        (status = 404, description = "Chave não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da chave"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant")
    ),
    security(("api_jwt" = []))
)]
pub async fn revoke_key(
    State(app_state): State<AppState>,
    Authorized(ctx, _): Authorized<AdminOrAbove>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiKeyInfo>, AppError> {
    let key = app_state.api_key_service.revoke(&ctx, id).await?;
    Ok(Json(key))
}

// DELETE /api/api-keys/{id}
#[utoipa::path(
    delete,
    path = "/api/api-keys/{id}",
    tag = "API Keys",
    responses(
        (status = 204, description = "Chave removida"),
        (status = 404, description = "Chave não encontrada")
    ),
    params(
        ("id" = Uuid, Path, description = "ID da chave"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_key(
    State(app_state): State<AppState>,
    Authorized(ctx, _): Authorized<AdminOrAbove>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.api_key_service.delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
