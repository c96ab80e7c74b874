// src/handlers/connectors.rs

use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::rbac::{AccountAdmins, AnyMember, Authorized},
    models::connectors::{ConnectorStatus, StoreConnectorSecretPayload},
};

// GET /api/connectors
#[utoipa::path(
    get,
    path = "/api/connectors",
    tag = "Connectors",
    responses(
        (status = 200, description = "Provedores configurados (o segredo nunca é devolvido)", body = Vec<ConnectorStatus>)
    ),
    params(("x-tenant-id" = Uuid, Header, description = "ID do tenant")),
    security(("api_jwt" = []))
)]
pub async fn list_connectors(
    State(app_state): State<AppState>,
    Authorized(ctx, _): Authorized<AnyMember>,
) -> Result<Json<Vec<ConnectorStatus>>, AppError> {
    let status = app_state
        .connector_service
        .list_status(ctx.tenant_id())
        .await?;
    Ok(Json(status))
}

// PUT /api/connectors/{provider}/secret
#[utoipa::path(
    put,
    path = "/api/connectors/{provider}/secret",
    tag = "Connectors",
    request_body = StoreConnectorSecretPayload,
    responses(
        (status = 200, description = "Segredo cifrado e gravado", body = ConnectorStatus),
        (status = 400, description = "Provedor ou segredo inválido"),
        (status = 403, description = "Apenas owner ou admin"),
        (status = 503, description = "Modo seguro ativo")
    ),
    params(
        ("provider" = String, Path, description = "Provedor, ex.: stripe"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant")
    ),
    security(("api_jwt" = []))
)]
pub async fn store_connector_secret(
    State(app_state): State<AppState>,
    Authorized(ctx, _): Authorized<AccountAdmins>,
    Path(provider): Path<String>,
    Json(payload): Json<StoreConnectorSecretPayload>,
) -> Result<Json<ConnectorStatus>, AppError> {
    payload.validate()?;
    let status = app_state
        .connector_service
        .store_secret(&ctx, &provider, &payload.secret)
        .await?;
    Ok(Json(status))
}
