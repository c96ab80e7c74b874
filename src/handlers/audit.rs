// src/handlers/audit.rs

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::tenancy::TenantAccess,
    models::audit::{AuditPage, AuditQuery},
};

// GET /api/audit
#[utoipa::path(
    get,
    path = "/api/audit",
    tag = "Audit",
    params(
        AuditQuery,
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant")
    ),
    responses(
        (status = 200, description = "Trilha de auditoria, mais recentes primeiro", body = AuditPage),
        (status = 401, description = "Não autenticado"),
        (status = 403, description = "Sem acesso ao tenant ou escopo 'read' ausente")
    ),
    security(("api_jwt" = []), ("api_key" = []))
)]
pub async fn list_audit(
    State(app_state): State<AppState>,
    access: TenantAccess,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditPage>, AppError> {
    access.require_scope("read")?;
    let page = app_state.audit_service.list(access.tenant_id(), &query).await?;
    Ok(Json(page))
}
