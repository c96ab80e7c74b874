// src/handlers/tenancy.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        rbac::{AdminOrAbove, Authorized},
    },
    models::tenancy::{
        AddMemberPayload, CreateTenantPayload, MemberAdded, Membership, Tenant,
        TenantMembership, UpdateMemberRolePayload,
    },
};

// POST /api/tenants
#[utoipa::path(
    post,
    path = "/api/tenants",
    tag = "Tenancy",
    request_body = CreateTenantPayload,
    responses(
        (status = 201, description = "Tenant criado; o criador vira owner", body = Tenant),
        (status = 400, description = "Dados inválidos"),
        (status = 409, description = "Slug já em uso")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_tenant(
    State(app_state): State<AppState>,
    // Precisamos do utilizador autenticado para o podermos tornar "dono"
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CreateTenantPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let tenant = app_state
        .tenant_service
        .create_tenant(user.id, &payload.name, &payload.slug, payload.plan.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(tenant)))
}

// GET /api/tenants
#[utoipa::path(
    get,
    path = "/api/tenants",
    tag = "Tenancy",
    responses(
        (status = 200, description = "Tenants do usuário", body = Vec<TenantMembership>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_my_tenants(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<TenantMembership>>, AppError> {
    let tenants = app_state.auth_service.list_my_tenants(user.id).await?;
    Ok(Json(tenants))
}

// POST /api/tenants/members
#[utoipa::path(
    post,
    path = "/api/tenants/members",
    tag = "Tenancy",
    request_body = AddMemberPayload,
    responses(
        (status = 201, description = "Membro adicionado. Para e-mail sem cadastro ativo, `inviteToken` aparece só aqui.", body = MemberAdded),
        (status = 403, description = "Cargo insuficiente"),
        (status = 409, description = "Já é membro")
    ),
    params(("x-tenant-id" = Uuid, Header, description = "ID do tenant")),
    security(("api_jwt" = []))
)]
pub async fn add_member(
    State(app_state): State<AppState>,
    Authorized(ctx, _): Authorized<AdminOrAbove>,
    Json(payload): Json<AddMemberPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let added = app_state
        .tenant_service
        .add_member(&ctx, &payload.email, payload.role)
        .await?;

    Ok((StatusCode::CREATED, Json(added)))
}

// PATCH /api/tenants/members/{user_id}
#[utoipa::path(
    patch,
    path = "/api/tenants/members/{user_id}",
    tag = "Tenancy",
    request_body = UpdateMemberRolePayload,
    responses(
        (status = 200, description = "Cargo alterado", body = Membership),
        (status = 400, description = "Removeria o último owner"),
        (status = 403, description = "Cargo insuficiente"),
        (status = 404, description = "Membro não encontrado")
    ),
    params(
        ("user_id" = Uuid, Path, description = "ID do usuário"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_member_role(
    State(app_state): State<AppState>,
    Authorized(ctx, _): Authorized<AdminOrAbove>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateMemberRolePayload>,
) -> Result<Json<Membership>, AppError> {
    let membership = app_state
        .tenant_service
        .update_member_role(&ctx, user_id, payload.role)
        .await?;

    Ok(Json(membership))
}

// DELETE /api/tenants/members/{user_id}
#[utoipa::path(
    delete,
    path = "/api/tenants/members/{user_id}",
    tag = "Tenancy",
    responses(
        (status = 204, description = "Membro removido"),
        (status = 400, description = "Removeria o último owner"),
        (status = 403, description = "Cargo insuficiente"),
        (status = 404, description = "Membro não encontrado")
    ),
    params(
        ("user_id" = Uuid, Path, description = "ID do usuário"),
        ("x-tenant-id" = Uuid, Header, description = "ID do tenant")
    ),
    security(("api_jwt" = []))
)]
pub async fn remove_member(
    State(app_state): State<AppState>,
    Authorized(ctx, _): Authorized<AdminOrAbove>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.tenant_service.remove_member(&ctx, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
