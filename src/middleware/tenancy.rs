// src/middleware/tenancy.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::{ApiKeyPrincipal, AuthenticatedUser, API_KEY_HEADER},
    models::{api_keys::ApiKeyContext, tenancy::AuthContext},
    services::rbac_service,
};

// O nome do nosso cabeçalho HTTP customizado
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

pub fn tenant_id_from_headers(headers: &HeaderMap) -> Result<Uuid, AppError> {
    let value = headers
        .get(TENANT_ID_HEADER)
        .ok_or_else(|| AppError::invalid("O cabeçalho X-Tenant-ID é obrigatório."))?;

    let value_str = value
        .to_str()
        .map_err(|_| AppError::invalid("Cabeçalho X-Tenant-ID contém caracteres inválidos."))?;

    Uuid::parse_str(value_str.trim())
        .map_err(|_| AppError::invalid("Cabeçalho X-Tenant-ID inválido (não é um UUID)."))
}

// ---
// 1. TenantContext: sessão + vínculo resolvido
// ---
/// O contexto de autorização da requisição. Resolvido UMA vez (autenticação
/// -> cabeçalho -> vínculo) e reaproveitado pelos extratores seguintes.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext(pub AuthContext);

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<TenantContext>() {
            return Ok(*ctx);
        }

        // 1. Quem é
        let AuthenticatedUser(user) = AuthenticatedUser::from_request_parts(parts, state).await?;

        // 2. Qual tenant
        let tenant_id = tenant_id_from_headers(&parts.headers)?;

        // 3. Com qual cargo (sem vínculo => Forbidden)
        let app_state = AppState::from_ref(state);
        let ctx = app_state.tenant_service.resolve(user.id, tenant_id).await?;

        let tenant_ctx = TenantContext(ctx);
        parts.extensions.insert(tenant_ctx);
        Ok(tenant_ctx)
    }
}

// ---
// 2. TenantAccess: membro OU chave de API
// ---
/// Para rotas de leitura que aceitam as duas credenciais. A chave de API
/// já carrega o próprio tenant; o cabeçalho é ignorado nesse caminho.
#[derive(Debug, Clone)]
pub enum TenantAccess {
    Member(AuthContext),
    ApiKey(ApiKeyContext),
}

impl TenantAccess {
    pub fn tenant_id(&self) -> Uuid {
        match self {
            TenantAccess::Member(ctx) => ctx.tenant_id(),
            TenantAccess::ApiKey(key) => key.tenant_id,
        }
    }

    /// Membros passam; chaves precisam do escopo.
    pub fn require_scope(&self, scope: &str) -> Result<(), AppError> {
        match self {
            TenantAccess::Member(_) => Ok(()),
            TenantAccess::ApiKey(key) => rbac_service::require_scope(key, scope),
        }
    }
}

impl<S> FromRequestParts<S> for TenantAccess
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if parts.headers.contains_key(API_KEY_HEADER) {
            let ApiKeyPrincipal(key) = ApiKeyPrincipal::from_request_parts(parts, state).await?;
            return Ok(TenantAccess::ApiKey(key));
        }

        let TenantContext(ctx) = TenantContext::from_request_parts(parts, state).await?;
        Ok(TenantAccess::Member(ctx))
    }
}
