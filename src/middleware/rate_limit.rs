// src/middleware/rate_limit.rs

//! O limite de taxa em si é de um colaborador externo; aqui só consumimos
//! o contrato "bloqueia / libera" nas rotas sensíveis.

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts, OriginalUri},
    http::request::Parts,
};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{auth::client_ip, tenancy::TenantContext},
};

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// `true` libera a requisição.
    async fn allow(&self, key: &str) -> bool;
}

/// Padrão quando nenhum limitador externo está configurado.
pub struct AllowAll;

#[async_trait]
impl RateLimiter for AllowAll {
    async fn allow(&self, _key: &str) -> bool {
        true
    }
}

/// Última etapa da cadeia: autenticação -> tenant -> cargo -> limite.
///
/// Precisa vir DEPOIS do `Authorized` na assinatura do handler (os
/// extratores rodam na ordem dos argumentos). Negado aqui, o handler nem
/// executa, e portanto nada é auditado.
pub struct RateGate;

impl<S> FromRequestParts<S> for RateGate
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tenant = parts
            .extensions
            .get::<TenantContext>()
            .map(|TenantContext(ctx)| ctx.tenant_id().to_string())
            .unwrap_or_else(|| "-".to_string());
        let ip = client_ip(&parts.headers).unwrap_or_else(|| "-".to_string());
        // Dentro de `nest` a URI chega sem o prefixo; a chave usa o caminho completo
        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map(|uri| uri.path())
            .unwrap_or_else(|| parts.uri.path());
        let key = format!("{}:{}:{}:{}", parts.method, path, tenant, ip);

        let app_state = AppState::from_ref(state);
        if !app_state.rate_limiter.allow(&key).await {
            tracing::warn!(%key, "🐢 Requisição bloqueada pelo limite de taxa");
            return Err(AppError::RateLimited);
        }

        Ok(RateGate)
    }
}
