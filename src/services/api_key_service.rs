// src/services/api_key_service.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        crypto::{constant_time_eq, hash_secret, random_hex},
        error::AppError,
    },
    db::ApiKeyRepository,
    models::{
        api_keys::{
            normalize_scopes, ApiKey, ApiKeyContext, ApiKeyInfo, ApiKeySecretResponse,
            CreateApiKeyPayload, NewApiKey, ONE_TIME_REVEAL_WARNING,
        },
        audit::{AuditAction, NewAuditEntry},
        tenancy::AuthContext,
    },
};

pub const KEY_MARKER: &str = "bpk_";
/// Bytes aleatórios por chave (256 bits).
const KEY_RANDOM_BYTES: usize = 32;
/// `bpk_` + 8 hex: só para exibição, nunca basta para autenticar.
const KEY_PREFIX_LENGTH: usize = 12;
const KEY_LENGTH: usize = 4 + KEY_RANDOM_BYTES * 2;
// Colisão de prefixo é rara (32 bits); basta tentar de novo algumas vezes
const MAX_PREFIX_ATTEMPTS: usize = 3;

/// Chave recém-gerada. `raw` só existe em memória até virar resposta.
pub struct GeneratedKey {
    pub raw: String,
    pub prefix: String,
    pub hash: String,
}

pub fn generate_key() -> GeneratedKey {
    let raw = format!("{KEY_MARKER}{}", random_hex(KEY_RANDOM_BYTES));
    GeneratedKey {
        prefix: raw[..KEY_PREFIX_LENGTH].to_string(),
        hash: hash_secret(&raw),
        raw,
    }
}

/// Toda mutação grava a sua entrada de auditoria na mesma transação do
/// repositório: ou as duas acontecem, ou nenhuma.
#[derive(Clone)]
pub struct ApiKeyService {
    repo: Arc<dyn ApiKeyRepository>,
}

impl ApiKeyService {
    pub fn new(repo: Arc<dyn ApiKeyRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(
        &self,
        ctx: &AuthContext,
        payload: CreateApiKeyPayload,
    ) -> Result<ApiKeySecretResponse, AppError> {
        // 1. Validação (campos + registro de escopos)
        payload.validate()?;
        let scopes = normalize_scopes(&payload.scopes)?;
        let expires_at = payload
            .expires_in_days
            .map(|days| Utc::now() + Duration::days(days));

        // 2. Gera e persiste (só hash + prefixo) junto com a auditoria,
        // que nunca leva o segredo
        let id = Uuid::new_v4();
        let name = payload.name.trim().to_string();
        let mut attempt = 0;
        let (key, raw) = loop {
            attempt += 1;
            let generated = generate_key();
            let audit = NewAuditEntry::new(ctx.tenant_id(), AuditAction::ApiKeyCreated)
                .actor(ctx.user_id())
                .entity(id)
                .metadata(json!({
                    "name": name,
                    "prefix": generated.prefix,
                    "scopes": scopes,
                    "expiresAt": expires_at,
                }));
            let new_key = NewApiKey {
                id,
                tenant_id: ctx.tenant_id(),
                created_by: Some(ctx.user_id()),
                name: name.clone(),
                key_prefix: generated.prefix,
                key_hash: generated.hash,
                scopes: scopes.clone(),
                expires_at,
            };
            match self.repo.insert(new_key, audit).await {
                Ok(key) => break (key, generated.raw),
                Err(AppError::Conflict(_)) if attempt < MAX_PREFIX_ATTEMPTS => continue,
                Err(e) => return Err(e),
            }
        };

        tracing::info!(tenant_id = %key.tenant_id, key_id = %key.id, prefix = %key.key_prefix, "🔑 Chave de API criada");

        Ok(ApiKeySecretResponse {
            key: key.into(),
            api_key: raw,
            warning: ONE_TIME_REVEAL_WARNING,
        })
    }

    pub async fn list(&self, tenant_id: Uuid) -> Result<Vec<ApiKeyInfo>, AppError> {
        let keys = self.repo.list(tenant_id).await?;
        Ok(keys.into_iter().map(ApiKeyInfo::from).collect())
    }

    pub async fn update_scopes(
        &self,
        ctx: &AuthContext,
        id: Uuid,
        requested: &[String],
    ) -> Result<ApiKeyInfo, AppError> {
        let scopes = normalize_scopes(requested)?;

        let before = self.find_or_not_found(ctx.tenant_id(), id).await?;
        before.status.ensure_active()?;

        let audit = NewAuditEntry::new(ctx.tenant_id(), AuditAction::ApiKeyScopesUpdated)
            .actor(ctx.user_id())
            .entity(id)
            .metadata(json!({ "before": before.scopes, "after": scopes }));

        let updated = match self
            .repo
            .update_scopes(ctx.tenant_id(), id, &scopes, audit)
            .await?
        {
            Some(key) => key,
            None => return Err(self.gone_while_updating(ctx.tenant_id(), id).await),
        };

        Ok(updated.into())
    }

    /// Troca o segredo da MESMA chave (id, escopos e validade preservados).
    /// O segredo anterior deixa de valer no instante da escrita.
    pub async fn rotate(&self, ctx: &AuthContext, id: Uuid) -> Result<ApiKeySecretResponse, AppError> {
        let current = self.find_or_not_found(ctx.tenant_id(), id).await?;
        current.status.ensure_active()?;

        // Rotações concorrentes: a última escrita vence, mas cada chamada
        // deixa a sua própria entrada
        let mut attempt = 0;
        let (rotated, raw) = loop {
            attempt += 1;
            let generated = generate_key();
            let audit = NewAuditEntry::new(ctx.tenant_id(), AuditAction::ApiKeyRotated)
                .actor(ctx.user_id())
                .entity(id)
                .metadata(json!({
                    "oldPrefix": current.key_prefix,
                    "newPrefix": generated.prefix,
                }));
            match self
                .repo
                .rotate(ctx.tenant_id(), id, &generated.hash, &generated.prefix, audit)
                .await
            {
                Ok(Some(key)) => break (key, generated.raw),
                Ok(None) => return Err(self.gone_while_updating(ctx.tenant_id(), id).await),
                Err(AppError::Conflict(_)) if attempt < MAX_PREFIX_ATTEMPTS => continue,
                Err(e) => return Err(e),
            }
        };

        tracing::info!(tenant_id = %ctx.tenant_id(), key_id = %id, "🔄 Chave de API rotacionada");

        Ok(ApiKeySecretResponse {
            key: rotated.into(),
            api_key: raw,
            warning: ONE_TIME_REVEAL_WARNING,
        })
    }

    /// Revogar duas vezes é erro de validação, não no-op silencioso.
    pub async fn revoke(&self, ctx: &AuthContext, id: Uuid) -> Result<ApiKeyInfo, AppError> {
        let current = self.find_or_not_found(ctx.tenant_id(), id).await?;
        current.status.revoke()?;

        let audit = NewAuditEntry::new(ctx.tenant_id(), AuditAction::ApiKeyRevoked)
            .actor(ctx.user_id())
            .entity(id)
            .metadata(json!({ "prefix": current.key_prefix }));

        let revoked = match self.repo.revoke(ctx.tenant_id(), id, Utc::now(), audit).await? {
            Some(key) => key,
            None => return Err(self.gone_while_updating(ctx.tenant_id(), id).await),
        };

        tracing::info!(tenant_id = %ctx.tenant_id(), key_id = %id, "⛔ Chave de API revogada");
        Ok(revoked.into())
    }

    /// Remoção definitiva, independente do status.
    pub async fn delete(&self, ctx: &AuthContext, id: Uuid) -> Result<(), AppError> {
        let current = self.find_or_not_found(ctx.tenant_id(), id).await?;

        let audit = NewAuditEntry::new(ctx.tenant_id(), AuditAction::ApiKeyDeleted)
            .actor(ctx.user_id())
            .entity(id)
            .metadata(json!({
                "name": current.name,
                "prefix": current.key_prefix,
                "status": current.status,
            }));

        if !self.repo.delete(ctx.tenant_id(), id, audit).await? {
            return Err(AppError::NotFound("Chave de API"));
        }

        Ok(())
    }

    pub async fn verify(&self, raw: &str, ip: Option<&str>) -> Result<ApiKeyContext, AppError> {
        self.verify_at(raw, ip, Utc::now()).await
    }

    /// Caminho de autenticação. Qualquer falha é `Unauthenticated`, sem
    /// dizer ao chamador se a chave existe, foi revogada ou expirou.
    pub async fn verify_at(
        &self,
        raw: &str,
        ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ApiKeyContext, AppError> {
        if !raw.starts_with(KEY_MARKER) || raw.len() != KEY_LENGTH || !raw.is_ascii() {
            return Err(AppError::Unauthenticated);
        }

        let key = self
            .repo
            .find_by_prefix(&raw[..KEY_PREFIX_LENGTH])
            .await?
            .ok_or(AppError::Unauthenticated)?;

        if !constant_time_eq(&hash_secret(raw), &key.key_hash) {
            return Err(AppError::Unauthenticated);
        }
        if key.status.ensure_active().is_err() || key.is_expired_at(now) {
            tracing::debug!(key_id = %key.id, "Chave revogada ou expirada apresentada");
            return Err(AppError::Unauthenticated);
        }

        // Best-effort: falhar aqui não derruba a requisição
        if let Err(e) = self.repo.touch_last_used(key.id, &key.key_hash, now, ip).await {
            tracing::warn!(key_id = %key.id, error = %e, "Falha ao registrar último uso da chave");
        }

        Ok(ApiKeyContext {
            tenant_id: key.tenant_id,
            key_id: key.id,
            scopes: key.scopes,
        })
    }

    async fn find_or_not_found(&self, tenant_id: Uuid, id: Uuid) -> Result<ApiKey, AppError> {
        self.repo
            .find(tenant_id, id)
            .await?
            .ok_or(AppError::NotFound("Chave de API"))
    }

    // A escrita condicional não achou chave ativa: foi revogada ou
    // removida por outra requisição entre a leitura e a escrita
    async fn gone_while_updating(&self, tenant_id: Uuid, id: Uuid) -> AppError {
        match self.repo.find(tenant_id, id).await {
            Ok(Some(key)) => match key.status.ensure_active() {
                Err(e) => e,
                Ok(()) => AppError::Conflict("A chave foi alterada por outra requisição.".into()),
            },
            Ok(None) => AppError::NotFound("Chave de API"),
            Err(e) => e,
        }
    }
}
