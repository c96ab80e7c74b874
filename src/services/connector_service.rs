// src/services/connector_service.rs

//! Segredos de provedores externos (pagamento, e-mail...), guardados
//! cifrados com a `ENCRYPTION_KEY`.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::{
    common::{crypto::SecretCipher, error::AppError, safe_mode},
    config::SecretConfig,
    db::ConnectorSecretRepository,
    models::{
        audit::{AuditAction, NewAuditEntry},
        connectors::{is_valid_provider, ConnectorStatus},
        tenancy::AuthContext,
    },
};

#[derive(Clone)]
pub struct ConnectorService {
    repo: Arc<dyn ConnectorSecretRepository>,
    config: Arc<SecretConfig>,
    cipher: SecretCipher,
}

impl ConnectorService {
    pub fn new(repo: Arc<dyn ConnectorSecretRepository>, config: Arc<SecretConfig>) -> Self {
        let cipher = SecretCipher::new(config.encryption_key());
        Self {
            repo,
            config,
            cipher,
        }
    }

    /// Bloqueado em modo seguro: sem chave válida não há como cifrar.
    pub async fn store_secret(
        &self,
        ctx: &AuthContext,
        provider: &str,
        secret: &str,
    ) -> Result<ConnectorStatus, AppError> {
        if !is_valid_provider(provider) {
            return Err(AppError::invalid("Identificador de provedor inválido."));
        }
        safe_mode::ensure_side_effects_allowed(&self.config)?;

        let sealed = self.cipher.seal(secret)?;
        let audit = NewAuditEntry::new(ctx.tenant_id(), AuditAction::ConnectorSecretStored)
            .actor(ctx.user_id())
            .metadata(json!({ "provider": provider }));

        let stored = self
            .repo
            .upsert(ctx.tenant_id(), provider, &sealed, ctx.user_id(), audit)
            .await?;

        tracing::info!(tenant_id = %ctx.tenant_id(), provider, "🔐 Segredo de conector gravado");

        Ok(ConnectorStatus {
            provider: stored.provider,
            configured: true,
            updated_at: stored.updated_at,
        })
    }

    /// O segredo em claro para quem integra com o provedor. Ilegível
    /// (chave trocada, dado corrompido) => tratado como não configurado.
    pub async fn resolve_secret(
        &self,
        tenant_id: Uuid,
        provider: &str,
    ) -> Result<Option<String>, AppError> {
        let secrets = self.repo.list(tenant_id).await?;
        let sealed = secrets
            .iter()
            .find(|s| s.provider == provider)
            .map(|s| s.sealed_secret.as_str());
        Ok(self.cipher.open_or_absent(sealed))
    }

    pub async fn list_status(&self, tenant_id: Uuid) -> Result<Vec<ConnectorStatus>, AppError> {
        let secrets = self.repo.list(tenant_id).await?;
        Ok(secrets
            .into_iter()
            .map(|s| ConnectorStatus {
                configured: self.cipher.open_or_absent(Some(s.sealed_secret.as_str())).is_some(),
                provider: s.provider,
                updated_at: s.updated_at,
            })
            .collect())
    }
}
