// src/services/preview_service.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{
    common::{
        crypto::{hash_secret, random_hex},
        error::AppError,
    },
    db::PreviewRepository,
    models::{
        audit::{AuditAction, NewAuditEntry},
        preview::{
            CreatePreviewResponse, NewPreviewSession, PreviewRestrictions, PreviewRole,
            PreviewSessionInfo, PreviewStatus, PreviewValidation,
        },
        tenancy::AuthContext,
    },
    services::audit_service::AuditService,
};

pub const PREVIEW_TTL_HOURS: i64 = 24;
const PREVIEW_TOKEN_BYTES: usize = 32;
const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Horas restantes arredondadas para cima (0 quando não sobra nada).
pub fn remaining_hours(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (expires_at - now).num_milliseconds().max(0);
    (millis + MILLIS_PER_HOUR - 1) / MILLIS_PER_HOUR
}

#[derive(Clone)]
pub struct PreviewService {
    repo: Arc<dyn PreviewRepository>,
    audit: AuditService,
    base_url: Arc<str>,
}

impl PreviewService {
    pub fn new(repo: Arc<dyn PreviewRepository>, audit: AuditService, base_url: String) -> Self {
        Self {
            repo,
            audit,
            base_url: base_url.trim_end_matches('/').into(),
        }
    }

    pub async fn create(
        &self,
        ctx: &AuthContext,
        role: PreviewRole,
    ) -> Result<CreatePreviewResponse, AppError> {
        // Guardamos só o hash; o token aparece apenas nesta resposta
        let token = random_hex(PREVIEW_TOKEN_BYTES);
        let expires_at = Utc::now() + Duration::hours(PREVIEW_TTL_HOURS);

        let id = Uuid::new_v4();
        let audit = NewAuditEntry::new(ctx.tenant_id(), AuditAction::PreviewCreated)
            .actor(ctx.user_id())
            .entity(id)
            .metadata(json!({ "role": role, "expiresAt": expires_at }));

        let session = self
            .repo
            .insert(
                NewPreviewSession {
                    id,
                    tenant_id: ctx.tenant_id(),
                    created_by: Some(ctx.user_id()),
                    token_hash: hash_secret(&token),
                    role,
                    expires_at,
                },
                audit,
            )
            .await?;

        tracing::info!(tenant_id = %ctx.tenant_id(), session_id = %session.id, "👀 Sessão de preview criada");

        Ok(CreatePreviewResponse {
            id: session.id,
            role: session.role,
            share_url: format!("{}/preview?token={}", self.base_url, token),
            token,
            expires_at: session.expires_at,
        })
    }

    pub async fn validate(&self, token: &str) -> Result<PreviewValidation, AppError> {
        self.validate_at(token, Utc::now()).await
    }

    /// Caminho público: aqui ausente, revogada e expirada SÃO distinguíveis,
    /// porque o token não carrega identidade nenhuma.
    pub async fn validate_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<PreviewValidation, AppError> {
        if token.is_empty() {
            return Err(AppError::NotFound("Sessão de preview"));
        }

        let session = self
            .repo
            .find_by_token_hash(&hash_secret(token))
            .await?
            .ok_or(AppError::NotFound("Sessão de preview"))?;

        match session.status_at(now) {
            PreviewStatus::Revoked => return Err(AppError::PreviewRevoked),
            PreviewStatus::Expired => return Err(AppError::PreviewExpired),
            PreviewStatus::Active => {}
        }

        // Visualização anônima: sem ator
        self.audit
            .record(
                NewAuditEntry::new(session.tenant_id, AuditAction::PreviewViewed)
                    .entity(session.id)
                    .metadata(json!({ "role": session.role })),
            )
            .await?;

        Ok(PreviewValidation {
            session_id: session.id,
            tenant_id: session.tenant_id,
            role: session.role,
            expires_at: session.expires_at,
            remaining_hours: remaining_hours(session.expires_at, now),
            restrictions: PreviewRestrictions::for_role(session.role),
        })
    }

    pub async fn revoke(&self, ctx: &AuthContext, id: Uuid) -> Result<PreviewSessionInfo, AppError> {
        let current = self
            .repo
            .find(ctx.tenant_id(), id)
            .await?
            .ok_or(AppError::NotFound("Sessão de preview"))?;

        if current.revoked {
            return Err(AppError::invalid("A sessão de preview já está revogada."));
        }

        let audit = NewAuditEntry::new(ctx.tenant_id(), AuditAction::PreviewRevoked)
            .actor(ctx.user_id())
            .entity(id)
            .metadata(json!({ "role": current.role }));

        let now = Utc::now();
        let revoked = self
            .repo
            .revoke(ctx.tenant_id(), id, now, audit)
            .await?
            .ok_or_else(|| AppError::invalid("A sessão de preview já está revogada."))?;

        Ok(PreviewSessionInfo::from_session(revoked, now))
    }

    pub async fn list(&self, tenant_id: Uuid) -> Result<Vec<PreviewSessionInfo>, AppError> {
        let now = Utc::now();
        let sessions = self.repo.list(tenant_id).await?;
        Ok(sessions
            .into_iter()
            .map(|s| PreviewSessionInfo::from_session(s, now))
            .collect())
    }

    pub async fn delete(&self, ctx: &AuthContext, id: Uuid) -> Result<(), AppError> {
        let audit = NewAuditEntry::new(ctx.tenant_id(), AuditAction::PreviewDeleted)
            .actor(ctx.user_id())
            .entity(id);

        if !self.repo.delete(ctx.tenant_id(), id, audit).await? {
            return Err(AppError::NotFound("Sessão de preview"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::MemoryStore, models::tenancy::Role};

    fn service() -> (PreviewService, AuthContext) {
        with_store(&MemoryStore::new())
    }

    fn with_store(store: &MemoryStore) -> (PreviewService, AuthContext) {
        let service = PreviewService::new(
            Arc::new(store.clone()),
            AuditService::new(Arc::new(store.clone())),
            "https://demo.example.com/".into(),
        );
        (service, AuthContext::new(Uuid::new_v4(), Uuid::new_v4(), Role::Admin))
    }

    #[test]
    fn remaining_hours_rounds_up() {
        let now = Utc::now();
        assert_eq!(remaining_hours(now + Duration::hours(24), now), 24);
        assert_eq!(remaining_hours(now + Duration::minutes(61), now), 2);
        assert_eq!(remaining_hours(now + Duration::milliseconds(1), now), 1);
        assert_eq!(remaining_hours(now, now), 0);
    }

    #[tokio::test]
    async fn share_url_embeds_token() {
        let (service, ctx) = service();
        let created = service.create(&ctx, PreviewRole::Staff).await.unwrap();
        assert_eq!(
            created.share_url,
            format!("https://demo.example.com/preview?token={}", created.token)
        );
        assert!(created.expires_at - Duration::hours(PREVIEW_TTL_HOURS) <= Utc::now());
    }

    #[tokio::test]
    async fn expiry_boundary_is_strict() {
        let (service, ctx) = service();
        let created = service.create(&ctx, PreviewRole::Admin).await.unwrap();
        let token = created.token.as_str();

        let at_expiry = service.validate_at(token, created.expires_at).await.unwrap();
        assert_eq!(at_expiry.remaining_hours, 0);

        assert!(matches!(
            service
                .validate_at(token, created.expires_at + Duration::milliseconds(1))
                .await,
            Err(AppError::PreviewExpired)
        ));
    }

    #[tokio::test]
    async fn three_failure_states_are_distinct() {
        let (service, ctx) = service();
        let created = service.create(&ctx, PreviewRole::Customer).await.unwrap();

        assert!(matches!(
            service.validate("token-que-nao-existe").await,
            Err(AppError::NotFound(_))
        ));

        service.revoke(&ctx, created.id).await.unwrap();
        assert!(matches!(
            service.validate(&created.token).await,
            Err(AppError::PreviewRevoked)
        ));
        // Revogada vence expirada
        assert!(matches!(
            service
                .validate_at(&created.token, created.expires_at + Duration::hours(1))
                .await,
            Err(AppError::PreviewRevoked)
        ));

        assert_eq!(
            service.revoke(&ctx, created.id).await.unwrap_err().code(),
            "VALIDATION_ERROR"
        );
    }

    #[tokio::test]
    async fn list_derives_status_and_delete_removes() {
        let (service, ctx) = service();
        let a = service.create(&ctx, PreviewRole::Staff).await.unwrap();
        let b = service.create(&ctx, PreviewRole::Customer).await.unwrap();
        service.revoke(&ctx, b.id).await.unwrap();

        let listed = service.list(ctx.tenant_id()).await.unwrap();
        let status_of = |id| listed.iter().find(|s| s.id == id).map(|s| s.status);
        assert_eq!(status_of(a.id), Some(PreviewStatus::Active));
        assert_eq!(status_of(b.id), Some(PreviewStatus::Revoked));

        service.delete(&ctx, a.id).await.unwrap();
        assert!(matches!(
            service.delete(&ctx, a.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_audit_write_keeps_session_state() {
        let store = MemoryStore::new();
        let (service, ctx) = with_store(&store);
        let created = service.create(&ctx, PreviewRole::Staff).await.unwrap();

        store.set_audit_unavailable(true).await;
        assert!(service.revoke(&ctx, created.id).await.is_err());
        assert!(service.delete(&ctx, created.id).await.is_err());
        assert!(service.create(&ctx, PreviewRole::Admin).await.is_err());
        store.set_audit_unavailable(false).await;

        let listed = service.list(ctx.tenant_id()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, PreviewStatus::Active);
        assert!(service.validate(&created.token).await.is_ok());
    }
}
