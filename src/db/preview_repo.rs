// src/db/preview_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::audit_repo::insert_entry,
    models::{
        audit::NewAuditEntry,
        preview::{NewPreviewSession, PreviewSession},
    },
};

/// As mutações gravam a entrada de auditoria na mesma transação.
#[async_trait]
pub trait PreviewRepository: Send + Sync {
    async fn insert(
        &self,
        session: NewPreviewSession,
        audit: NewAuditEntry,
    ) -> Result<PreviewSession, AppError>;

    /// Caminho público: a posse do token é a única credencial.
    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<PreviewSession>, AppError>;

    async fn find(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<PreviewSession>, AppError>;

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<PreviewSession>, AppError>;

    /// `None` se não existir ou já estiver revogada.
    async fn revoke(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
        audit: NewAuditEntry,
    ) -> Result<Option<PreviewSession>, AppError>;

    async fn delete(&self, tenant_id: Uuid, id: Uuid, audit: NewAuditEntry) -> Result<bool, AppError>;
}

#[derive(Clone)]
pub struct PgPreviewRepository {
    pool: PgPool,
}

impl PgPreviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreviewRepository for PgPreviewRepository {
    async fn insert(
        &self,
        session: NewPreviewSession,
        audit: NewAuditEntry,
    ) -> Result<PreviewSession, AppError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, PreviewSession>(
            r#"
            INSERT INTO preview_sessions (id, tenant_id, created_by, token_hash, role, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(session.id)
        .bind(session.tenant_id)
        .bind(session.created_by)
        .bind(&session.token_hash)
        .bind(session.role)
        .bind(session.expires_at)
        .fetch_one(&mut *tx)
        .await?;

        insert_entry(&mut *tx, &audit).await?;
        tx.commit().await?;

        Ok(created)
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<PreviewSession>, AppError> {
        let session = sqlx::query_as::<_, PreviewSession>(
            "SELECT * FROM preview_sessions WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn find(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<PreviewSession>, AppError> {
        let session = sqlx::query_as::<_, PreviewSession>(
            "SELECT * FROM preview_sessions WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<PreviewSession>, AppError> {
        let sessions = sqlx::query_as::<_, PreviewSession>(
            "SELECT * FROM preview_sessions WHERE tenant_id = $1 ORDER BY created_at DESC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    async fn revoke(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
        audit: NewAuditEntry,
    ) -> Result<Option<PreviewSession>, AppError> {
        let mut tx = self.pool.begin().await?;

        let session = sqlx::query_as::<_, PreviewSession>(
            r#"
            UPDATE preview_sessions SET revoked = TRUE, revoked_at = $3
            WHERE tenant_id = $1 AND id = $2 AND revoked = FALSE
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?;

        if session.is_some() {
            insert_entry(&mut *tx, &audit).await?;
            tx.commit().await?;
        }
        Ok(session)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid, audit: NewAuditEntry) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM preview_sessions WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            insert_entry(&mut *tx, &audit).await?;
            tx.commit().await?;
        }
        Ok(deleted)
    }
}
