// src/db/connector_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::audit_repo::insert_entry,
    models::{audit::NewAuditEntry, connectors::ConnectorSecret},
};

#[async_trait]
pub trait ConnectorSecretRepository: Send + Sync {
    /// Grava (ou substitui) o segredo já cifrado de um provedor, junto com
    /// a entrada de auditoria, na mesma transação.
    async fn upsert(
        &self,
        tenant_id: Uuid,
        provider: &str,
        sealed_secret: &str,
        updated_by: Uuid,
        audit: NewAuditEntry,
    ) -> Result<ConnectorSecret, AppError>;

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<ConnectorSecret>, AppError>;
}

#[derive(Clone)]
pub struct PgConnectorSecretRepository {
    pool: PgPool,
}

impl PgConnectorSecretRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConnectorSecretRepository for PgConnectorSecretRepository {
    async fn upsert(
        &self,
        tenant_id: Uuid,
        provider: &str,
        sealed_secret: &str,
        updated_by: Uuid,
        audit: NewAuditEntry,
    ) -> Result<ConnectorSecret, AppError> {
        let mut tx = self.pool.begin().await?;

        // UPSERT (Insert or Update)
        let secret = sqlx::query_as::<_, ConnectorSecret>(
            r#"
            INSERT INTO connector_secrets (tenant_id, provider, sealed_secret, updated_by)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id, provider)
            DO UPDATE SET
                sealed_secret = EXCLUDED.sealed_secret,
                updated_by = EXCLUDED.updated_by,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(provider)
        .bind(sealed_secret)
        .bind(updated_by)
        .fetch_one(&mut *tx)
        .await?;

        insert_entry(&mut *tx, &audit).await?;
        tx.commit().await?;

        Ok(secret)
    }

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<ConnectorSecret>, AppError> {
        let secrets = sqlx::query_as::<_, ConnectorSecret>(
            "SELECT * FROM connector_secrets WHERE tenant_id = $1 ORDER BY provider",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(secrets)
    }
}
