// src/db/audit_repo.rs

use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::audit::{AuditLogEntry, NewAuditEntry},
};

// Apenas INSERT e SELECT: a trilha de auditoria é append-only.
// `append` serve eventos sem mutação (ex.: visualização de preview); as
// mutações gravam a própria entrada na mesma transação.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, AppError>;

    /// Mais recentes primeiro. Retorna (página, total).
    async fn list(
        &self,
        tenant_id: Uuid,
        action: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<AuditLogEntry>, i64), AppError>;
}

#[derive(Clone)]
pub struct PgAuditRepository {
    pool: PgPool,
}

impl PgAuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Grava a entrada com qualquer executor. Os repositórios de mutação passam
/// a própria transação: a entrada e a mudança que ela registra entram no
/// mesmo commit, ou nenhuma das duas.
pub(crate) async fn insert_entry<'e, E>(
    executor: E,
    entry: &NewAuditEntry,
) -> Result<AuditLogEntry, AppError>
where
    E: PgExecutor<'e>,
{
    let created = sqlx::query_as::<_, AuditLogEntry>(
        r#"
        INSERT INTO audit_logs (id, tenant_id, actor_user_id, action, entity_type, entity_id, metadata)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.tenant_id)
    .bind(entry.actor_user_id)
    .bind(entry.action.as_str())
    .bind(entry.action.entity_type())
    .bind(entry.entity_id)
    .bind(&entry.metadata)
    .fetch_one(executor)
    .await?;
    Ok(created)
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, AppError> {
        insert_entry(&self.pool, &entry).await
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        action: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<AuditLogEntry>, i64), AppError> {
        let items = sqlx::query_as::<_, AuditLogEntry>(
            r#"
            SELECT * FROM audit_logs
            WHERE tenant_id = $1 AND ($2::text IS NULL OR action = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(tenant_id)
        .bind(action)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_logs WHERE tenant_id = $1 AND ($2::text IS NULL OR action = $2)",
        )
        .bind(tenant_id)
        .bind(action)
        .fetch_one(&self.pool)
        .await?;

        Ok((items, total))
    }
}
