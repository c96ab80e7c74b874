// src/db/api_key_repo.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::audit_repo::insert_entry,
    models::{
        api_keys::{ApiKey, NewApiKey},
        audit::NewAuditEntry,
    },
};

/// Todas as mutações são um único comando condicional (sem read-modify-write)
/// e gravam a entrada de auditoria recebida na mesma transação: se a
/// auditoria falhar, nada muda. Quando a condição não casa (`None`/`false`)
/// nenhuma entrada é gravada.
/// Operações que recebem `tenant_id` nunca enxergam chaves de outro tenant.
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    /// Prefixo duplicado => `AppError::Conflict`.
    async fn insert(&self, key: NewApiKey, audit: NewAuditEntry) -> Result<ApiKey, AppError>;

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<ApiKey>, AppError>;

    async fn find(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<ApiKey>, AppError>;

    /// Caminho de autenticação: ainda não sabemos o tenant.
    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKey>, AppError>;

    /// Só altera chaves ativas; `None` se não houver chave ativa com esse id.
    async fn update_scopes(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        scopes: &[String],
        audit: NewAuditEntry,
    ) -> Result<Option<ApiKey>, AppError>;

    /// Troca hash + prefixo e zera o último uso, numa única escrita.
    async fn rotate(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        new_hash: &str,
        new_prefix: &str,
        audit: NewAuditEntry,
    ) -> Result<Option<ApiKey>, AppError>;

    async fn revoke(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
        audit: NewAuditEntry,
    ) -> Result<Option<ApiKey>, AppError>;

    async fn delete(&self, tenant_id: Uuid, id: Uuid, audit: NewAuditEntry) -> Result<bool, AppError>;

    /// Só marca o uso se o hash ainda for o verificado: uma rotação que
    /// comitou no meio do caminho não herda o último uso do segredo antigo.
    async fn touch_last_used(
        &self,
        id: Uuid,
        key_hash: &str,
        at: DateTime<Utc>,
        ip: Option<&str>,
    ) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct PgApiKeyRepository {
    pool: PgPool,
}

impl PgApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn prefix_conflict(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::Conflict("Prefixo de chave já utilizado.".into());
        }
    }
    e.into()
}

#[async_trait]
impl ApiKeyRepository for PgApiKeyRepository {
    async fn insert(&self, key: NewApiKey, audit: NewAuditEntry) -> Result<ApiKey, AppError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, ApiKey>(
            r#"
            INSERT INTO api_keys (id, tenant_id, created_by, name, key_prefix, key_hash, scopes, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(key.id)
        .bind(key.tenant_id)
        .bind(key.created_by)
        .bind(&key.name)
        .bind(&key.key_prefix)
        .bind(&key.key_hash)
        .bind(&key.scopes)
        .bind(key.expires_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(prefix_conflict)?;

        insert_entry(&mut *tx, &audit).await?;
        tx.commit().await?;

        Ok(created)
    }

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<ApiKey>, AppError> {
        let keys = sqlx::query_as::<_, ApiKey>(
            "SELECT * FROM api_keys WHERE tenant_id = $1 ORDER BY created_at DESC",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    async fn find(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<ApiKey>, AppError> {
        let key = sqlx::query_as::<_, ApiKey>(
            "SELECT * FROM api_keys WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(key)
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKey>, AppError> {
        let key = sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE key_prefix = $1")
            .bind(prefix)
            .fetch_optional(&self.pool)
            .await?;
        Ok(key)
    }

    async fn update_scopes(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        scopes: &[String],
        audit: NewAuditEntry,
    ) -> Result<Option<ApiKey>, AppError> {
        let mut tx = self.pool.begin().await?;

        let key = sqlx::query_as::<_, ApiKey>(
            r#"
            UPDATE api_keys SET scopes = $3, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(scopes)
        .fetch_optional(&mut *tx)
        .await?;

        // Sem linha alterada: o drop da transação faz o rollback
        if key.is_some() {
            insert_entry(&mut *tx, &audit).await?;
            tx.commit().await?;
        }
        Ok(key)
    }

    async fn rotate(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        new_hash: &str,
        new_prefix: &str,
        audit: NewAuditEntry,
    ) -> Result<Option<ApiKey>, AppError> {
        let mut tx = self.pool.begin().await?;

        // Um UPDATE só: o segredo antigo deixa de valer no commit, sem janela
        let key = sqlx::query_as::<_, ApiKey>(
            r#"
            UPDATE api_keys
            SET key_hash = $3, key_prefix = $4,
                last_used_at = NULL, last_used_ip = NULL, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(new_hash)
        .bind(new_prefix)
        .fetch_optional(&mut *tx)
        .await
        .map_err(prefix_conflict)?;

        if key.is_some() {
            insert_entry(&mut *tx, &audit).await?;
            tx.commit().await?;
        }
        Ok(key)
    }

    async fn revoke(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
        audit: NewAuditEntry,
    ) -> Result<Option<ApiKey>, AppError> {
        let mut tx = self.pool.begin().await?;

        let key = sqlx::query_as::<_, ApiKey>(
            r#"
            UPDATE api_keys SET status = 'revoked', revoked_at = $3, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(at)
        .fetch_optional(&mut *tx)
        .await?;

        if key.is_some() {
            insert_entry(&mut *tx, &audit).await?;
            tx.commit().await?;
        }
        Ok(key)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid, audit: NewAuditEntry) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM api_keys WHERE tenant_id = $1 AND id = $2")
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

    async fn touch_last_used(
        &self,
        id: Uuid,
        key_hash: &str,
        at: DateTime<Utc>,
        ip: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE api_keys SET last_used_at = $3, last_used_ip = $4 WHERE id = $1 AND key_hash = $2",
        )
        .bind(id)
        .bind(key_hash)
        .bind(at)
        .bind(ip)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
