// src/db/tenancy_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::audit_repo::insert_entry,
    models::{
        audit::NewAuditEntry,
        tenancy::{Membership, Role, Tenant, TenantMembership},
    },
};

/// As mutações gravam a entrada de auditoria recebida na mesma transação.
#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Cria o tenant e, na mesma transação, o vínculo do dono.
    /// Slug duplicado => `AppError::Conflict`.
    async fn create_tenant_with_owner(
        &self,
        id: Uuid,
        name: &str,
        slug: &str,
        plan: &str,
        owner_id: Uuid,
        audit: NewAuditEntry,
    ) -> Result<Tenant, AppError>;

    /// A verificação de segurança mais importante: existe vínculo (user, tenant)?
    async fn find_membership(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, AppError>;

    async fn list_tenants_for_user(&self, user_id: Uuid) -> Result<Vec<TenantMembership>, AppError>;

    async fn count_owners(&self, tenant_id: Uuid) -> Result<i64, AppError>;

    /// Vínculo duplicado => `AppError::Conflict`.
    async fn add_member(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role: Role,
        audit: NewAuditEntry,
    ) -> Result<Membership, AppError>;

    async fn update_member_role(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role: Role,
        audit: NewAuditEntry,
    ) -> Result<Option<Membership>, AppError>;

    async fn remove_member(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        audit: NewAuditEntry,
    ) -> Result<bool, AppError>;
}

#[derive(Clone)]
pub struct PgTenantRepository {
    pool: PgPool,
}

impl PgTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unique_violation(e: sqlx::Error, message: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::Conflict(message.to_string());
        }
    }
    e.into()
}

#[async_trait]
impl TenantRepository for PgTenantRepository {
    async fn create_tenant_with_owner(
        &self,
        id: Uuid,
        name: &str,
        slug: &str,
        plan: &str,
        owner_id: Uuid,
        audit: NewAuditEntry,
    ) -> Result<Tenant, AppError> {
        // 1. Inicia a transação
        let mut tx = self.pool.begin().await?;

        // 2. Cria o Tenant
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (id, name, slug, plan)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(slug)
        .bind(plan)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, "Já existe um tenant com esse slug."))?;

        // 3. Atribui o criador como dono
        sqlx::query(
            r#"
            INSERT INTO tenant_members (tenant_id, user_id, role)
            VALUES ($1, $2, 'owner')
            "#,
        )
        .bind(tenant.id)
        .bind(owner_id)
        .execute(&mut *tx)
        .await?;

        // 4. Auditoria
        insert_entry(&mut *tx, &audit).await?;

        // 5. Commit
        tx.commit().await?;

        Ok(tenant)
    }

    async fn find_membership(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, AppError> {
        let membership = sqlx::query_as::<_, Membership>(
            "SELECT * FROM tenant_members WHERE tenant_id = $1 AND user_id = $2",
        )
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(membership)
    }

    async fn list_tenants_for_user(&self, user_id: Uuid) -> Result<Vec<TenantMembership>, AppError> {
        let tenants = sqlx::query_as::<_, TenantMembership>(
            r#"
            SELECT t.id, t.name, t.slug, t.plan, t.created_at, t.updated_at, tm.role
            FROM tenants t
            JOIN tenant_members tm ON tm.tenant_id = t.id
            WHERE tm.user_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tenants)
    }

    async fn count_owners(&self, tenant_id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tenant_members WHERE tenant_id = $1 AND role = 'owner'",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn add_member(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role: Role,
        audit: NewAuditEntry,
    ) -> Result<Membership, AppError> {
        let mut tx = self.pool.begin().await?;

        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO tenant_members (tenant_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, "Este usuário já é membro do tenant."))?;

        insert_entry(&mut *tx, &audit).await?;
        tx.commit().await?;

        Ok(membership)
    }

    async fn update_member_role(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role: Role,
        audit: NewAuditEntry,
    ) -> Result<Option<Membership>, AppError> {
        let mut tx = self.pool.begin().await?;

        let membership = sqlx::query_as::<_, Membership>(
            r#"
            UPDATE tenant_members SET role = $3
            WHERE tenant_id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(tenant_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(&mut *tx)
        .await?;

        if membership.is_some() {
            insert_entry(&mut *tx, &audit).await?;
            tx.commit().await?;
        }
        Ok(membership)
    }

    async fn remove_member(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        audit: NewAuditEntry,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM tenant_members WHERE tenant_id = $1 AND user_id = $2")
            .bind(tenant_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            insert_entry(&mut *tx, &audit).await?;
            tx.commit().await?;
        }
        Ok(removed)
    }
}
