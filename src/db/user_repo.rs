// src/db/user_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::auth::{User, UserStatus},
};

// Contrato da camada de persistência para a tabela 'users'
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// E-mail duplicado => `AppError::Conflict`.
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        status: UserStatus,
    ) -> Result<User, AppError>;

    /// Cria o usuário pendente de um convite. Guardamos só o hash do token.
    async fn invite_user(&self, email: &str, invite_token_hash: &str) -> Result<User, AppError>;

    /// Novo convite para quem ainda está pendente; o token anterior deixa
    /// de valer. `None` se o usuário já estiver ativo.
    async fn reissue_invite(&self, id: Uuid, invite_token_hash: &str) -> Result<Option<User>, AppError>;

    /// Conclui o cadastro (pending -> active) e consome o token do convite.
    /// `None` se não estiver pendente ou o token não for o do convite.
    async fn activate_user(
        &self,
        id: Uuid,
        invite_token_hash: &str,
        password_hash: &str,
    ) -> Result<Option<User>, AppError>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Converte erro de violação de chave única em um erro mais amigável
fn email_conflict(e: sqlx::Error) -> AppError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return AppError::Conflict("Este e-mail já está em uso.".into());
        }
    }
    e.into()
}

#[async_trait]
impl UserRepository for PgUserRepository {
    // Busca um usuário pelo seu e-mail
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    // Busca um usuário pelo seu ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    // Cria um novo usuário no banco de dados
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        status: UserStatus,
    ) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, status)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .map_err(email_conflict)
    }

    async fn invite_user(&self, email: &str, invite_token_hash: &str) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, status, invite_token_hash)
            VALUES ($1, $2, '', 'pending', $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(invite_token_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(email_conflict)
    }

    async fn reissue_invite(&self, id: Uuid, invite_token_hash: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET invite_token_hash = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(invite_token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn activate_user(
        &self,
        id: Uuid,
        invite_token_hash: &str,
        password_hash: &str,
    ) -> Result<Option<User>, AppError> {
        // Condicional: dois registros com o mesmo token, só um ativa
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET password_hash = $3, status = 'active', invite_token_hash = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'pending' AND invite_token_hash = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(invite_token_hash)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}
