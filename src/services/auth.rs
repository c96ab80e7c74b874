// src/services/auth.rs

use std::sync::Arc;

use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::{
    common::{crypto::hash_secret, error::AppError},
    db::{TenantRepository, UserRepository},
    models::{
        auth::{AuthResponse, Claims, User, UserStatus},
        tenancy::TenantMembership,
    },
};

/// Validade fixa do token de sessão.
pub const SESSION_TTL_DAYS: i64 = 7;

fn email_in_use() -> AppError {
    AppError::Conflict("Este e-mail já está em uso.".into())
}

#[derive(Clone)]
pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    tenant_repo: Arc<dyn TenantRepository>,
    jwt_secret: Arc<str>,
    bcrypt_cost: u32,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        tenant_repo: Arc<dyn TenantRepository>,
        jwt_secret: String,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            user_repo,
            tenant_repo,
            jwt_secret: jwt_secret.into(),
            bcrypt_cost,
        }
    }

    /// Cria um usuário ativo, ou ativa um usuário convidado (pendente)
    /// definindo a senha dele. Aceitar um convite exige o token entregue a
    /// quem convidou: conhecer o e-mail não basta. Retorna já um token de
    /// sessão.
    pub async fn register_user(
        &self,
        email: &str,
        password: &str,
        invite_token: Option<&str>,
    ) -> Result<AuthResponse, AppError> {
        let email = normalize_email(email);

        // 1. Hashing (bcrypt é caro: roda fora do executor)
        let password_hash = self.hash_password(password).await?;

        // 2. Convite pendente => ativa com o token; ativo => e-mail em uso.
        // Sem token ou com token errado, a resposta é a mesma de e-mail em
        // uso: quem tenta não descobre que há um convite.
        let user = match self.user_repo.find_by_email(&email).await? {
            Some(existing) if existing.status == UserStatus::Pending => {
                let token = invite_token.filter(|t| !t.is_empty()).ok_or_else(|| {
                    tracing::warn!(user_id = %existing.id, "🚫 Registro sobre convite pendente sem token");
                    email_in_use()
                })?;
                self.user_repo
                    .activate_user(existing.id, &hash_secret(token), &password_hash)
                    .await?
                    .ok_or_else(|| {
                        tracing::warn!(user_id = %existing.id, "🚫 Token de convite inválido");
                        email_in_use()
                    })?
            }
            Some(_) => return Err(email_in_use()),
            None => {
                self.user_repo
                    .create_user(&email, &password_hash, UserStatus::Active)
                    .await?
            }
        };

        tracing::info!(user_id = %user.id, "👤 Usuário registrado");

        // 3. Gera o token
        self.create_token(user.id)
    }

    pub async fn login_user(&self, email: &str, password: &str) -> Result<AuthResponse, AppError> {
        let user = self
            .user_repo
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        // Convidado ainda sem senha não faz login
        if user.status != UserStatus::Active {
            return Err(AppError::InvalidCredentials);
        }

        let password_clone = password.to_owned();
        let password_hash_clone = user.password_hash.clone();

        // Executa a verificação em um thread separado
        let is_password_valid =
            tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash_clone))
                .await
                .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;

        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }

        self.create_token(user.id)
    }

    /// Assinatura, expiração e formato inválidos caem todos no mesmo
    /// `Unauthenticated`: o chamador nunca sabe qual foi o motivo.
    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| {
            tracing::debug!(error = %e, "Token de sessão rejeitado");
            AppError::Unauthenticated
        })?;

        self.user_repo
            .find_by_id(token_data.claims.sub)
            .await?
            .filter(|user| user.status == UserStatus::Active)
            .ok_or(AppError::Unauthenticated)
    }

    pub async fn list_my_tenants(&self, user_id: Uuid) -> Result<Vec<TenantMembership>, AppError> {
        self.tenant_repo.list_tenants_for_user(user_id).await
    }

    pub async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let password_clone = password.to_owned();
        let cost = self.bcrypt_cost;
        let hashed = tokio::task::spawn_blocking(move || hash(&password_clone, cost))
            .await
            .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
        Ok(hashed)
    }

    pub fn create_token(&self, user_id: Uuid) -> Result<AuthResponse, AppError> {
        let now = Utc::now();
        let expires_at = now + Duration::days(SESSION_TTL_DAYS);

        let claims = Claims {
            sub: user_id,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;

        Ok(AuthResponse { token, expires_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    fn service(secret: &str) -> AuthService {
        with_store(&MemoryStore::new(), secret)
    }

    fn with_store(store: &MemoryStore, secret: &str) -> AuthService {
        AuthService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            secret.to_string(),
            4,
        )
    }

    #[tokio::test]
    async fn pending_invite_needs_its_token() {
        let store = MemoryStore::new();
        let auth = with_store(&store, "segredo-de-teste-com-mais-de-32-caracteres");
        UserRepository::invite_user(&store, "convidado@loja.com", &hash_secret("token-do-convite"))
            .await
            .unwrap();

        for token in [None, Some(""), Some("token-adivinhado")] {
            assert!(matches!(
                auth.register_user("convidado@loja.com", "senha-forte-123", token).await,
                Err(AppError::Conflict(_))
            ));
        }

        let registered = auth
            .register_user("convidado@loja.com", "senha-forte-123", Some("token-do-convite"))
            .await
            .unwrap();
        let user = auth.validate_token(&registered.token).await.unwrap();
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.invite_token_hash, None);

        // Token consumido: não ativa de novo nem troca a senha
        assert!(auth
            .register_user("convidado@loja.com", "outra-senha-123", Some("token-do-convite"))
            .await
            .is_err());
        assert!(auth.login_user("convidado@loja.com", "senha-forte-123").await.is_ok());
    }

    #[tokio::test]
    async fn register_then_login_round() {
        let auth = service("segredo-de-teste-com-mais-de-32-caracteres");
        let registered = auth.register_user("Dono@Loja.com ", "senha-forte-123", None).await.unwrap();
        let user = auth.validate_token(&registered.token).await.unwrap();
        assert_eq!(user.email, "dono@loja.com");

        assert!(auth.login_user("dono@loja.com", "senha-forte-123").await.is_ok());
        assert!(matches!(
            auth.login_user("dono@loja.com", "errada").await,
            Err(AppError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login_user("ninguem@loja.com", "senha-forte-123").await,
            Err(AppError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn duplicate_active_email_conflicts() {
        let auth = service("segredo-de-teste-com-mais-de-32-caracteres");
        auth.register_user("a@b.com", "senha-forte-123", None).await.unwrap();
        assert!(matches!(
            auth.register_user("a@b.com", "outra-senha-123", None).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_is_unauthenticated() {
        let issuer = service("um-segredo-qualquer-com-mais-de-32-chars");
        let verifier = service("outro-segredo-qualquer-com-mais-de-32-chars");
        let token = issuer.create_token(Uuid::new_v4()).unwrap().token;

        assert!(matches!(
            verifier.validate_token(&token).await,
            Err(AppError::Unauthenticated)
        ));
        assert!(matches!(
            verifier.validate_token("nao-e-um-jwt").await,
            Err(AppError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn expired_token_is_unauthenticated() {
        let auth = service("segredo-de-teste-com-mais-de-32-caracteres");
        let registered = auth.register_user("x@y.com", "senha-forte-123", None).await.unwrap();
        let user = auth.validate_token(&registered.token).await.unwrap();

        let past = Utc::now() - Duration::days(1);
        let claims = Claims {
            sub: user.id,
            exp: past.timestamp() as usize,
            iat: (past - Duration::days(SESSION_TTL_DAYS)).timestamp() as usize,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"segredo-de-teste-com-mais-de-32-caracteres"),
        )
        .unwrap();

        assert!(matches!(
            auth.validate_token(&token).await,
            Err(AppError::Unauthenticated)
        ));
    }
}
