// src/config.rs

use std::{fmt, sync::Arc, time::Duration};

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::{
        crypto::{random_hex, ENCRYPTION_KEY_LENGTH},
        error::AppError,
    },
    db::{
        ApiKeyRepository, AuditRepository, ConnectorSecretRepository, MemoryStore,
        PgApiKeyRepository, PgAuditRepository, PgConnectorSecretRepository, PgPreviewRepository,
        PgTenantRepository, PgUserRepository, PreviewRepository, TenantRepository,
        UserRepository,
    },
    middleware::rate_limit::{AllowAll, RateLimiter},
    services::{
        api_key_service::ApiKeyService, audit_service::AuditService, auth::AuthService,
        connector_service::ConnectorService, preview_service::PreviewService,
        tenancy_service::TenantService,
    },
};

pub const MIN_SESSION_SECRET_LENGTH: usize = 32;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_PREVIEW_BASE_URL: &str = "http://localhost:5173";

// ---
// 1. SecretConfig
// ---
/// Tudo o que vem do ambiente, lido uma única vez na inicialização.
/// Depois de construída é imutável e circula como `Arc<SecretConfig>`;
/// nenhum serviço lê variável de ambiente por conta própria.
#[derive(Clone)]
pub struct SecretConfig {
    session_secret: Option<String>,
    encryption_key: Option<String>,
    pub production: bool,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub bind_addr: String,
    pub preview_base_url: String,
    pub bcrypt_cost: u32,
}

// Nunca imprime os segredos
impl fmt::Debug for SecretConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretConfig")
            .field("session_secret", &self.session_secret.as_ref().map(|_| "***"))
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "***"))
            .field("production", &self.production)
            .field("database_url", &self.database_url.as_ref().map(|_| "***"))
            .field("database_max_connections", &self.database_max_connections)
            .field("bind_addr", &self.bind_addr)
            .field("preview_base_url", &self.preview_base_url)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

impl SecretConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Constrói a partir de qualquer fonte chave/valor (o ambiente, ou um
    /// mapa fixo nos testes). Valor vazio conta como ausente.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Self {
            session_secret: get("SESSION_SECRET"),
            encryption_key: get("ENCRYPTION_KEY"),
            production: get("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("production")),
            database_url: get("DATABASE_URL"),
            database_max_connections: get("DATABASE_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_CONNECTIONS),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            preview_base_url: get("PREVIEW_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PREVIEW_BASE_URL.to_string()),
            bcrypt_cost: get("BCRYPT_COST")
                .and_then(|v| v.parse().ok())
                .unwrap_or(bcrypt::DEFAULT_COST),
        }
    }

    pub fn session_secret(&self) -> Option<&str> {
        self.session_secret.as_deref()
    }

    pub fn encryption_key(&self) -> Option<&str> {
        self.encryption_key.as_deref()
    }

    pub fn session_secret_valid(&self) -> bool {
        self.session_secret
            .as_deref()
            .is_some_and(|s| s.chars().count() >= MIN_SESSION_SECRET_LENGTH)
    }

    pub fn encryption_key_valid(&self) -> bool {
        self.encryption_key
            .as_deref()
            .is_some_and(|k| k.len() == ENCRYPTION_KEY_LENGTH)
    }

    /// Segredo usado para assinar os tokens de sessão.
    ///
    /// Em produção um segredo inválido impede a subida do processo. Fora de
    /// produção: segredo curto é usado com aviso; segredo ausente vira um
    /// segredo aleatório válido só enquanto o processo viver.
    pub fn signing_secret(&self) -> Result<String, AppError> {
        if self.session_secret_valid() {
            return Ok(self.session_secret.clone().unwrap_or_default());
        }

        if self.production {
            return Err(AppError::Configuration(format!(
                "SESSION_SECRET ausente ou com menos de {MIN_SESSION_SECRET_LENGTH} caracteres"
            )));
        }

        match &self.session_secret {
            Some(secret) => {
                tracing::warn!("⚠️ SESSION_SECRET curto demais; aceitando apenas fora de produção");
                Ok(secret.clone())
            }
            None => {
                tracing::warn!("⚠️ SESSION_SECRET ausente; usando um segredo efêmero (sessões não sobrevivem a um restart)");
                Ok(random_hex(MIN_SESSION_SECRET_LENGTH))
            }
        }
    }
}

// ---
// 2. Repositórios
// ---
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub tenants: Arc<dyn TenantRepository>,
    pub api_keys: Arc<dyn ApiKeyRepository>,
    pub previews: Arc<dyn PreviewRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pub connectors: Arc<dyn ConnectorSecretRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserRepository::new(pool.clone())),
            tenants: Arc::new(PgTenantRepository::new(pool.clone())),
            api_keys: Arc::new(PgApiKeyRepository::new(pool.clone())),
            previews: Arc::new(PgPreviewRepository::new(pool.clone())),
            audit: Arc::new(PgAuditRepository::new(pool.clone())),
            connectors: Arc::new(PgConnectorSecretRepository::new(pool)),
        }
    }

    pub fn in_memory(store: MemoryStore) -> Self {
        Self {
            users: Arc::new(store.clone()),
            tenants: Arc::new(store.clone()),
            api_keys: Arc::new(store.clone()),
            previews: Arc::new(store.clone()),
            audit: Arc::new(store.clone()),
            connectors: Arc::new(store),
        }
    }
}

// ---
// 3. AppState
// ---
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SecretConfig>,
    pub auth_service: AuthService,
    pub tenant_service: TenantService,
    pub api_key_service: ApiKeyService,
    pub preview_service: PreviewService,
    pub audit_service: AuditService,
    pub connector_service: ConnectorService,
    pub rate_limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    pub async fn new(config: SecretConfig) -> anyhow::Result<Self> {
        let repos = match config.database_url.as_deref() {
            Some(database_url) => {
                // Conecta ao banco de dados, usando '?' para propagar erros
                let pool = PgPoolOptions::new()
                    .max_connections(config.database_max_connections)
                    .acquire_timeout(Duration::from_secs(3))
                    .connect(database_url)
                    .await?;
                tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

                sqlx::migrate!().run(&pool).await?;
                tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

                Repositories::postgres(pool)
            }
            None if config.production => {
                anyhow::bail!("DATABASE_URL deve ser definida em produção");
            }
            None => {
                tracing::warn!("⚠️ DATABASE_URL ausente; usando armazenamento em memória");
                Repositories::in_memory(MemoryStore::new())
            }
        };

        Ok(Self::from_parts(config, repos, Arc::new(AllowAll))?)
    }

    /// Monta o gráfico de dependências. Usado também pelos testes, com o
    /// `MemoryStore` e um limitador de taxa à escolha.
    pub fn from_parts(
        config: SecretConfig,
        repos: Repositories,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Result<Self, AppError> {
        let signing_secret = config.signing_secret()?;
        let config = Arc::new(config);

        let audit_service = AuditService::new(repos.audit.clone());

        let auth_service = AuthService::new(
            repos.users.clone(),
            repos.tenants.clone(),
            signing_secret,
            config.bcrypt_cost,
        );
        let tenant_service = TenantService::new(repos.tenants.clone(), repos.users.clone());
        let api_key_service = ApiKeyService::new(repos.api_keys.clone());
        let preview_service = PreviewService::new(
            repos.previews.clone(),
            audit_service.clone(),
            config.preview_base_url.clone(),
        );
        let connector_service = ConnectorService::new(repos.connectors, config.clone());

        Ok(Self {
            config,
            auth_service,
            tenant_service,
            api_key_service,
            preview_service,
            audit_service,
            connector_service,
            rate_limiter,
        })
    }
}
