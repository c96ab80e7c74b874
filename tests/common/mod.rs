//! Infra compartilhada dos testes de integração: app completo em memória,
//! exercitado com `oneshot` (sem socket).
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use factory_backend::{
    app::build_app,
    config::{AppState, Repositories, SecretConfig},
    db::MemoryStore,
    middleware::rate_limit::{AllowAll, RateLimiter},
};

pub const SESSION_SECRET: &str = "segredo-de-teste-com-mais-de-32-caracteres";
pub const ENCRYPTION_KEY: &str = "0123456789abcdef0123456789abcdef";

pub fn test_config(vars: &[(&str, &str)]) -> SecretConfig {
    let vars: Vec<(String, String)> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    SecretConfig::from_lookup(move |name| {
        vars.iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
    })
}

pub fn default_config() -> SecretConfig {
    test_config(&[
        ("SESSION_SECRET", SESSION_SECRET),
        ("ENCRYPTION_KEY", ENCRYPTION_KEY),
        ("BCRYPT_COST", "4"),
        ("PREVIEW_BASE_URL", "https://demo.example.com"),
    ])
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(default_config(), Arc::new(AllowAll))
    }

    pub fn with(config: SecretConfig, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        let state = AppState::from_parts(
            config,
            Repositories::in_memory(MemoryStore::new()),
            rate_limiter,
        )
        .expect("estado de teste");
        Self {
            router: build_app(state.clone()),
            state,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        headers: &[(&str, String)],
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Registra e devolve o token de sessão.
    pub async fn register(&self, email: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/auth/register",
                &[],
                Some(json!({ "email": email, "password": "senha-forte-123" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Cria um tenant com o dono indicado e devolve o id.
    pub async fn create_tenant(&self, owner_token: &str, slug: &str) -> Uuid {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/tenants",
                &[bearer(owner_token)],
                Some(json!({ "name": format!("Loja {slug}"), "slug": slug })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().parse().unwrap()
    }

    /// Devolve o corpo: para e-mail sem cadastro ativo traz o `inviteToken`.
    pub async fn add_member(&self, owner_token: &str, tenant: Uuid, email: &str, role: &str) -> Value {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/tenants/members",
                &member(owner_token, tenant),
                Some(json!({ "email": email, "role": role })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    /// Cria uma chave e devolve (id, chave em texto puro).
    pub async fn create_key(&self, token: &str, tenant: Uuid, scopes: &[&str]) -> (Uuid, String) {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/api-keys",
                &member(token, tenant),
                Some(json!({ "name": "Integração ERP", "scopes": scopes })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["id"].as_str().unwrap().parse().unwrap(),
            body["apiKey"].as_str().unwrap().to_string(),
        )
    }

    pub async fn audit_actions(&self, token: &str, tenant: Uuid, action: &str) -> Vec<Value> {
        let (status, body) = self
            .request(
                Method::GET,
                &format!("/api/audit?action={action}&perPage=200"),
                &member(token, tenant),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["items"].as_array().unwrap().clone()
    }
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("authorization", format!("Bearer {token}"))
}

pub fn tenant_header(tenant: Uuid) -> (&'static str, String) {
    ("x-tenant-id", tenant.to_string())
}

pub fn api_key(raw: &str) -> (&'static str, String) {
    ("x-api-key", raw.to_string())
}

/// Sessão + tenant: o par que quase toda rota de membro exige.
pub fn member(token: &str, tenant: Uuid) -> Vec<(&'static str, String)> {
    vec![bearer(token), tenant_header(tenant)]
}

/// Dono com tenant próprio, o ponto de partida da maioria dos testes.
pub async fn owner_with_tenant(app: &TestApp, slug: &str) -> (String, Uuid) {
    let token = app.register(&format!("dono@{slug}.com")).await;
    let tenant = app.create_tenant(&token, slug).await;
    (token, tenant)
}
