// src/models/api_keys.rs

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::common::error::AppError;

// --- ESCOPOS ---

/// Registro fixo de capacidades que uma chave pode receber.
/// A ordem do registro é a ordem em que os escopos ficam gravados.
static SCOPE_REGISTRY: LazyLock<BTreeMap<&'static str, (u8, &'static str)>> =
    LazyLock::new(|| {
        BTreeMap::from([
            ("read", (0, "Leitura dos dados do tenant")),
            ("write", (1, "Criação e alteração de dados do tenant")),
            ("admin", (2, "Operações administrativas do tenant")),
        ])
    });

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ScopeInfo {
    #[schema(example = "read")]
    pub name: &'static str,
    #[schema(example = "Leitura dos dados do tenant")]
    pub description: &'static str,
}

pub fn known_scopes() -> Vec<ScopeInfo> {
    let mut scopes: Vec<_> = SCOPE_REGISTRY.iter().collect();
    scopes.sort_by_key(|(_, (order, _))| *order);
    scopes
        .into_iter()
        .map(|(name, (_, description))| ScopeInfo {
            name: *name,
            description: *description,
        })
        .collect()
}

fn valid_scope_names() -> Vec<&'static str> {
    known_scopes().into_iter().map(|s| s.name).collect()
}

/// Valida contra o registro, remove duplicatas e ordena.
/// Escopo desconhecido => erro listando os inválidos e os válidos.
pub fn normalize_scopes(requested: &[String]) -> Result<Vec<String>, AppError> {
    let invalid: Vec<&str> = requested
        .iter()
        .map(String::as_str)
        .filter(|s| !SCOPE_REGISTRY.contains_key(*s))
        .collect();

    if !invalid.is_empty() {
        return Err(AppError::invalid_with(
            format!("Escopo(s) inválido(s): {}", invalid.join(", ")),
            serde_json::json!({
                "invalidScopes": invalid,
                "validScopes": valid_scope_names(),
            }),
        ));
    }

    if requested.is_empty() {
        return Err(AppError::invalid_with(
            "Informe ao menos um escopo.",
            serde_json::json!({ "validScopes": valid_scope_names() }),
        ));
    }

    let mut scopes: Vec<String> = requested.to_vec();
    scopes.sort_by_key(|s| SCOPE_REGISTRY[s.as_str()].0);
    scopes.dedup();
    Ok(scopes)
}

// --- STATUS ---

// Mapeia o CREATE TYPE api_key_status do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "api_key_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyStatus {
    Active,
    Revoked,
}

impl ApiKeyStatus {
    /// Única transição permitida: active -> revoked. Não há "des-revogar".
    pub fn revoke(self) -> Result<ApiKeyStatus, AppError> {
        match self {
            ApiKeyStatus::Active => Ok(ApiKeyStatus::Revoked),
            ApiKeyStatus::Revoked => Err(AppError::invalid("A chave de API já está revogada.")),
        }
    }

    pub fn ensure_active(self) -> Result<(), AppError> {
        match self {
            ApiKeyStatus::Active => Ok(()),
            ApiKeyStatus::Revoked => Err(AppError::invalid(
                "A chave de API está revogada e não pode ser alterada.",
            )),
        }
    }
}

// --- CHAVE (O que sai do banco) ---

// Não implementa Serialize de propósito: o hash nunca sai da API.
#[derive(Debug, Clone, FromRow)]
pub struct ApiKey {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub created_by: Option<Uuid>,
    pub name: String,
    pub key_prefix: String,
    pub key_hash: String,
    pub scopes: Vec<String>,
    pub status: ApiKeyStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_used_ip: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApiKey {
    /// Expirada somente quando `now > expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }
}

// Dados para inserir uma nova chave (só hash + prefixo)
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub created_by: Option<Uuid>,
    pub name: String,
    pub key_prefix: String,
    pub key_hash: String,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

// A visão pública da chave
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyInfo {
    pub id: Uuid,
    #[schema(example = "Integração ERP")]
    pub name: String,
    #[schema(example = "bpk_1a2b3c4d")]
    pub key_prefix: String,
    #[schema(example = json!(["read"]))]
    pub scopes: Vec<String>,
    pub status: ApiKeyStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_used_ip: Option<String>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ApiKey> for ApiKeyInfo {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            name: key.name,
            key_prefix: key.key_prefix,
            scopes: key.scopes,
            status: key.status,
            expires_at: key.expires_at,
            last_used_at: key.last_used_at,
            last_used_ip: key.last_used_ip,
            revoked_at: key.revoked_at,
            created_at: key.created_at,
        }
    }
}

/// Aviso enviado junto com a chave em texto puro.
pub const ONE_TIME_REVEAL_WARNING: &str =
    "Guarde esta chave agora: ela não será exibida novamente.";

// Resposta de criação/rotação: a ÚNICA vez em que a chave aparece
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeySecretResponse {
    #[serde(flatten)]
    pub key: ApiKeyInfo,
    #[schema(example = "bpk_1a2b3c4d...")]
    pub api_key: String,
    pub warning: &'static str,
}

// --- PAYLOADS ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyPayload {
    #[validate(length(min = 1, max = 100, message = "O nome deve ter entre 1 e 100 caracteres."))]
    #[schema(example = "Integração ERP")]
    pub name: String,

    #[schema(example = json!(["read", "write"]))]
    pub scopes: Vec<String>,

    #[validate(range(min = 1, max = 3650, message = "A validade deve ser entre 1 e 3650 dias."))]
    #[schema(example = 90)]
    pub expires_in_days: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScopesPayload {
    #[schema(example = json!(["read"]))]
    pub scopes: Vec<String>,
}

/// Resultado de uma verificação bem-sucedida de `x-api-key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyContext {
    pub tenant_id: Uuid,
    pub key_id: Uuid,
    pub scopes: Vec<String>,
}

impl ApiKeyContext {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalize_orders_and_dedups() {
        let scopes = normalize_scopes(&strings(&["admin", "read", "admin"])).unwrap();
        assert_eq!(scopes, strings(&["read", "admin"]));
    }

    #[test]
    fn unknown_scope_lists_invalid_and_valid_sets() {
        let err = normalize_scopes(&strings(&["read", "admin-extra"])).unwrap_err();
        match err {
            AppError::InvalidInput { details: Some(details), .. } => {
                assert_eq!(details["invalidScopes"], serde_json::json!(["admin-extra"]));
                assert_eq!(details["validScopes"], serde_json::json!(["read", "write", "admin"]));
            }
            other => panic!("erro inesperado: {other:?}"),
        }
    }

    #[test]
    fn empty_scope_list_is_rejected() {
        assert!(normalize_scopes(&[]).is_err());
    }

    #[test]
    fn revoke_is_the_only_transition() {
        assert_eq!(ApiKeyStatus::Active.revoke().unwrap(), ApiKeyStatus::Revoked);
        assert!(ApiKeyStatus::Revoked.revoke().is_err());
        assert!(ApiKeyStatus::Revoked.ensure_active().is_err());
        assert!(ApiKeyStatus::Active.ensure_active().is_ok());
    }
}
