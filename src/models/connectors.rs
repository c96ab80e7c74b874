// src/models/connectors.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// Segredo de terceiro (ex.: chave do provedor de pagamento), já cifrado
#[derive(Debug, Clone, FromRow)]
pub struct ConnectorSecret {
    pub tenant_id: Uuid,
    pub provider: String,
    pub sealed_secret: String,
    pub updated_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoreConnectorSecretPayload {
    #[validate(length(min = 1, max = 4096, message = "O segredo é obrigatório."))]
    #[schema(example = "sk_live_...")]
    pub secret: String,
}

// Nunca devolvemos o segredo, só se ele está utilizável
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorStatus {
    #[schema(example = "stripe")]
    pub provider: String,
    pub configured: bool,
    pub updated_at: DateTime<Utc>,
}

/// Slug do provedor: minúsculas, dígitos, `-` e `_`, até 40 caracteres.
pub fn is_valid_provider(provider: &str) -> bool {
    !provider.is_empty()
        && provider.len() <= 40
        && provider
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}
