// src/models/preview.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// Cargos de demonstração. NÃO são os mesmos cargos de Membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "preview_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PreviewRole {
    Admin,
    Staff,
    Customer,
}

// Status derivado na leitura, nunca gravado
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PreviewStatus {
    Active,
    Expired,
    Revoked,
}

#[derive(Debug, Clone, FromRow)]
pub struct PreviewSession {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub created_by: Option<Uuid>,
    pub token_hash: String,
    pub role: PreviewRole,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PreviewSession {
    /// Revogada tem precedência sobre expirada; expira só quando `now > expires_at`.
    pub fn status_at(&self, now: DateTime<Utc>) -> PreviewStatus {
        if self.revoked {
            PreviewStatus::Revoked
        } else if now > self.expires_at {
            PreviewStatus::Expired
        } else {
            PreviewStatus::Active
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPreviewSession {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub created_by: Option<Uuid>,
    pub token_hash: String,
    pub role: PreviewRole,
    pub expires_at: DateTime<Utc>,
}

// O que uma sessão de preview pode ou não fazer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRestrictions {
    pub can_modify_data: bool,
    pub can_send_emails: bool,
    pub can_send_sms: bool,
    pub can_process_payments: bool,
}

impl PreviewRestrictions {
    // Efeitos externos (e-mail, SMS, pagamento) sempre desligados em preview
    pub fn for_role(role: PreviewRole) -> Self {
        Self {
            can_modify_data: role != PreviewRole::Customer,
            can_send_emails: false,
            can_send_sms: false,
            can_process_payments: false,
        }
    }
}

// --- PAYLOADS / RESPOSTAS ---

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePreviewPayload {
    pub role: PreviewRole,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePreviewResponse {
    pub id: Uuid,
    pub role: PreviewRole,
    pub token: String,
    #[schema(example = "http://localhost:5173/preview?token=...")]
    pub share_url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ValidatePreviewQuery {
    /// Token opaco recebido no link de compartilhamento
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewValidation {
    pub session_id: Uuid,
    pub tenant_id: Uuid,
    pub role: PreviewRole,
    pub expires_at: DateTime<Utc>,
    #[schema(example = 24)]
    pub remaining_hours: i64,
    pub restrictions: PreviewRestrictions,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSessionInfo {
    pub id: Uuid,
    pub role: PreviewRole,
    pub status: PreviewStatus,
    pub created_by: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PreviewSessionInfo {
    pub fn from_session(session: PreviewSession, now: DateTime<Utc>) -> Self {
        Self {
            status: session.status_at(now),
            id: session.id,
            role: session.role,
            created_by: session.created_by,
            expires_at: session.expires_at,
            revoked_at: session.revoked_at,
            created_at: session.created_at,
        }
    }
}
