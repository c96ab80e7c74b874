// src/models/audit.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Ações auditadas. O texto (`as_str`) é o que fica gravado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    TenantCreated,
    MemberAdded,
    MemberRoleChanged,
    MemberRemoved,
    ApiKeyCreated,
    ApiKeyScopesUpdated,
    ApiKeyRotated,
    ApiKeyRevoked,
    ApiKeyDeleted,
    PreviewCreated,
    PreviewViewed,
    PreviewRevoked,
    PreviewDeleted,
    ConnectorSecretStored,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::TenantCreated => "tenant.created",
            AuditAction::MemberAdded => "member.added",
            AuditAction::MemberRoleChanged => "member.role_changed",
            AuditAction::MemberRemoved => "member.removed",
            AuditAction::ApiKeyCreated => "api_key.created",
            AuditAction::ApiKeyScopesUpdated => "api_key.scopes_updated",
            AuditAction::ApiKeyRotated => "api_key.rotated",
            AuditAction::ApiKeyRevoked => "api_key.revoked",
            AuditAction::ApiKeyDeleted => "api_key.deleted",
            AuditAction::PreviewCreated => "preview.created",
            AuditAction::PreviewViewed => "preview.viewed",
            AuditAction::PreviewRevoked => "preview.revoked",
            AuditAction::PreviewDeleted => "preview.deleted",
            AuditAction::ConnectorSecretStored => "connector.secret_stored",
        }
    }

    pub fn entity_type(self) -> &'static str {
        match self {
            AuditAction::TenantCreated => "tenant",
            AuditAction::MemberAdded
            | AuditAction::MemberRoleChanged
            | AuditAction::MemberRemoved => "membership",
            AuditAction::ApiKeyCreated
            | AuditAction::ApiKeyScopesUpdated
            | AuditAction::ApiKeyRotated
            | AuditAction::ApiKeyRevoked
            | AuditAction::ApiKeyDeleted => "api_key",
            AuditAction::PreviewCreated
            | AuditAction::PreviewViewed
            | AuditAction::PreviewRevoked
            | AuditAction::PreviewDeleted => "preview_session",
            AuditAction::ConnectorSecretStored => "connector",
        }
    }
}

// Registro imutável. Nada neste serviço faz UPDATE ou DELETE nele.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    // null para ações anônimas (ex.: visualização de preview)
    pub actor_user_id: Option<Uuid>,
    #[schema(example = "api_key.rotated")]
    pub action: String,
    #[schema(example = "api_key")]
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub tenant_id: Uuid,
    pub actor_user_id: Option<Uuid>,
    pub action: AuditAction,
    pub entity_id: Option<Uuid>,
    pub metadata: Value,
}

impl NewAuditEntry {
    pub fn new(tenant_id: Uuid, action: AuditAction) -> Self {
        Self {
            tenant_id,
            actor_user_id: None,
            action,
            entity_id: None,
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn actor(mut self, user_id: Uuid) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn entity(mut self, entity_id: Uuid) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    /// Página (começa em 1)
    pub page: Option<i64>,
    /// Itens por página (máx. 200)
    pub per_page: Option<i64>,
    /// Filtra por ação, ex.: `api_key.rotated`
    pub action: Option<String>,
}

impl AuditQuery {
    /// (page, per_page) já saneados
    pub fn pagination(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, per_page)
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditPage {
    pub items: Vec<AuditLogEntry>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_is_clamped() {
        let q = AuditQuery { page: Some(0), per_page: Some(10_000), action: None };
        assert_eq!(q.pagination(), (1, MAX_PAGE_SIZE));

        let q = AuditQuery { page: None, per_page: None, action: None };
        assert_eq!(q.pagination(), (1, DEFAULT_PAGE_SIZE));
    }
}
