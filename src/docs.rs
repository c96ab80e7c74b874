// src/docs.rs

use utoipa::openapi::security::{ApiKey, ApiKeyValue, Http, HttpAuthScheme, SecurityScheme};
use utoipa::OpenApi;

use crate::{common, handlers, models};

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- System ---
        handlers::system::health,

        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,
        handlers::auth::get_my_tenants,

        // --- Tenancy ---
        handlers::tenancy::create_tenant,
        handlers::tenancy::list_my_tenants,
        handlers::tenancy::add_member,
        handlers::tenancy::update_member_role,
        handlers::tenancy::remove_member,

        // --- API Keys ---
        handlers::api_keys::list_scopes,
        handlers::api_keys::list_keys,
        handlers::api_keys::create_key,
        handlers::api_keys::update_scopes,
        handlers::api_keys::rotate_key,
        handlers::api_keys::revoke_key,
        handlers::api_keys::delete_key,

        // --- Preview ---
        handlers::preview::create_preview,
        handlers::preview::validate_preview,
        handlers::preview::revoke_preview,
        handlers::preview::list_previews,
        handlers::preview::delete_preview,

        // --- Audit ---
        handlers::audit::list_audit,

        // --- Connectors ---
        handlers::connectors::list_connectors,
        handlers::connectors::store_connector_secret,
    ),
    components(
        schemas(
            // --- System ---
            handlers::system::HealthResponse,
            common::safe_mode::SafeModeStatus,

            // --- Auth ---
            models::auth::UserStatus,
            models::auth::User,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- Tenancy ---
            models::tenancy::Role,
            models::tenancy::Tenant,
            models::tenancy::Membership,
            models::tenancy::TenantMembership,
            models::tenancy::MemberAdded,
            models::tenancy::CreateTenantPayload,
            models::tenancy::AddMemberPayload,
            models::tenancy::UpdateMemberRolePayload,

            // --- API Keys ---
            models::api_keys::ScopeInfo,
            models::api_keys::ApiKeyStatus,
            models::api_keys::ApiKeyInfo,
            models::api_keys::ApiKeySecretResponse,
            models::api_keys::CreateApiKeyPayload,
            models::api_keys::UpdateScopesPayload,

            // --- Preview ---
            models::preview::PreviewRole,
            models::preview::PreviewStatus,
            models::preview::PreviewRestrictions,
            models::preview::CreatePreviewPayload,
            models::preview::CreatePreviewResponse,
            models::preview::PreviewValidation,
            models::preview::PreviewSessionInfo,

            // --- Audit ---
            models::audit::AuditLogEntry,
            models::audit::AuditPage,

            // --- Connectors ---
            models::connectors::ConnectorStatus,
            models::connectors::StoreConnectorSecretPayload,
        )
    ),
    tags(
        (name = "System", description = "Saúde do serviço e modo seguro"),
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Dados do Usuário e seus Tenants"),
        (name = "Tenancy", description = "Tenants e Membros"),
        (name = "API Keys", description = "Ciclo de vida das Chaves de API"),
        (name = "Preview", description = "Links de Demonstração Temporários"),
        (name = "Audit", description = "Trilha de Auditoria"),
        (name = "Connectors", description = "Segredos de Provedores Externos")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
        components.add_security_scheme(
            "api_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-api-key"))),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_core_paths() {
        let doc = ApiDoc::openapi();
        for path in ["/api/api-keys/{id}/rotate", "/api/preview/validate", "/api/audit"] {
            assert!(doc.paths.paths.contains_key(path), "{path} ausente");
        }
    }
}
