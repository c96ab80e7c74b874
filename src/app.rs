// src/app.rs

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::AppState, docs::ApiDoc, handlers};

/// Monta o router completo. A ordem de verificação de cada rota fica nos
/// extratores de cada handler (autenticação -> tenant -> cargo -> limite).
pub fn build_app(app_state: AppState) -> Router {
    // Define as rotas de autenticação (públicas)
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    // Rotas de usuário (só sessão, sem tenant)
    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .route("/me/tenants", get(handlers::auth::get_my_tenants));

    let tenancy_routes = Router::new()
        .route(
            "/",
            post(handlers::tenancy::create_tenant).get(handlers::tenancy::list_my_tenants),
        )
        .route("/members", post(handlers::tenancy::add_member))
        .route(
            "/members/{user_id}",
            patch(handlers::tenancy::update_member_role).delete(handlers::tenancy::remove_member),
        );

    let api_key_routes = Router::new()
        .route("/scopes", get(handlers::api_keys::list_scopes))
        .route(
            "/",
            post(handlers::api_keys::create_key).get(handlers::api_keys::list_keys),
        )
        .route("/{id}/scopes", patch(handlers::api_keys::update_scopes))
        .route("/{id}/rotate", post(handlers::api_keys::rotate_key))
        .route("/{id}/revoke", post(handlers::api_keys::revoke_key))
        .route("/{id}", delete(handlers::api_keys::delete_key));

    let preview_routes = Router::new()
        .route("/", get(handlers::preview::list_previews))
        .route("/create", post(handlers::preview::create_preview))
        .route("/validate", get(handlers::preview::validate_preview))
        .route("/revoke/{id}", post(handlers::preview::revoke_preview))
        .route("/{id}", delete(handlers::preview::delete_preview));

    let connector_routes = Router::new()
        .route("/", get(handlers::connectors::list_connectors))
        .route(
            "/{provider}/secret",
            put(handlers::connectors::store_connector_secret),
        );

    // Combina tudo no router principal
    Router::new()
        .route("/api/health", get(handlers::system::health))
        .route("/api/audit", get(handlers::audit::list_audit))
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/tenants", tenancy_routes)
        .nest("/api/api-keys", api_key_routes)
        .nest("/api/preview", preview_routes)
        .nest("/api/connectors", connector_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
}
