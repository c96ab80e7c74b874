// src/middleware/auth.rs

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::{
    common::error::AppError,
    config::AppState,
    models::{api_keys::ApiKeyContext, auth::User},
};

pub const API_KEY_HEADER: &str = "x-api-key";

/// IP do cliente, pelo primeiro salto de `x-forwarded-for` ou `x-real-ip`.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

// ---
// 1. Sessão (Authorization: Bearer)
// ---
/// Extrator para obter o usuário autenticado diretamente nos handlers.
/// O resultado fica guardado nas extensions: os extratores seguintes
/// (tenant, cargo) reutilizam em vez de validar o token de novo.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(user.clone());
        }

        // Bearer e x-api-key são caminhos exclusivos
        if parts.headers.contains_key(API_KEY_HEADER) {
            return Err(AppError::Unauthenticated);
        }

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthenticated)?;

        let app_state = AppState::from_ref(state);
        let user = app_state.auth_service.validate_token(bearer.token()).await?;

        let authenticated = AuthenticatedUser(user);
        parts.extensions.insert(authenticated.clone());
        Ok(authenticated)
    }
}

// ---
// 2. Chave de API (x-api-key)
// ---
#[derive(Debug, Clone)]
pub struct ApiKeyPrincipal(pub ApiKeyContext);

impl<S> FromRequestParts<S> for ApiKeyPrincipal
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<ApiKeyPrincipal>() {
            return Ok(principal.clone());
        }

        if parts.headers.contains_key(AUTHORIZATION) {
            return Err(AppError::Unauthenticated);
        }

        let raw = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .ok_or(AppError::Unauthenticated)?;

        let app_state = AppState::from_ref(state);
        let ip = client_ip(&parts.headers);
        let context = app_state.api_key_service.verify(raw, ip.as_deref()).await?;

        let principal = ApiKeyPrincipal(context);
        parts.extensions.insert(principal.clone());
        Ok(principal)
    }
}
