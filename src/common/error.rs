// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::common::crypto::CryptoError;

// Nosso tipo de erro único. Cada variante tem um código estável que o
// frontend pode usar sem depender do texto da mensagem.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    // Validação de regra de negócio (escopo desconhecido, revogação duplicada...)
    #[error("{message}")]
    InvalidInput {
        message: String,
        details: Option<Value>,
    },

    #[error("Não autenticado")]
    Unauthenticated,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Acesso negado")]
    Forbidden,

    // Recurso ausente OU fora do tenant do chamador (nunca diferenciamos)
    #[error("{0} não encontrado(a)")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Sessão de preview expirada")]
    PreviewExpired,

    #[error("Sessão de preview revogada")]
    PreviewRevoked,

    #[error("Limite de requisições excedido")]
    RateLimited,

    #[error("Configuração inválida: {0}")]
    Configuration(String),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Erro de criptografia: {0}")]
    CryptoError(#[from] CryptoError),
}

impl AppError {
    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::InvalidInput {
            message: message.into(),
            details: None,
        }
    }

    pub fn invalid_with(message: impl Into<String>, details: Value) -> Self {
        AppError::InvalidInput {
            message: message.into(),
            details: Some(details),
        }
    }

    /// Código estável exposto no corpo da resposta.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) | AppError::InvalidInput { .. } => "VALIDATION_ERROR",
            AppError::Unauthenticated => "UNAUTHENTICATED",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::Forbidden => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::PreviewExpired => "PREVIEW_EXPIRED",
            AppError::PreviewRevoked => "PREVIEW_REVOKED",
            AppError::RateLimited => "RATE_LIMITED",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_)
            | AppError::JwtError(_)
            | AppError::CryptoError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) | AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PreviewExpired | AppError::PreviewRevoked => StatusCode::GONE,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let display = self.to_string();

        let (message, details) = match self {
            // Retorna todos os detalhes da validação, campo a campo.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                (
                    "Um ou mais campos são inválidos.".to_string(),
                    Some(json!(details)),
                )
            }
            AppError::InvalidInput { message, details } => (message, details),
            AppError::Unauthenticated => (
                "Credencial de autenticação inválida ou ausente.".to_string(),
                None,
            ),
            AppError::InvalidCredentials => ("E-mail ou senha inválidos.".to_string(), None),
            AppError::Forbidden => (
                "Você não tem permissão para realizar esta ação.".to_string(),
                None,
            ),
            AppError::NotFound(_)
            | AppError::Conflict(_)
            | AppError::PreviewExpired
            | AppError::PreviewRevoked
            | AppError::RateLimited => (display, None),
            AppError::Configuration(ref reason) => {
                tracing::error!("Erro de configuração: {}", reason);
                (
                    "Serviço indisponível por falta de configuração.".to_string(),
                    None,
                )
            }

            // Todos os outros erros viram 500. O detalhe vai só para o log.
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                ("Ocorreu um erro inesperado.".to_string(), None)
            }
        };

        let mut body = json!({ "code": code, "error": message });
        if let Some(details) = details {
            body["details"] = details;
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthenticated_and_forbidden_are_distinct() {
        assert_eq!(AppError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_ne!(AppError::Unauthenticated.code(), AppError::Forbidden.code());
    }

    #[test]
    fn preview_states_map_to_gone_with_their_own_codes() {
        assert_eq!(AppError::PreviewExpired.status(), StatusCode::GONE);
        assert_eq!(AppError::PreviewRevoked.status(), StatusCode::GONE);
        assert_eq!(AppError::PreviewExpired.code(), "PREVIEW_EXPIRED");
        assert_eq!(AppError::PreviewRevoked.code(), "PREVIEW_REVOKED");
    }

    #[test]
    fn internal_causes_share_one_code() {
        let err = AppError::InternalServerError(anyhow::anyhow!("detalhe sensível"));
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
