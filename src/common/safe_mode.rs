// src/common/safe_mode.rs

//! "Modo seguro": com segredos críticos ausentes ou malformados, todo efeito
//! externo (e-mail, pagamentos, IA, conectores) fica desligado.
//!
//! `evaluate` é pura e barata. Quem precisa do status chama de novo em vez
//! de guardar o resultado.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    common::{crypto::ENCRYPTION_KEY_LENGTH, error::AppError},
    config::{SecretConfig, MIN_SESSION_SECRET_LENGTH},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SafeModeStatus {
    pub active: bool,
    #[schema(example = json!(["ENCRYPTION_KEY ausente"]))]
    pub reasons: Vec<String>,
}

pub fn evaluate(config: &SecretConfig) -> SafeModeStatus {
    let mut reasons = Vec::new();

    if !config.session_secret_valid() {
        reasons.push(match config.session_secret() {
            None => "SESSION_SECRET ausente".to_string(),
            Some(_) => format!(
                "SESSION_SECRET deve ter no mínimo {MIN_SESSION_SECRET_LENGTH} caracteres"
            ),
        });
    }

    if !config.encryption_key_valid() {
        reasons.push(match config.encryption_key() {
            None => "ENCRYPTION_KEY ausente".to_string(),
            Some(_) => format!(
                "ENCRYPTION_KEY deve ter exatamente {ENCRYPTION_KEY_LENGTH} caracteres"
            ),
        });
    }

    SafeModeStatus {
        active: !reasons.is_empty(),
        reasons,
    }
}

/// Barreira para qualquer operação com efeito externo.
pub fn ensure_side_effects_allowed(config: &SecretConfig) -> Result<(), AppError> {
    let status = evaluate(config);
    if status.active {
        tracing::warn!(reasons = ?status.reasons, "🛑 Operação bloqueada pelo modo seguro");
        return Err(AppError::Configuration(status.reasons.join("; ")));
    }
    Ok(())
}
