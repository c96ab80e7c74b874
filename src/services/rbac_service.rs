// src/services/rbac_service.rs

//! Decisão de autorização: função pura sobre o cargo do contexto.

use crate::{
    common::error::AppError,
    models::{api_keys::ApiKeyContext, tenancy::{AuthContext, Role}},
};

/// O que uma rota exige de quem chama.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRequirement {
    /// Cargo mínimo, pela ordem viewer < staff < admin < owner.
    AtLeast(Role),
    /// Lista explícita, aplicada literalmente (pode excluir um cargo
    /// que passaria pela ordem).
    OneOf(&'static [Role]),
}

impl RoleRequirement {
    pub fn allows(&self, role: Role) -> bool {
        match self {
            RoleRequirement::AtLeast(min) => role.rank() >= min.rank(),
            RoleRequirement::OneOf(allowed) => allowed.contains(&role),
        }
    }
}

pub fn authorize(ctx: &AuthContext, requirement: &RoleRequirement) -> Result<(), AppError> {
    if requirement.allows(ctx.role()) {
        return Ok(());
    }

    tracing::warn!(
        tenant_id = %ctx.tenant_id(),
        user_id = %ctx.user_id(),
        role = ctx.role().as_str(),
        ?requirement,
        "🚫 Cargo insuficiente"
    );
    Err(AppError::Forbidden)
}

/// Chave de API sem o escopo exigido => Forbidden (a chave é válida,
/// só não pode fazer isso).
pub fn require_scope(key: &ApiKeyContext, scope: &str) -> Result<(), AppError> {
    if key.has_scope(scope) {
        return Ok(());
    }

    tracing::warn!(tenant_id = %key.tenant_id, key_id = %key.key_id, scope, "🚫 Escopo ausente na chave");
    Err(AppError::Forbidden)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ctx(role: Role) -> AuthContext {
        AuthContext::new(Uuid::new_v4(), Uuid::new_v4(), role)
    }

    #[test]
    fn higher_roles_pass_every_route_lower_roles_pass() {
        for min in Role::ALL {
            let requirement = RoleRequirement::AtLeast(min);
            for r1 in Role::ALL {
                for r2 in Role::ALL {
                    if r1 <= r2 && requirement.allows(r1) {
                        assert!(requirement.allows(r2), "{r1:?} passa mas {r2:?} não em {min:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn staff_is_forbidden_on_admin_routes() {
        let admin_only = RoleRequirement::AtLeast(Role::Admin);
        assert!(matches!(authorize(&ctx(Role::Staff), &admin_only), Err(AppError::Forbidden)));
        assert!(authorize(&ctx(Role::Admin), &admin_only).is_ok());
        assert!(authorize(&ctx(Role::Owner), &admin_only).is_ok());
    }

    #[test]
    fn explicit_set_is_applied_verbatim() {
        // Exclui admin de propósito, embora admin > staff
        let set = RoleRequirement::OneOf(&[Role::Staff, Role::Owner]);
        assert!(set.allows(Role::Staff));
        assert!(set.allows(Role::Owner));
        assert!(!set.allows(Role::Admin));
        assert!(!set.allows(Role::Viewer));
    }

    #[test]
    fn key_scope_check() {
        let key = ApiKeyContext {
            tenant_id: Uuid::new_v4(),
            key_id: Uuid::new_v4(),
            scopes: vec!["read".into()],
        };
        assert!(require_scope(&key, "read").is_ok());
        assert!(matches!(require_scope(&key, "write"), Err(AppError::Forbidden)));
    }
}
