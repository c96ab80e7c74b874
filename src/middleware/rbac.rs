// src/middleware/rbac.rs

use std::marker::PhantomData;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::tenancy::TenantContext,
    models::tenancy::{AuthContext, Role},
    services::rbac_service::{self, RoleRequirement},
};

/// 1. O Trait que define a exigência de cargo de uma rota
pub trait RoleGuard: Send + Sync + 'static {
    fn requirement() -> RoleRequirement;
}

/// 2. O Extractor (Guardião): autentica -> resolve tenant -> autoriza.
/// A primeira falha interrompe a cadeia.
pub struct Authorized<G>(pub AuthContext, pub PhantomData<G>);

// 3. Implementação do FromRequestParts
impl<G, S> FromRequestParts<S> for Authorized<G>
where
    G: RoleGuard,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TenantContext(ctx) = TenantContext::from_request_parts(parts, state).await?;
        rbac_service::authorize(&ctx, &G::requirement())?;
        Ok(Authorized(ctx, PhantomData))
    }
}

// ---
// DEFINIÇÃO DAS EXIGÊNCIAS (TIPOS)
// ---

pub struct AnyMember;
impl RoleGuard for AnyMember {
    fn requirement() -> RoleRequirement {
        RoleRequirement::AtLeast(Role::Viewer)
    }
}

pub struct AdminOrAbove;
impl RoleGuard for AdminOrAbove {
    fn requirement() -> RoleRequirement {
        RoleRequirement::AtLeast(Role::Admin)
    }
}

/// Lista explícita, não "admin ou acima": os segredos de provedores
/// (pagamento, e-mail) ficam só com quem administra a conta, mesmo que a
/// ordem de cargos ganhe um nível novo.
pub struct AccountAdmins;
impl RoleGuard for AccountAdmins {
    fn requirement() -> RoleRequirement {
        RoleRequirement::OneOf(&[Role::Owner, Role::Admin])
    }
}
