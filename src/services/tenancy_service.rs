// src/services/tenancy_service.rs

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::{
    common::{
        crypto::{hash_secret, random_hex},
        error::AppError,
    },
    db::{TenantRepository, UserRepository},
    models::{
        audit::{AuditAction, NewAuditEntry},
        auth::UserStatus,
        tenancy::{AuthContext, MemberAdded, Membership, Role, Tenant},
    },
    services::auth::normalize_email,
};

const DEFAULT_PLAN: &str = "free";
const INVITE_TOKEN_BYTES: usize = 32;

#[derive(Clone)]
pub struct TenantService {
    tenant_repo: Arc<dyn TenantRepository>,
    user_repo: Arc<dyn UserRepository>,
}

/// Slug: minúsculas, dígitos e hífens, sem hífen nas pontas.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

impl TenantService {
    pub fn new(tenant_repo: Arc<dyn TenantRepository>, user_repo: Arc<dyn UserRepository>) -> Self {
        Self {
            tenant_repo,
            user_repo,
        }
    }

    /// A verificação que decide o acesso: sem vínculo => Forbidden.
    /// Nunca revelamos se o tenant existe para quem não é membro.
    pub async fn resolve(&self, user_id: Uuid, tenant_id: Uuid) -> Result<AuthContext, AppError> {
        let membership = self
            .tenant_repo
            .find_membership(tenant_id, user_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(%user_id, %tenant_id, "🚫 Acesso a tenant sem vínculo");
                AppError::Forbidden
            })?;

        Ok(AuthContext::new(
            membership.tenant_id,
            membership.user_id,
            membership.role,
        ))
    }

    /// Cria o tenant e, atomicamente, torna o criador o seu owner.
    pub async fn create_tenant(
        &self,
        owner_id: Uuid,
        name: &str,
        slug: &str,
        plan: Option<&str>,
    ) -> Result<Tenant, AppError> {
        if !is_valid_slug(slug) {
            return Err(AppError::invalid(
                "O slug deve conter apenas letras minúsculas, dígitos e hífens.",
            ));
        }

        let id = Uuid::new_v4();
        let name = name.trim();
        let plan = plan.unwrap_or(DEFAULT_PLAN);
        let audit = NewAuditEntry::new(id, AuditAction::TenantCreated)
            .actor(owner_id)
            .entity(id)
            .metadata(json!({ "name": name, "slug": slug, "plan": plan }));

        let tenant = self
            .tenant_repo
            .create_tenant_with_owner(id, name, slug, plan, owner_id, audit)
            .await?;

        tracing::info!(tenant_id = %tenant.id, "🏢 Tenant criado");
        Ok(tenant)
    }

    /// Adiciona um membro pelo e-mail. E-mail sem cadastro ativo => convite:
    /// usuário pendente e um token de uso único, devolvido só aqui, que o
    /// convidado apresenta no registro.
    pub async fn add_member(
        &self,
        ctx: &AuthContext,
        email: &str,
        role: Role,
    ) -> Result<MemberAdded, AppError> {
        ensure_can_assign(ctx, role)?;

        let email = normalize_email(email);
        let invite_token = random_hex(INVITE_TOKEN_BYTES);
        let invite_hash = hash_secret(&invite_token);

        let (user, invited) = match self.user_repo.find_by_email(&email).await? {
            Some(user) => {
                if self
                    .tenant_repo
                    .find_membership(ctx.tenant_id(), user.id)
                    .await?
                    .is_some()
                {
                    return Err(AppError::Conflict("Este usuário já é membro do tenant.".into()));
                }
                match user.status {
                    UserStatus::Active => (user, false),
                    // Ainda pendente: novo convite, o token anterior deixa de valer
                    UserStatus::Pending => match self.user_repo.reissue_invite(user.id, &invite_hash).await? {
                        Some(user) => (user, true),
                        None => (user, false),
                    },
                }
            }
            None => (self.user_repo.invite_user(&email, &invite_hash).await?, true),
        };

        let audit = NewAuditEntry::new(ctx.tenant_id(), AuditAction::MemberAdded)
            .actor(ctx.user_id())
            .entity(user.id)
            .metadata(json!({ "role": role, "invited": invited }));

        let membership = self
            .tenant_repo
            .add_member(ctx.tenant_id(), user.id, role, audit)
            .await?;

        Ok(MemberAdded {
            membership,
            invite_token: invited.then_some(invite_token),
        })
    }

    pub async fn update_member_role(
        &self,
        ctx: &AuthContext,
        user_id: Uuid,
        role: Role,
    ) -> Result<Membership, AppError> {
        let current = self.member_or_not_found(ctx, user_id).await?;

        ensure_can_assign(ctx, current.role)?;
        ensure_can_assign(ctx, role)?;

        if current.role == Role::Owner && role != Role::Owner {
            self.ensure_not_last_owner(ctx.tenant_id()).await?;
        }

        let audit = NewAuditEntry::new(ctx.tenant_id(), AuditAction::MemberRoleChanged)
            .actor(ctx.user_id())
            .entity(user_id)
            .metadata(json!({ "before": current.role, "after": role }));

        let updated = self
            .tenant_repo
            .update_member_role(ctx.tenant_id(), user_id, role, audit)
            .await?
            .ok_or(AppError::NotFound("Membro"))?;

        tracing::info!(
            tenant_id = %ctx.tenant_id(),
            %user_id,
            before = current.role.as_str(),
            after = role.as_str(),
            "🔑 Cargo de membro alterado"
        );
        Ok(updated)
    }

    pub async fn remove_member(&self, ctx: &AuthContext, user_id: Uuid) -> Result<(), AppError> {
        let current = self.member_or_not_found(ctx, user_id).await?;

        ensure_can_assign(ctx, current.role)?;
        if current.role == Role::Owner {
            self.ensure_not_last_owner(ctx.tenant_id()).await?;
        }

        let audit = NewAuditEntry::new(ctx.tenant_id(), AuditAction::MemberRemoved)
            .actor(ctx.user_id())
            .entity(user_id)
            .metadata(json!({ "role": current.role }));

        if !self
            .tenant_repo
            .remove_member(ctx.tenant_id(), user_id, audit)
            .await?
        {
            return Err(AppError::NotFound("Membro"));
        }

        Ok(())
    }

    async fn member_or_not_found(
        &self,
        ctx: &AuthContext,
        user_id: Uuid,
    ) -> Result<Membership, AppError> {
        self.tenant_repo
            .find_membership(ctx.tenant_id(), user_id)
            .await?
            .ok_or(AppError::NotFound("Membro"))
    }

    async fn ensure_not_last_owner(&self, tenant_id: Uuid) -> Result<(), AppError> {
        if self.tenant_repo.count_owners(tenant_id).await? <= 1 {
            return Err(AppError::invalid("O tenant precisa de ao menos um owner."));
        }
        Ok(())
    }
}

// Só um owner concede ou retira o cargo de owner
fn ensure_can_assign(ctx: &AuthContext, role: Role) -> Result<(), AppError> {
    if role == Role::Owner && ctx.role() != Role::Owner {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{AuditRepository, MemoryStore};

    async fn setup() -> (TenantService, MemoryStore, Uuid, Tenant) {
        let store = MemoryStore::new();
        let service = TenantService::new(Arc::new(store.clone()), Arc::new(store.clone()));
        let owner = UserRepository::create_user(&store, "dono@loja.com", "hash", UserStatus::Active)
            .await
            .unwrap();
        let tenant = service
            .create_tenant(owner.id, "Loja", "loja", None)
            .await
            .unwrap();
        (service, store, owner.id, tenant)
    }

    #[test]
    fn slug_rules() {
        assert!(is_valid_slug("minha-loja-2"));
        assert!(!is_valid_slug("Minha Loja"));
        assert!(!is_valid_slug("-loja"));
    }

    #[tokio::test]
    async fn non_member_is_forbidden() {
        let (service, _, _, tenant) = setup().await;
        assert!(matches!(
            service.resolve(Uuid::new_v4(), tenant.id).await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn creator_becomes_owner() {
        let (service, _, owner_id, tenant) = setup().await;
        let ctx = service.resolve(owner_id, tenant.id).await.unwrap();
        assert_eq!(ctx.role(), Role::Owner);
        assert_eq!(tenant.plan, DEFAULT_PLAN);
    }

    #[tokio::test]
    async fn invite_creates_pending_user() {
        let (service, store, owner_id, tenant) = setup().await;
        let ctx = service.resolve(owner_id, tenant.id).await.unwrap();

        let added = service.add_member(&ctx, "novo@loja.com", Role::Staff).await.unwrap();
        let user = UserRepository::find_by_id(&store, added.membership.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.status, UserStatus::Pending);

        // Só o hash fica guardado
        let token = added.invite_token.unwrap();
        assert_eq!(user.invite_token_hash, Some(hash_secret(&token)));
    }

    #[tokio::test]
    async fn active_user_is_added_without_invite_token() {
        let (service, store, owner_id, tenant) = setup().await;
        let ctx = service.resolve(owner_id, tenant.id).await.unwrap();
        UserRepository::create_user(&store, "ativo@loja.com", "hash", UserStatus::Active)
            .await
            .unwrap();

        let added = service.add_member(&ctx, "Ativo@Loja.com", Role::Viewer).await.unwrap();
        assert!(added.invite_token.is_none());
        assert!(matches!(
            service.add_member(&ctx, "ativo@loja.com", Role::Staff).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn reinvite_replaces_previous_token() {
        let (service, store, owner_id, tenant) = setup().await;
        let ctx = service.resolve(owner_id, tenant.id).await.unwrap();
        let first = service.add_member(&ctx, "novo@loja.com", Role::Staff).await.unwrap();

        let other = service
            .create_tenant(owner_id, "Filial", "filial", None)
            .await
            .unwrap();
        let other_ctx = service.resolve(owner_id, other.id).await.unwrap();
        let second = service.add_member(&other_ctx, "novo@loja.com", Role::Viewer).await.unwrap();

        let user = UserRepository::find_by_id(&store, first.membership.user_id)
            .await
            .unwrap()
            .unwrap();
        let (first, second) = (first.invite_token.unwrap(), second.invite_token.unwrap());
        assert_ne!(first, second);
        assert_eq!(user.invite_token_hash, Some(hash_secret(&second)));
    }

    #[tokio::test]
    async fn failed_audit_write_rolls_back_membership_changes() {
        let (service, store, owner_id, tenant) = setup().await;
        let ctx = service.resolve(owner_id, tenant.id).await.unwrap();
        let staff = service.add_member(&ctx, "func@loja.com", Role::Staff).await.unwrap();
        let staff_id = staff.membership.user_id;
        let (_, entries_before) = AuditRepository::list(&store, tenant.id, None, 200, 0).await.unwrap();

        store.set_audit_unavailable(true).await;

        assert!(service.update_member_role(&ctx, staff_id, Role::Admin).await.is_err());
        assert!(service.remove_member(&ctx, staff_id).await.is_err());
        assert!(service.create_tenant(owner_id, "Outra", "outra", None).await.is_err());

        store.set_audit_unavailable(false).await;

        let still = service.resolve(staff_id, tenant.id).await.unwrap();
        assert_eq!(still.role(), Role::Staff);
        let tenants = TenantRepository::list_tenants_for_user(&store, owner_id).await.unwrap();
        assert_eq!(tenants.len(), 1);
        let (_, entries_after) = AuditRepository::list(&store, tenant.id, None, 200, 0).await.unwrap();
        assert_eq!(entries_after, entries_before);

        // O slug não ficou preso por uma criação que falhou
        assert!(service.create_tenant(owner_id, "Outra", "outra", None).await.is_ok());
    }

    #[tokio::test]
    async fn last_owner_cannot_be_demoted_or_removed() {
        let (service, _, owner_id, tenant) = setup().await;
        let ctx = service.resolve(owner_id, tenant.id).await.unwrap();

        assert!(service.update_member_role(&ctx, owner_id, Role::Admin).await.is_err());
        assert!(service.remove_member(&ctx, owner_id).await.is_err());
    }

    #[tokio::test]
    async fn admin_cannot_grant_owner() {
        let (service, _, owner_id, tenant) = setup().await;
        let owner_ctx = service.resolve(owner_id, tenant.id).await.unwrap();
        let admin = service
            .add_member(&owner_ctx, "admin@loja.com", Role::Admin)
            .await
            .unwrap();

        let admin_ctx = service
            .resolve(admin.membership.user_id, tenant.id)
            .await
            .unwrap();
        assert!(matches!(
            service.add_member(&admin_ctx, "outro@loja.com", Role::Owner).await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            service.update_member_role(&admin_ctx, owner_id, Role::Viewer).await,
            Err(AppError::Forbidden)
        ));
    }
}
