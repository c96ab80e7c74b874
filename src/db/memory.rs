// src/db/memory.rs

//! Implementação em memória de todos os repositórios.
//!
//! Usada nos testes e em desenvolvimento quando `DATABASE_URL` não está
//! definida. Cada operação acontece inteira sob o mesmo lock, o que dá a
//! mesma atomicidade de uma transação: a entrada de auditoria é gravada
//! antes de a mutação ser aplicada e, se falhar, nada muda. As restrições
//! de unicidade do banco (e-mail, slug, (tenant, user), prefixo, hash de
//! token) são reproduzidas aqui.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    common::{crypto::constant_time_eq, error::AppError},
    db::{
        ApiKeyRepository, AuditRepository, ConnectorSecretRepository, PreviewRepository,
        TenantRepository, UserRepository,
    },
    models::{
        api_keys::{ApiKey, ApiKeyStatus, NewApiKey},
        audit::{AuditLogEntry, NewAuditEntry},
        auth::{User, UserStatus},
        connectors::ConnectorSecret,
        preview::{NewPreviewSession, PreviewSession},
        tenancy::{Membership, Role, Tenant, TenantMembership},
    },
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    tenants: HashMap<Uuid, Tenant>,
    members: HashMap<(Uuid, Uuid), Membership>,
    api_keys: HashMap<Uuid, ApiKey>,
    previews: HashMap<Uuid, PreviewSession>,
    audit: Vec<AuditLogEntry>,
    connector_secrets: HashMap<(Uuid, String), ConnectorSecret>,
    audit_unavailable: bool,
}

impl Tables {
    fn append_audit(&mut self, entry: NewAuditEntry) -> Result<AuditLogEntry, AppError> {
        if self.audit_unavailable {
            return Err(anyhow::anyhow!("tabela de auditoria indisponível").into());
        }
        let stored = AuditLogEntry {
            id: Uuid::new_v4(),
            tenant_id: entry.tenant_id,
            actor_user_id: entry.actor_user_id,
            action: entry.action.as_str().to_string(),
            entity_type: entry.action.entity_type().to_string(),
            entity_id: entry.entity_id,
            metadata: entry.metadata,
            created_at: Utc::now(),
        };
        self.audit.push(stored.clone());
        Ok(stored)
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Faz toda gravação de auditoria falhar, como um banco que recusa o
    /// INSERT. Serve para exercitar o rollback das mutações.
    pub async fn set_audit_unavailable(&self, unavailable: bool) {
        self.tables.lock().await.audit_unavailable = unavailable;
    }
}

// ---
// Usuários
// ---
#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.users.get(&id).cloned())
    }

    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        status: UserStatus,
    ) -> Result<User, AppError> {
        let mut t = self.tables.lock().await;
        if t.users.values().any(|u| u.email == email) {
            return Err(AppError::Conflict("Este e-mail já está em uso.".into()));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            status,
            invite_token_hash: None,
            created_at: now,
            updated_at: now,
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn invite_user(&self, email: &str, invite_token_hash: &str) -> Result<User, AppError> {
        let mut t = self.tables.lock().await;
        if t.users.values().any(|u| u.email == email) {
            return Err(AppError::Conflict("Este e-mail já está em uso.".into()));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: String::new(),
            status: UserStatus::Pending,
            invite_token_hash: Some(invite_token_hash.to_string()),
            created_at: now,
            updated_at: now,
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn reissue_invite(&self, id: Uuid, invite_token_hash: &str) -> Result<Option<User>, AppError> {
        let mut t = self.tables.lock().await;
        Ok(t.users
            .get_mut(&id)
            .filter(|u| u.status == UserStatus::Pending)
            .map(|u| {
                u.invite_token_hash = Some(invite_token_hash.to_string());
                u.updated_at = Utc::now();
                u.clone()
            }))
    }

    async fn activate_user(
        &self,
        id: Uuid,
        invite_token_hash: &str,
        password_hash: &str,
    ) -> Result<Option<User>, AppError> {
        let mut t = self.tables.lock().await;
        Ok(t.users
            .get_mut(&id)
            .filter(|u| u.status == UserStatus::Pending)
            .filter(|u| {
                u.invite_token_hash
                    .as_deref()
                    .is_some_and(|stored| constant_time_eq(stored, invite_token_hash))
            })
            .map(|u| {
                u.password_hash = password_hash.to_string();
                u.status = UserStatus::Active;
                u.invite_token_hash = None;
                u.updated_at = Utc::now();
                u.clone()
            }))
    }
}

// ---
// Tenants e vínculos
// ---
#[async_trait]
impl TenantRepository for MemoryStore {
    async fn create_tenant_with_owner(
        &self,
        id: Uuid,
        name: &str,
        slug: &str,
        plan: &str,
        owner_id: Uuid,
        audit: NewAuditEntry,
    ) -> Result<Tenant, AppError> {
        let mut t = self.tables.lock().await;
        if t.tenants.values().any(|x| x.slug == slug) {
            return Err(AppError::Conflict("Já existe um tenant com esse slug.".into()));
        }
        t.append_audit(audit)?;

        let now = Utc::now();
        let tenant = Tenant {
            id,
            name: name.to_string(),
            slug: slug.to_string(),
            plan: plan.to_string(),
            created_at: now,
            updated_at: now,
        };
        t.tenants.insert(tenant.id, tenant.clone());
        t.members.insert(
            (tenant.id, owner_id),
            Membership {
                tenant_id: tenant.id,
                user_id: owner_id,
                role: Role::Owner,
                created_at: now,
            },
        );
        Ok(tenant)
    }

    async fn find_membership(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.members.get(&(tenant_id, user_id)).cloned())
    }

    async fn list_tenants_for_user(&self, user_id: Uuid) -> Result<Vec<TenantMembership>, AppError> {
        let t = self.tables.lock().await;
        let mut tenants: Vec<TenantMembership> = t
            .members
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                t.tenants.get(&m.tenant_id).map(|tenant| TenantMembership {
                    tenant: tenant.clone(),
                    role: m.role,
                })
            })
            .collect();
        tenants.sort_by(|a, b| a.tenant.name.cmp(&b.tenant.name));
        Ok(tenants)
    }

    async fn count_owners(&self, tenant_id: Uuid) -> Result<i64, AppError> {
        let t = self.tables.lock().await;
        Ok(t.members
            .values()
            .filter(|m| m.tenant_id == tenant_id && m.role == Role::Owner)
            .count() as i64)
    }

    async fn add_member(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role: Role,
        audit: NewAuditEntry,
    ) -> Result<Membership, AppError> {
        let mut t = self.tables.lock().await;
        if t.members.contains_key(&(tenant_id, user_id)) {
            return Err(AppError::Conflict("Este usuário já é membro do tenant.".into()));
        }
        t.append_audit(audit)?;

        let membership = Membership {
            tenant_id,
            user_id,
            role,
            created_at: Utc::now(),
        };
        t.members.insert((tenant_id, user_id), membership.clone());
        Ok(membership)
    }

    async fn update_member_role(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        role: Role,
        audit: NewAuditEntry,
    ) -> Result<Option<Membership>, AppError> {
        let mut t = self.tables.lock().await;
        if !t.members.contains_key(&(tenant_id, user_id)) {
            return Ok(None);
        }
        t.append_audit(audit)?;

        Ok(t.members.get_mut(&(tenant_id, user_id)).map(|m| {
            m.role = role;
            m.clone()
        }))
    }

    async fn remove_member(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        audit: NewAuditEntry,
    ) -> Result<bool, AppError> {
        let mut t = self.tables.lock().await;
        if !t.members.contains_key(&(tenant_id, user_id)) {
            return Ok(false);
        }
        t.append_audit(audit)?;

        Ok(t.members.remove(&(tenant_id, user_id)).is_some())
    }
}

// ---
// Chaves de API
// ---
fn prefix_taken(t: &Tables, prefix: &str, except: Option<Uuid>) -> bool {
    t.api_keys
        .values()
        .any(|k| k.key_prefix == prefix && Some(k.id) != except)
}

fn is_active_key(t: &Tables, tenant_id: Uuid, id: Uuid) -> bool {
    t.api_keys
        .get(&id)
        .is_some_and(|k| k.tenant_id == tenant_id && k.status == ApiKeyStatus::Active)
}

fn active_key_mut(t: &mut Tables, tenant_id: Uuid, id: Uuid) -> Option<&mut ApiKey> {
    t.api_keys
        .get_mut(&id)
        .filter(|k| k.tenant_id == tenant_id && k.status == ApiKeyStatus::Active)
}

#[async_trait]
impl ApiKeyRepository for MemoryStore {
    async fn insert(&self, key: NewApiKey, audit: NewAuditEntry) -> Result<ApiKey, AppError> {
        let mut t = self.tables.lock().await;
        if prefix_taken(&t, &key.key_prefix, None) {
            return Err(AppError::Conflict("Prefixo de chave já utilizado.".into()));
        }
        t.append_audit(audit)?;

        let now = Utc::now();
        let stored = ApiKey {
            id: key.id,
            tenant_id: key.tenant_id,
            created_by: key.created_by,
            name: key.name,
            key_prefix: key.key_prefix,
            key_hash: key.key_hash,
            scopes: key.scopes,
            status: ApiKeyStatus::Active,
            expires_at: key.expires_at,
            last_used_at: None,
            last_used_ip: None,
            revoked_at: None,
            created_at: now,
            updated_at: now,
        };
        t.api_keys.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<ApiKey>, AppError> {
        let t = self.tables.lock().await;
        let mut keys: Vec<ApiKey> = t
            .api_keys
            .values()
            .filter(|k| k.tenant_id == tenant_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn find(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<ApiKey>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.api_keys.get(&id).filter(|k| k.tenant_id == tenant_id).cloned())
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKey>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.api_keys.values().find(|k| k.key_prefix == prefix).cloned())
    }

    async fn update_scopes(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        scopes: &[String],
        audit: NewAuditEntry,
    ) -> Result<Option<ApiKey>, AppError> {
        let mut t = self.tables.lock().await;
        if !is_active_key(&t, tenant_id, id) {
            return Ok(None);
        }
        t.append_audit(audit)?;

        Ok(active_key_mut(&mut t, tenant_id, id).map(|k| {
            k.scopes = scopes.to_vec();
            k.updated_at = Utc::now();
            k.clone()
        }))
    }

    async fn rotate(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        new_hash: &str,
        new_prefix: &str,
        audit: NewAuditEntry,
    ) -> Result<Option<ApiKey>, AppError> {
        let mut t = self.tables.lock().await;
        if !is_active_key(&t, tenant_id, id) {
            return Ok(None);
        }
        if prefix_taken(&t, new_prefix, Some(id)) {
            return Err(AppError::Conflict("Prefixo de chave já utilizado.".into()));
        }
        t.append_audit(audit)?;

        Ok(active_key_mut(&mut t, tenant_id, id).map(|k| {
            k.key_hash = new_hash.to_string();
            k.key_prefix = new_prefix.to_string();
            k.last_used_at = None;
            k.last_used_ip = None;
            k.updated_at = Utc::now();
            k.clone()
        }))
    }

    async fn revoke(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
        audit: NewAuditEntry,
    ) -> Result<Option<ApiKey>, AppError> {
        let mut t = self.tables.lock().await;
        if !is_active_key(&t, tenant_id, id) {
            return Ok(None);
        }
        t.append_audit(audit)?;

        Ok(active_key_mut(&mut t, tenant_id, id).map(|k| {
            k.status = ApiKeyStatus::Revoked;
            k.revoked_at = Some(at);
            k.updated_at = at;
            k.clone()
        }))
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid, audit: NewAuditEntry) -> Result<bool, AppError> {
        let mut t = self.tables.lock().await;
        if !t.api_keys.get(&id).is_some_and(|k| k.tenant_id == tenant_id) {
            return Ok(false);
        }
        t.append_audit(audit)?;

        Ok(t.api_keys.remove(&id).is_some())
    }

    async fn touch_last_used(
        &self,
        id: Uuid,
        key_hash: &str,
        at: DateTime<Utc>,
        ip: Option<&str>,
    ) -> Result<(), AppError> {
        let mut t = self.tables.lock().await;
        if let Some(k) = t.api_keys.get_mut(&id).filter(|k| k.key_hash == key_hash) {
            k.last_used_at = Some(at);
            k.last_used_ip = ip.map(str::to_string);
        }
        Ok(())
    }
}

// ---
// Sessões de preview
// ---
#[async_trait]
impl PreviewRepository for MemoryStore {
    async fn insert(
        &self,
        session: NewPreviewSession,
        audit: NewAuditEntry,
    ) -> Result<PreviewSession, AppError> {
        let mut t = self.tables.lock().await;
        if t.previews.values().any(|p| p.token_hash == session.token_hash) {
            return Err(AppError::Conflict("Token de preview já utilizado.".into()));
        }
        t.append_audit(audit)?;

        let stored = PreviewSession {
            id: session.id,
            tenant_id: session.tenant_id,
            created_by: session.created_by,
            token_hash: session.token_hash,
            role: session.role,
            expires_at: session.expires_at,
            revoked: false,
            revoked_at: None,
            created_at: Utc::now(),
        };
        t.previews.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<PreviewSession>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.previews.values().find(|p| p.token_hash == token_hash).cloned())
    }

    async fn find(&self, tenant_id: Uuid, id: Uuid) -> Result<Option<PreviewSession>, AppError> {
        let t = self.tables.lock().await;
        Ok(t.previews.get(&id).filter(|p| p.tenant_id == tenant_id).cloned())
    }

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<PreviewSession>, AppError> {
        let t = self.tables.lock().await;
        let mut sessions: Vec<PreviewSession> = t
            .previews
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn revoke(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        at: DateTime<Utc>,
        audit: NewAuditEntry,
    ) -> Result<Option<PreviewSession>, AppError> {
        let mut t = self.tables.lock().await;
        let revocable = t
            .previews
            .get(&id)
            .is_some_and(|p| p.tenant_id == tenant_id && !p.revoked);
        if !revocable {
            return Ok(None);
        }
        t.append_audit(audit)?;

        Ok(t.previews
            .get_mut(&id)
            .filter(|p| p.tenant_id == tenant_id && !p.revoked)
            .map(|p| {
                p.revoked = true;
                p.revoked_at = Some(at);
                p.clone()
            }))
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid, audit: NewAuditEntry) -> Result<bool, AppError> {
        let mut t = self.tables.lock().await;
        if !t.previews.get(&id).is_some_and(|p| p.tenant_id == tenant_id) {
            return Ok(false);
        }
        t.append_audit(audit)?;

        Ok(t.previews.remove(&id).is_some())
    }
}

// ---
// Auditoria
// ---
#[async_trait]
impl AuditRepository for MemoryStore {
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, AppError> {
        self.tables.lock().await.append_audit(entry)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        action: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<AuditLogEntry>, i64), AppError> {
        let t = self.tables.lock().await;
        // Vec em ordem de inserção; de trás para frente = mais recentes primeiro
        let matching: Vec<&AuditLogEntry> = t
            .audit
            .iter()
            .rev()
            .filter(|e| e.tenant_id == tenant_id)
            .filter(|e| action.is_none_or(|a| e.action == a))
            .collect();
        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((items, total))
    }
}

// ---
// Segredos de conectores
// ---
#[async_trait]
impl ConnectorSecretRepository for MemoryStore {
    async fn upsert(
        &self,
        tenant_id: Uuid,
        provider: &str,
        sealed_secret: &str,
        updated_by: Uuid,
        audit: NewAuditEntry,
    ) -> Result<ConnectorSecret, AppError> {
        let mut t = self.tables.lock().await;
        t.append_audit(audit)?;

        let secret = ConnectorSecret {
            tenant_id,
            provider: provider.to_string(),
            sealed_secret: sealed_secret.to_string(),
            updated_by: Some(updated_by),
            updated_at: Utc::now(),
        };
        t.connector_secrets
            .insert((tenant_id, provider.to_string()), secret.clone());
        Ok(secret)
    }

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<ConnectorSecret>, AppError> {
        let t = self.tables.lock().await;
        let mut secrets: Vec<ConnectorSecret> = t
            .connector_secrets
            .values()
            .filter(|s| s.tenant_id == tenant_id)
            .cloned()
            .collect();
        secrets.sort_by(|a, b| a.provider.cmp(&b.provider));
        Ok(secrets)
    }
}
