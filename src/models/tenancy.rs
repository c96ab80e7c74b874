// src/models/tenancy.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// ---
// 1. Role (O "Cargo" dentro do tenant)
// ---
// Ordem total: viewer < staff < admin < owner. A ordem de declaração
// das variantes É a ordem de privilégio (o derive de Ord depende disso).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "member_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Staff,
    Admin,
    Owner,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Viewer, Role::Staff, Role::Admin, Role::Owner];

    pub fn rank(self) -> u8 {
        match self {
            Role::Viewer => 1,
            Role::Staff => 2,
            Role::Admin => 3,
            Role::Owner => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Staff => "staff",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }
}

// ---
// 2. Tenant (O "Espaço de trabalho")
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: Uuid,
    #[schema(example = "Minha Loja")]
    pub name: String,
    #[schema(example = "minha-loja")]
    pub slug: String,
    #[schema(example = "free")]
    pub plan: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---
// 3. Membership (A "Ponte" Usuário-Tenant, com o cargo)
// ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Resposta de "adicionar membro". `inviteToken` só vem quando o e-mail
/// ainda não tem cadastro ativo, e só nesta resposta: é ele que o convidado
/// apresenta no registro.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemberAdded {
    #[serde(flatten)]
    pub membership: Membership,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_token: Option<String>,
}

// Tenant + o cargo do usuário nele (para "/me/tenants")
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenantMembership {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub tenant: Tenant,
    pub role: Role,
}

// ---
// 4. AuthContext
// ---
/// Quem age, em nome de qual tenant e com qual cargo.
///
/// Produzido uma única vez por requisição pelo `TenantService::resolve`
/// e apenas lido daí em diante. Os campos são privados: não existe forma
/// de "ajustar" o contexto no meio do caminho.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    tenant_id: Uuid,
    user_id: Uuid,
    role: Role,
}

impl AuthContext {
    pub(crate) fn new(tenant_id: Uuid, user_id: Uuid, role: Role) -> Self {
        Self { tenant_id, user_id, role }
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

// ---
// 5. Payloads
// ---
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantPayload {
    #[validate(length(min = 1, max = 120, message = "O nome do tenant é obrigatório."))]
    #[schema(example = "Minha Loja")]
    pub name: String,

    #[validate(length(min = 3, max = 63, message = "O slug deve ter entre 3 e 63 caracteres."))]
    #[schema(example = "minha-loja")]
    pub slug: String,

    #[schema(example = "free")]
    pub plan: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberPayload {
    #[validate(email(message = "O e-mail fornecido é inválido."))]
    #[schema(example = "funcionario@minhaloja.com")]
    pub email: String,

    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRolePayload {
    pub role: Role,
}
