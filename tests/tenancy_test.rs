//! Resolução de tenant, cargos e gestão de membros.

use axum::{
    http::{Method, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use factory_backend::{
    middleware::rbac::{Authorized, RoleGuard},
    models::tenancy::Role,
    services::rbac_service::RoleRequirement,
};

mod common;
use common::{bearer, member, owner_with_tenant, TestApp};

async fn user_id(app: &TestApp, token: &str) -> Uuid {
    let (status, me) = app
        .request(Method::GET, "/api/users/me", &[bearer(token)], None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(me.get("passwordHash").is_none());
    me["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn staff_is_forbidden_until_promoted_to_admin() {
    let app = TestApp::new();
    let (owner, tenant) = owner_with_tenant(&app, "loja-promo").await;
    let staff = app.register("func@loja-promo.com").await;
    app.add_member(&owner, tenant, "func@loja-promo.com", "staff").await;

    let staff_headers = member(&staff, tenant);
    let create = || {
        app.request(
            Method::POST,
            "/api/api-keys",
            &staff_headers,
            Some(json!({ "name": "ERP", "scopes": ["read"] })),
        )
    };

    let (status, body) = create().await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let staff_id = user_id(&app, &staff).await;
    let (status, body) = app
        .request(
            Method::PATCH,
            &format!("/api/tenants/members/{staff_id}"),
            &member(&owner, tenant),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["role"], "admin");

    let (status, _) = create().await;
    assert_eq!(status, StatusCode::CREATED);

    let changes = app.audit_actions(&owner, tenant, "member.role_changed").await;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0]["metadata"], json!({ "before": "staff", "after": "admin" }));
}

#[tokio::test]
async fn non_member_is_forbidden_even_for_an_existing_tenant() {
    let app = TestApp::new();
    let (_, tenant) = owner_with_tenant(&app, "loja-fechada").await;
    let outsider = app.register("curioso@exemplo.com").await;

    let (status, body) = app
        .request(Method::GET, "/api/api-keys", &member(&outsider, tenant), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    // Tenant inexistente responde igual
    let (status, _) = app
        .request(Method::GET, "/api/api-keys", &member(&outsider, Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn tenant_header_is_required_and_validated() {
    let app = TestApp::new();
    let (owner, _) = owner_with_tenant(&app, "loja-header").await;

    let (status, body) = app
        .request(Method::GET, "/api/api-keys", &[bearer(&owner)], None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = app
        .request(
            Method::GET,
            "/api/api-keys",
            &[bearer(&owner), ("x-tenant-id", "loja-header".to_string())],
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn viewer_reads_but_cannot_manage() {
    let app = TestApp::new();
    let (owner, tenant) = owner_with_tenant(&app, "loja-viewer").await;
    let viewer = app.register("leitor@loja-viewer.com").await;
    app.add_member(&owner, tenant, "leitor@loja-viewer.com", "viewer").await;

    let (status, _) = app
        .request(Method::GET, "/api/audit", &member(&viewer, tenant), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(Method::GET, "/api/preview", &member(&viewer, tenant), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn the_last_owner_cannot_be_demoted_or_removed() {
    let app = TestApp::new();
    let (owner, tenant) = owner_with_tenant(&app, "loja-dono").await;
    let owner_id = user_id(&app, &owner).await;
    let uri = format!("/api/tenants/members/{owner_id}");

    let (status, body) = app
        .request(Method::PATCH, &uri, &member(&owner, tenant), Some(json!({ "role": "admin" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = app
        .request(Method::DELETE, &uri, &member(&owner, tenant), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Com um segundo owner, o primeiro pode sair
    app.register("socio@loja-dono.com").await;
    app.add_member(&owner, tenant, "socio@loja-dono.com", "owner").await;
    let (status, _) = app
        .request(Method::DELETE, &uri, &member(&owner, tenant), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn only_owners_hand_out_the_owner_role() {
    let app = TestApp::new();
    let (owner, tenant) = owner_with_tenant(&app, "loja-admin").await;
    let admin = app.register("gerente@loja-admin.com").await;
    app.add_member(&owner, tenant, "gerente@loja-admin.com", "admin").await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/tenants/members",
            &member(&admin, tenant),
            Some(json!({ "email": "novo@loja-admin.com", "role": "owner" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/tenants/members",
            &member(&admin, tenant),
            Some(json!({ "email": "novo@loja-admin.com", "role": "staff" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

async fn register_with_invite(app: &TestApp, email: &str, invite_token: Option<&str>) -> (StatusCode, Value) {
    app.request(
        Method::POST,
        "/api/auth/register",
        &[],
        Some(json!({ "email": email, "password": "senha-forte-123", "inviteToken": invite_token })),
    )
    .await
}

#[tokio::test]
async fn invited_user_activates_with_the_invite_token_and_sees_the_tenant() {
    let app = TestApp::new();
    let (owner, tenant) = owner_with_tenant(&app, "loja-convite").await;
    let added = app
        .add_member(&owner, tenant, "Convidado@Loja-Convite.com", "staff")
        .await;
    let invite_token = added["inviteToken"].as_str().unwrap().to_string();

    // Convite pendente não faz login
    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/login",
            &[],
            Some(json!({ "email": "convidado@loja-convite.com", "password": "qualquer-coisa" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) =
        register_with_invite(&app, "convidado@loja-convite.com", Some(&invite_token)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let invited = body["token"].as_str().unwrap();

    let (status, tenants) = app
        .request(Method::GET, "/api/users/me/tenants", &[bearer(invited)], None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tenants[0]["id"], json!(tenant));
    assert_eq!(tenants[0]["role"], "staff");

    // O token é de uso único; e o e-mail, já ativo, é conflito
    let (status, _) =
        register_with_invite(&app, "convidado@loja-convite.com", Some(&invite_token)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn invite_cannot_be_claimed_by_knowing_the_email() {
    let app = TestApp::new();
    let (owner, tenant) = owner_with_tenant(&app, "loja-alvo").await;
    let added = app.add_member(&owner, tenant, "admin-novo@loja-alvo.com", "admin").await;
    assert!(added["inviteToken"].is_string());

    for guess in [None, Some(""), Some("token-chutado")] {
        let (status, body) = register_with_invite(&app, "admin-novo@loja-alvo.com", guess).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.get("token").is_none());
    }

    // Ninguém virou membro ativo: o convite continua pendente
    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/login",
            &[],
            Some(json!({ "email": "admin-novo@loja-alvo.com", "password": "senha-forte-123" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn members_with_an_account_get_no_invite_token() {
    let app = TestApp::new();
    let (owner, tenant) = owner_with_tenant(&app, "loja-conta").await;
    app.register("ativo@loja-conta.com").await;

    let added = app.add_member(&owner, tenant, "ativo@loja-conta.com", "viewer").await;
    assert_eq!(added["role"], "viewer");
    assert!(added.get("inviteToken").is_none());
}

struct StaffDesk;
impl RoleGuard for StaffDesk {
    fn requirement() -> RoleRequirement {
        RoleRequirement::OneOf(&[Role::Staff])
    }
}

async fn staff_desk(Authorized(ctx, _): Authorized<StaffDesk>) -> Json<Value> {
    Json(json!({ "role": ctx.role() }))
}

#[tokio::test]
async fn explicit_role_list_is_applied_verbatim() {
    let app = TestApp::new();
    let (owner, tenant) = owner_with_tenant(&app, "loja-balcao").await;
    let staff = app.register("balcao@loja-balcao.com").await;
    app.add_member(&owner, tenant, "balcao@loja-balcao.com", "staff").await;
    let admin = app.register("gerente@loja-balcao.com").await;
    app.add_member(&owner, tenant, "gerente@loja-balcao.com", "admin").await;

    let desk = TestApp {
        router: Router::new()
            .route("/balcao", get(staff_desk))
            .with_state(app.state.clone()),
        state: app.state.clone(),
    };

    let (status, body) = desk
        .request(Method::GET, "/balcao", &member(&staff, tenant), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "staff");

    // Admin e owner passariam pela ordem de cargos, mas não estão na lista
    for token in [&admin, &owner] {
        let (status, body) = desk
            .request(Method::GET, "/balcao", &member(token, tenant), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");
    }

    // Sem sessão ainda é 401, antes de qualquer decisão de cargo
    let (status, _) = desk
        .request(Method::GET, "/balcao", &[common::tenant_header(tenant)], None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn connector_secrets_are_limited_to_account_admins() {
    let app = TestApp::new();
    let (owner, tenant) = owner_with_tenant(&app, "loja-pagamento").await;
    let staff = app.register("func@loja-pagamento.com").await;
    app.add_member(&owner, tenant, "func@loja-pagamento.com", "staff").await;

    let store = |token: &str| {
        let headers = member(token, tenant);
        let app = &app;
        async move {
            app.request(
                Method::PUT,
                "/api/connectors/stripe/secret",
                &headers,
                Some(json!({ "secret": "sk_live_123" })),
            )
            .await
            .0
        }
    };

    assert_eq!(store(&staff).await, StatusCode::FORBIDDEN);
    assert_eq!(store(&owner).await, StatusCode::OK);
}

#[tokio::test]
async fn login_issues_a_working_session() {
    let app = TestApp::new();
    app.register("login@exemplo.com").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/login",
            &[],
            Some(json!({ "email": "LOGIN@exemplo.com", "password": "senha-forte-123" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap();

    let (status, _) = app
        .request(Method::GET, "/api/users/me", &[bearer(token)], None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/login",
            &[],
            Some(json!({ "email": "login@exemplo.com", "password": "senha-errada" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn duplicate_slug_is_a_conflict() {
    let app = TestApp::new();
    let (owner, _) = owner_with_tenant(&app, "loja-unica").await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/tenants",
            &[bearer(&owner)],
            Some(json!({ "name": "Outra", "slug": "loja-unica" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
