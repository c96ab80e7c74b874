//! Links de demonstração: criação, validação pública e revogação.

use axum::http::{Method, StatusCode};
use serde_json::json;

mod common;
use common::{member, owner_with_tenant, TestApp};

async fn create_preview(app: &TestApp, token: &str, tenant: uuid::Uuid, role: &str) -> serde_json::Value {
    let (status, body) = app
        .request(
            Method::POST,
            "/api/preview/create",
            &member(token, tenant),
            Some(json!({ "role": role })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn customer_preview_cannot_modify_data_or_reach_outside() {
    let app = TestApp::new();
    let (owner, tenant) = owner_with_tenant(&app, "loja-demo").await;
    let created = create_preview(&app, &owner, tenant, "customer").await;
    let token = created["token"].as_str().unwrap();
    assert_eq!(
        created["shareUrl"],
        format!("https://demo.example.com/preview?token={token}")
    );

    let (status, body) = app
        .request(Method::GET, &format!("/api/preview/validate?token={token}"), &[], None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "customer");
    assert_eq!(body["tenantId"], json!(tenant));
    assert_eq!(body["remainingHours"], 24);
    assert_eq!(
        body["restrictions"],
        json!({
            "canModifyData": false,
            "canSendEmails": false,
            "canSendSms": false,
            "canProcessPayments": false,
        })
    );
}

#[tokio::test]
async fn staff_preview_still_cannot_send_emails() {
    let app = TestApp::new();
    let (owner, tenant) = owner_with_tenant(&app, "loja-staff").await;
    let created = create_preview(&app, &owner, tenant, "staff").await;

    let (_, body) = app
        .request(
            Method::GET,
            &format!("/api/preview/validate?token={}", created["token"].as_str().unwrap()),
            &[],
            None,
        )
        .await;
    assert_eq!(body["restrictions"]["canModifyData"], true);
    assert_eq!(body["restrictions"]["canSendEmails"], false);
}

#[tokio::test]
async fn unknown_and_revoked_tokens_are_told_apart() {
    let app = TestApp::new();
    let (owner, tenant) = owner_with_tenant(&app, "loja-revoga").await;
    let created = create_preview(&app, &owner, tenant, "admin").await;
    let id = created["id"].as_str().unwrap();
    let validate = format!("/api/preview/validate?token={}", created["token"].as_str().unwrap());

    let (status, body) = app
        .request(Method::GET, "/api/preview/validate?token=desconhecido", &[], None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let revoke = format!("/api/preview/revoke/{id}");
    let (status, body) = app
        .request(Method::POST, &revoke, &member(&owner, tenant), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "revoked");

    let (status, body) = app.request(Method::GET, &validate, &[], None).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["code"], "PREVIEW_REVOKED");

    let (status, _) = app
        .request(Method::POST, &revoke, &member(&owner, tenant), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn views_are_audited_without_an_actor() {
    let app = TestApp::new();
    let (owner, tenant) = owner_with_tenant(&app, "loja-visita").await;
    let created = create_preview(&app, &owner, tenant, "customer").await;
    let uri = format!("/api/preview/validate?token={}", created["token"].as_str().unwrap());

    app.request(Method::GET, &uri, &[], None).await;
    app.request(Method::GET, &uri, &[], None).await;

    let views = app.audit_actions(&owner, tenant, "preview.viewed").await;
    assert_eq!(views.len(), 2);
    assert!(views.iter().all(|v| v["actorUserId"].is_null()));

    // O token não vai para a auditoria de criação
    let created_entries = app.audit_actions(&owner, tenant, "preview.created").await;
    assert!(!serde_json::to_string(&created_entries)
        .unwrap()
        .contains(created["token"].as_str().unwrap()));
}

#[tokio::test]
async fn list_and_delete_are_scoped_to_the_tenant() {
    let app = TestApp::new();
    let (owner_a, tenant_a) = owner_with_tenant(&app, "loja-pa").await;
    let (owner_b, tenant_b) = owner_with_tenant(&app, "loja-pb").await;
    let created = create_preview(&app, &owner_a, tenant_a, "staff").await;
    let id = created["id"].as_str().unwrap();

    let (_, list_b) = app
        .request(Method::GET, "/api/preview", &member(&owner_b, tenant_b), None)
        .await;
    assert_eq!(list_b, json!([]));

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/preview/{id}"), &member(&owner_b, tenant_b), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list_a) = app
        .request(Method::GET, "/api/preview", &member(&owner_a, tenant_a), None)
        .await;
    assert_eq!(list_a[0]["id"], id);
    assert_eq!(list_a[0]["status"], "active");
    assert!(list_a[0].get("tokenHash").is_none());

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/preview/{id}"), &member(&owner_a, tenant_a), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
