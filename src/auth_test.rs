use super::*;
use std::sync::atomic::Ordering;

use serde_json::json;

use crate::session::SessionStatus;
use crate::store::TokenStore;
use crate::test_helpers::{MockAuthApi, acme, admin_user, memory_context};
use crate::types::RefreshPayload;

fn admin_payload() -> AuthPayload {
    AuthPayload { token: "T1".into(), user: admin_user(), organization: Some(acme()), permissions: Vec::new() }
}

fn demo_credentials() -> Credentials {
    Credentials { email: "admin@demo.com".into(), password: "demo123".into() }
}

fn service(api: MockAuthApi) -> (AuthService, Arc<MockAuthApi>, Arc<crate::store::MemoryTokenStore>) {
    let (ctx, store) = memory_context();
    let api = Arc::new(api);
    (AuthService::new(ctx, api.clone()), api, store)
}

#[tokio::test]
async fn admin_login_grants_every_permission() {
    let (auth, _, store) = service(MockAuthApi::new().with_login(Ok(admin_payload())));
    let user = auth.login(&demo_credentials()).await.unwrap();
    assert_eq!(user.nome, "Admin");

    let session = auth.context().snapshot();
    assert!(session.is_authenticated());
    assert!(!session.is_loading());
    assert_eq!(session.user().unwrap().nome, "Admin");
    assert!(auth.context().has_permission("financeiro"));
    assert_eq!(store.load().as_deref(), Some("T1"));
}

#[tokio::test]
async fn rejected_login_is_structured_and_anonymous() {
    let (auth, _, store) = service(
        MockAuthApi::new().with_login(Err(ApiError::Unauthorized { message: "Credenciais inválidas".into() })),
    );
    let err = auth.login(&demo_credentials()).await.unwrap_err();
    assert!(matches!(&err, AuthError::Rejected { status: 401, message } if message == "Credenciais inválidas"));
    assert_eq!(err.to_string(), "Credenciais inválidas");

    let session = auth.context().snapshot();
    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert!(!session.is_loading());
    assert!(store.load().is_none());
}

#[tokio::test]
async fn validation_error_is_rejected() {
    let (auth, _, _) = service(
        MockAuthApi::new().with_login(Err(ApiError::Status { status: 422, message: "email obrigatório".into() })),
    );
    let err = auth.login(&demo_credentials()).await.unwrap_err();
    assert!(matches!(err, AuthError::Rejected { status: 422, .. }));
}

#[tokio::test]
async fn server_error_is_not_a_rejection() {
    let (auth, api, _) =
        service(MockAuthApi::new().with_login(Err(ApiError::Status { status: 503, message: "manutenção".into() })));
    let err = auth.login(&demo_credentials()).await.unwrap_err();
    assert!(matches!(err, AuthError::Api(ApiError::Status { status: 503, .. })));
    assert_eq!(api.login_calls.load(Ordering::SeqCst), 1, "failures are not retried");
    assert!(!auth.context().snapshot().is_loading());
}

#[tokio::test]
async fn failed_login_replaces_previous_session() {
    let (auth, _, store) = service(MockAuthApi::new().with_login(Err(ApiError::Network("offline".into()))));
    auth.context()
        .login_succeeded(admin_user(), None, "OLD".into(), Vec::new());
    assert!(auth.login(&demo_credentials()).await.is_err());
    assert!(!auth.context().snapshot().is_authenticated());
    assert!(store.load().is_none());
}

#[tokio::test]
async fn register_authenticates_new_account() {
    let payload = AuthPayload {
        token: "R1".into(),
        user: User { nome: "Nova".into(), nivel_acesso: Some("comprador".into()), ..User::default() },
        organization: Some(acme()),
        permissions: vec!["licitacoes".into()],
    };
    let (auth, api, store) = service(MockAuthApi::new().with_login(Ok(payload)));
    let registration = Registration {
        nome: "Nova".into(),
        email: "nova@acme.com".into(),
        password: "pw".into(),
        razao_social: "Acme".into(),
        cnpj: None,
    };
    let user = auth.register(&registration).await.unwrap();
    assert_eq!(user.nome, "Nova");
    assert_eq!(api.register_calls.load(Ordering::SeqCst), 1);
    assert!(auth.context().has_permission("licitacoes"));
    assert!(!auth.context().has_permission("financeiro"));
    assert_eq!(store.load().as_deref(), Some("R1"));
}

#[tokio::test]
async fn refresh_rotates_token() {
    let (auth, api, store) = service(
        MockAuthApi::new()
            .with_login(Ok(admin_payload()))
            .with_refresh(Ok(RefreshPayload { token: "T2".into() })),
    );
    auth.login(&demo_credentials()).await.unwrap();
    auth.refresh().await.unwrap();
    assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(auth.context().token().as_deref(), Some("T2"));
    assert_eq!(store.load().as_deref(), Some("T2"));
    assert_eq!(auth.context().snapshot().user().unwrap().nome, "Admin");
}

#[tokio::test]
async fn refresh_requires_session_and_sends_nothing() {
    let (auth, api, _) = service(MockAuthApi::new());
    auth.logout();
    let err = auth.refresh().await.unwrap_err();
    assert!(matches!(err, AuthError::Session(SessionError::NotAuthenticated)));
    assert_eq!(api.total_calls(), 0);
}

#[tokio::test]
async fn logout_after_login_clears_everything() {
    let (auth, _, store) = service(MockAuthApi::new().with_login(Ok(admin_payload())));
    auth.login(&demo_credentials()).await.unwrap();
    auth.logout();
    let session = auth.context().snapshot();
    assert!(!session.is_authenticated());
    assert!(session.user().is_none());
    assert!(store.load().is_none());
}

#[tokio::test]
async fn profile_updates_flow_through() {
    let (auth, _, _) = service(MockAuthApi::new().with_login(Ok(admin_payload())));
    auth.login(&demo_credentials()).await.unwrap();
    auth.update_user(json!({ "nome": "Administrador" }).as_object().unwrap())
        .unwrap();
    auth.update_organization(json!({ "cnpj": "12.345.678/0001-90" }).as_object().unwrap())
        .unwrap();
    let session = auth.context().snapshot();
    assert_eq!(session.user().unwrap().nome, "Administrador");
    assert_eq!(session.organization().unwrap().cnpj.as_deref(), Some("12.345.678/0001-90"));
}

#[tokio::test]
async fn profile_update_requires_session() {
    let (auth, _, _) = service(MockAuthApi::new());
    let err = auth
        .update_user(json!({ "nome": "X" }).as_object().unwrap())
        .unwrap_err();
    assert!(matches!(err, AuthError::Session(SessionError::NotAuthenticated)));
}
