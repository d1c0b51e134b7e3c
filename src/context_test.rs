use super::*;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;

use serde_json::json;

use crate::store::{MemoryTokenStore, StoreError};

/// Memory store that counts writes and clears.
#[derive(Default)]
struct RecordingStore {
    inner: MemoryTokenStore,
    saves: Mutex<Vec<String>>,
    clears: AtomicUsize,
}

impl TokenStore for RecordingStore {
    fn save(&self, token: &str) -> Result<(), StoreError> {
        self.saves.lock().unwrap().push(token.to_owned());
        self.inner.save(token)
    }

    fn load(&self) -> Option<String> {
        self.inner.load()
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear()
    }
}

/// Store whose writes always fail.
struct BrokenStore;

impl TokenStore for BrokenStore {
    fn save(&self, _token: &str) -> Result<(), StoreError> {
        Err(StoreError::Io { path: "/dev/full".into(), source: std::io::Error::other("disk full") })
    }

    fn load(&self) -> Option<String> {
        None
    }

    fn clear(&self) -> Result<(), StoreError> {
        Err(StoreError::Io { path: "/dev/full".into(), source: std::io::Error::other("disk full") })
    }
}

fn admin() -> User {
    User { nome: "Admin".into(), nivel_acesso: Some("admin".into()), ..User::default() }
}

fn context() -> (SessionContext, Arc<RecordingStore>) {
    let store = Arc::new(RecordingStore::default());
    (SessionContext::new(store.clone()), store)
}

#[test]
fn login_succeeded_saves_token() {
    let (ctx, store) = context();
    ctx.login_succeeded(admin(), None, "T1".into(), Vec::new());
    assert_eq!(store.load().as_deref(), Some("T1"));
    assert_eq!(ctx.token().as_deref(), Some("T1"));
    assert_eq!(ctx.status(), SessionStatus::Authenticated);
}

#[test]
fn logout_is_idempotent_and_always_clears_store() {
    let (ctx, store) = context();

    ctx.logout();
    let first = ctx.snapshot();
    assert!(!first.is_authenticated());
    assert!(first.user().is_none());
    assert!(first.token().is_none());
    assert_eq!(store.clears.load(Ordering::SeqCst), 1);

    ctx.login_succeeded(admin(), None, "T1".into(), Vec::new());
    ctx.logout();
    ctx.logout();
    let last = ctx.snapshot();
    assert_eq!(last.status(), SessionStatus::Anonymous);
    assert!(last.token().is_none());
    assert!(store.load().is_none());
    assert_eq!(store.clears.load(Ordering::SeqCst), 3);
}

#[test]
fn rotate_token_writes_through() {
    let (ctx, store) = context();
    ctx.login_succeeded(admin(), None, "T1".into(), Vec::new());
    ctx.rotate_token("T2".into()).unwrap();
    assert_eq!(ctx.token().as_deref(), Some("T2"));
    assert_eq!(store.load().as_deref(), Some("T2"));
    assert_eq!(*store.saves.lock().unwrap(), vec!["T1".to_owned(), "T2".to_owned()]);
}

#[test]
fn rotate_token_when_anonymous_does_not_touch_store() {
    let (ctx, store) = context();
    ctx.logout();
    assert_eq!(ctx.rotate_token("T2".into()), Err(SessionError::NotAuthenticated));
    assert!(store.load().is_none());
    assert!(store.saves.lock().unwrap().is_empty());
}

#[test]
fn login_failed_settles_anonymous_and_clears() {
    let (ctx, store) = context();
    store.save("stale").unwrap();
    ctx.begin_loading();
    ctx.login_failed();
    let session = ctx.snapshot();
    assert_eq!(session.status(), SessionStatus::Anonymous);
    assert!(!session.is_loading());
    assert!(store.load().is_none());
}

#[test]
fn permission_checks_use_configured_admin_role() {
    let store = Arc::new(MemoryTokenStore::new());
    let ctx = SessionContext::with_admin_role(store, "diretor");
    ctx.login_succeeded(
        User { nome: "D".into(), nivel_acesso: Some("diretor".into()), ..User::default() },
        None,
        "T1".into(),
        Vec::new(),
    );
    assert_eq!(ctx.admin_role(), "diretor");
    assert!(ctx.has_permission("financeiro"));
    assert!(ctx.has_role("diretor"));
    assert!(ctx.has_any_role(["admin", "diretor"]));
}

#[test]
fn store_failures_are_not_fatal() {
    let ctx = SessionContext::new(Arc::new(BrokenStore));
    ctx.login_succeeded(admin(), None, "T1".into(), Vec::new());
    assert!(ctx.snapshot().is_authenticated());
    ctx.rotate_token("T2".into()).unwrap();
    assert_eq!(ctx.token().as_deref(), Some("T2"));
    ctx.logout();
    assert!(!ctx.snapshot().is_authenticated());
}

#[test]
fn update_user_through_context() {
    let (ctx, _) = context();
    ctx.login_succeeded(admin(), None, "T1".into(), Vec::new());
    ctx.update_user(json!({ "nome": "Chefe" }).as_object().unwrap())
        .unwrap();
    assert_eq!(ctx.snapshot().user().unwrap().nome, "Chefe");
    ctx.update_organization(json!({ "razao_social": "Acme" }).as_object().unwrap())
        .unwrap();
    assert_eq!(ctx.snapshot().organization().unwrap().razao_social, "Acme");
}

#[test]
fn clones_share_state() {
    let (ctx, _) = context();
    let other = ctx.clone();
    ctx.login_succeeded(admin(), None, "T1".into(), Vec::new());
    assert!(other.snapshot().is_authenticated());
    other.logout();
    assert!(!ctx.snapshot().is_authenticated());
}

#[tokio::test]
async fn subscribers_see_transitions() {
    let (ctx, _) = context();
    let mut rx = ctx.subscribe();
    ctx.login_succeeded(admin(), None, "T1".into(), Vec::new());
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_authenticated());

    ctx.logout();
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().status(), SessionStatus::Anonymous);
}

#[tokio::test]
async fn failed_action_does_not_notify_subscribers() {
    let (ctx, _) = context();
    ctx.logout();
    let rx = ctx.subscribe();
    assert!(ctx.rotate_token("T2".into()).is_err());
    assert!(!rx.has_changed().unwrap());
}

#[test]
fn bootstrap_slot_claimed_once() {
    let (ctx, _) = context();
    let clone = ctx.clone();
    assert!(ctx.claim_bootstrap());
    assert!(!clone.claim_bootstrap());
}
