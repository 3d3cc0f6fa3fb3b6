use std::fs;
use std::sync::Arc;
use std::time::Duration;

use medgate_authz::loader::{self, BUILTIN_POLICY};
use medgate_authz::prelude::*;
use medgate_authz::reload::ReloadEvent;
use tokio::time::timeout;

fn store(path: &std::path::Path) -> Arc<PolicyStore> {
    let config = AuthzConfig {
        policy_path: Some(path.to_path_buf()),
        ..AuthzConfig::default()
    };
    config.build_store(PredicateLibrary::builtin()).unwrap()
}

/// The built-in policy with drivers no longer able to see ambulances.
fn restricted_policy() -> String {
    BUILTIN_POLICY.replace(
        "[modules.ambulances.roles.driver]\nread = \"any\"\nupdate = \"own\"",
        "[modules.ambulances.roles.driver]",
    )
}

#[test]
fn restricted_policy_differs_from_builtin() {
    let library = PredicateLibrary::builtin();
    let table = loader::load_str(&restricted_policy(), &library, &LoadOptions::hospital()).unwrap();
    assert_eq!(table.scope("ambulances", Role::Driver, Action::Read), Scope::None);
}

#[tokio::test]
async fn file_change_swaps_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.toml");
    fs::write(&path, BUILTIN_POLICY).unwrap();

    let store = store(&path);
    let handle = PolicyWatcher::new(store.clone(), &path)
        .with_debounce(Duration::from_millis(100))
        .spawn()
        .unwrap();
    let mut events = handle.subscribe();

    // Give watcher time to start
    tokio::time::sleep(Duration::from_millis(300)).await;

    let before = store.engine();
    assert_eq!(before.scope(Role::Driver, "ambulances", Action::Read), Scope::Any);

    fs::write(&path, restricted_policy()).unwrap();

    let event = timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("timeout waiting for reload")
        .unwrap();
    assert!(matches!(event, ReloadEvent::Reloaded { version: 1, .. }));

    assert_eq!(store.engine().scope(Role::Driver, "ambulances", Action::Read), Scope::None);
    // The earlier snapshot is unchanged.
    assert_eq!(before.scope(Role::Driver, "ambulances", Action::Read), Scope::Any);

    handle.shutdown().await;
}

#[tokio::test]
async fn broken_file_keeps_previous_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.toml");
    fs::write(&path, BUILTIN_POLICY).unwrap();

    let store = store(&path);
    let handle = PolicyWatcher::new(store.clone(), &path)
        .with_debounce(Duration::from_millis(100))
        .spawn()
        .unwrap();
    let mut events = handle.subscribe();

    tokio::time::sleep(Duration::from_millis(300)).await;

    // Drop a role from a module: the registry check rejects the document.
    let broken = BUILTIN_POLICY.replace("[modules.ambulances.roles.patient]", "");
    fs::write(&path, broken).unwrap();

    let event = timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("timeout waiting for reload")
        .unwrap();
    match event {
        ReloadEvent::Rejected { error } => assert!(error.contains("patient"), "{error}"),
        other => panic!("unexpected event: {other:?}"),
    }

    assert_eq!(store.version(), 0);
    assert_eq!(store.engine().scope(Role::Patient, "ambulances", Action::Read), Scope::None);
    assert_eq!(store.engine().scope(Role::Driver, "ambulances", Action::Read), Scope::Any);

    handle.shutdown().await;
}
