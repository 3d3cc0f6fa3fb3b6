use anyhow::{Context, Result};
use medgate_authz::{AuthzConfig, PolicyWatcher, PredicateLibrary, ReloadEvent};
use tokio::sync::broadcast::error::RecvError;

use crate::output::{print_error, print_success};

/// Hot-reload the policy file until Ctrl-C.
pub async fn watch(config: &AuthzConfig) -> Result<()> {
    let path = config
        .policy_path
        .clone()
        .context("watch needs a policy file (--policy or authz.policy_path)")?;

    let store = config.build_store(PredicateLibrary::builtin())?;
    let summary = store.engine().table().summary();
    print_success(&format!(
        "Loaded {} ({} modules, {} rules)",
        path.display(),
        summary.modules,
        summary.rules
    ));

    let handle = PolicyWatcher::new(store.clone(), &path)
        .with_debounce(config.reload.debounce)
        .spawn()?;
    let mut events = handle.subscribe();
    println!("Watching {} (Ctrl-C to stop)", path.display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(ReloadEvent::Reloaded { version, summary }) => print_success(&format!(
                    "Reloaded policy v{version} ({} modules, {} rules)",
                    summary.modules, summary.rules
                )),
                Ok(ReloadEvent::Rejected { error }) => {
                    print_error(&format!("Rejected change, keeping v{}: {error}", store.version()));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Missed reload events");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.shutdown().await;
    Ok(())
}
