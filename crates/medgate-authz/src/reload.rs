//! Atomic policy replacement and file watching.
//!
//! [`PolicyStore`] holds the live [`PolicyEngine`] behind an [`ArcSwap`].
//! Readers take a snapshot with [`PolicyStore::engine`] and keep it for the
//! whole request, so a decision never mixes two policy versions. A reload
//! compiles and validates the new document first and swaps only on success;
//! a broken file leaves the running policy in place.
//!
//! [`PolicyWatcher`] drives reloads from file changes:
//!
//! ```ignore
//! let store = Arc::new(PolicyStore::new(engine, LoadOptions::hospital()));
//! let handle = PolicyWatcher::new(store.clone(), "policy.toml")
//!     .with_debounce(Duration::from_millis(250))
//!     .spawn()?;
//!
//! let mut events = handle.subscribe();
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::{RecursiveMode, Watcher};
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::AuthzResult;
use crate::engine::PolicyEngine;
use crate::error::AuthzError;
use crate::loader::{self, LoadOptions};
use crate::policy::PolicySummary;

// =============================================================================
// Policy Store
// =============================================================================

/// Holds the live engine and replaces it as a whole.
pub struct PolicyStore {
    current: ArcSwap<PolicyEngine>,
    options: LoadOptions,
    version: AtomicU64,
}

impl PolicyStore {
    /// Create a store serving `engine`. `options` validate later reloads.
    #[must_use]
    pub fn new(engine: PolicyEngine, options: LoadOptions) -> Self {
        Self {
            current: ArcSwap::from_pointee(engine),
            options,
            version: AtomicU64::new(0),
        }
    }

    /// Snapshot of the live engine.
    #[must_use]
    pub fn engine(&self) -> Arc<PolicyEngine> {
        self.current.load_full()
    }

    /// Swap in `engine`. Snapshots taken earlier are unaffected.
    pub fn replace(&self, engine: PolicyEngine) -> u64 {
        self.current.store(Arc::new(engine));
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Reload from `path`, keeping the current engine if the file is invalid.
    ///
    /// Returns the version assigned to the new engine.
    pub fn reload_from_file(&self, path: &Path) -> AuthzResult<(u64, PolicySummary)> {
        let current = self.engine();
        let table = match loader::load_file(path, current.predicates(), &self.options) {
            Ok(table) => table,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Policy reload rejected, keeping current policy"
                );
                return Err(e);
            }
        };

        let summary = table.summary();
        let version = self.replace(current.with_table(table));
        info!(
            path = %path.display(),
            version,
            modules = summary.modules,
            rules = summary.rules,
            "Policy reloaded"
        );
        Ok((version, summary))
    }

    /// Number of successful swaps since creation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn options(&self) -> &LoadOptions {
        &self.options
    }
}

impl std::fmt::Debug for PolicyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyStore")
            .field("version", &self.version())
            .field("modules", &self.engine().table().modules())
            .finish()
    }
}

// =============================================================================
// Policy Watcher
// =============================================================================

/// Outcome of a reload triggered by the watcher.
#[derive(Debug, Clone, PartialEq)]
pub enum ReloadEvent {
    /// The new policy is live.
    Reloaded { version: u64, summary: PolicySummary },
    /// The file was rejected; the previous policy stays live.
    Rejected { error: String },
}

/// Reloads a [`PolicyStore`] whenever its policy file changes.
#[derive(Debug, Clone)]
pub struct PolicyWatcher {
    store: Arc<PolicyStore>,
    path: PathBuf,
    debounce: Duration,
}

impl PolicyWatcher {
    #[must_use]
    pub fn new(store: Arc<PolicyStore>, path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            path: path.into(),
            debounce: Duration::from_millis(500),
        }
    }

    /// Set debounce duration
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start watching. Must be called within a tokio runtime.
    ///
    /// The file's parent directory is watched so that editors replacing the
    /// file by rename are still observed.
    pub fn spawn(self) -> AuthzResult<WatchHandle> {
        let watch_dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<DebounceEventResult>();
        let mut debouncer = new_debouncer(self.debounce, move |result: DebounceEventResult| {
            let _ = notify_tx.send(result);
        })
        .map_err(|e| AuthzError::watcher(format!("failed to create file watcher: {e}")))?;

        debouncer
            .watcher()
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| {
                AuthzError::watcher(format!("failed to watch `{}`: {e}", watch_dir.display()))
            })?;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let (events_tx, _) = broadcast::channel(16);
        let events = events_tx.clone();
        let Self { store, path, .. } = self;

        info!(path = %path.display(), "Watching policy file");

        let task = tokio::spawn(async move {
            // Dropping the debouncer stops the notify thread.
            let _debouncer = debouncer;
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        info!("Policy watcher shutting down");
                        break;
                    }
                    received = notify_rx.recv() => {
                        let Some(result) = received else {
                            break;
                        };
                        match result {
                            Ok(batch) => {
                                let touched = batch
                                    .iter()
                                    .any(|event| event.path.file_name() == path.file_name());
                                if !touched {
                                    continue;
                                }
                                debug!(path = %path.display(), "Policy file changed");
                                let event = match store.reload_from_file(&path) {
                                    Ok((version, summary)) => {
                                        ReloadEvent::Reloaded { version, summary }
                                    }
                                    Err(e) => ReloadEvent::Rejected {
                                        error: e.to_string(),
                                    },
                                };
                                let _ = events_tx.send(event);
                            }
                            Err(e) => {
                                error!(error = %e, "Policy watcher error");
                            }
                        }
                    }
                }
            }
        });

        Ok(WatchHandle {
            task,
            shutdown: shutdown_tx,
            events,
        })
    }
}

/// Running watcher.
pub struct WatchHandle {
    task: tokio::task::JoinHandle<()>,
    shutdown: oneshot::Sender<()>,
    events: broadcast::Sender<ReloadEvent>,
}

impl WatchHandle {
    /// Receive reload outcomes from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.events.subscribe()
    }

    /// Stop the watcher and wait for its task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }
}
