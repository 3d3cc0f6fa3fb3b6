//! Access-control configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [authz]
//! policy_path = "/etc/medgate/policy.toml"
//!
//! [authz.reload]
//! enabled = true
//! debounce = "250ms"
//!
//! [authz.rules]
//! patientCancelBeforeHours = 4
//! ```
//!
//! Without `policy_path` the built-in hospital policy is used.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::AuthzResult;
use crate::context::{AccessContext, Identity, PATIENT_CANCEL_BEFORE_HOURS, RuleParams};
use crate::engine::PolicyEngine;
use crate::error::AuthzError;
use crate::loader::{self, HOSPITAL_MODULES, LoadOptions};
use crate::predicates::PredicateLibrary;
use crate::reload::PolicyStore;

/// Default lead time, in hours, for patient appointment changes.
pub const DEFAULT_PATIENT_CANCEL_BEFORE_HOURS: i64 = 4;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Policy document. `None` selects the built-in policy.
    pub policy_path: Option<PathBuf>,

    /// Reject policy modules that omit a role.
    pub require_all_roles: bool,

    /// Modules the policy document must declare. Empty disables the check.
    pub known_modules: Vec<String>,

    /// Policy file hot reload.
    pub reload: ReloadConfig,

    /// Tunable thresholds handed to predicates through the context.
    pub rules: RuleParams,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            policy_path: None,
            require_all_roles: true,
            known_modules: HOSPITAL_MODULES.iter().map(|m| (*m).to_string()).collect(),
            reload: ReloadConfig::default(),
            rules: RuleParams::new()
                .with(PATIENT_CANCEL_BEFORE_HOURS, DEFAULT_PATIENT_CANCEL_BEFORE_HOURS),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Watch `policy_path` and reload on change.
    pub enabled: bool,

    /// Quiet period before a burst of file events triggers a reload.
    #[serde(with = "humantime_serde")]
    pub debounce: Duration,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            debounce: Duration::from_millis(500),
        }
    }
}

impl AuthzConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthzError::Configuration` if:
    /// - reload is enabled without a policy path
    /// - the reload debounce is zero or longer than a minute
    /// - a known module name is blank
    pub fn validate(&self) -> AuthzResult<()> {
        if self.reload.enabled && self.policy_path.is_none() {
            return Err(AuthzError::configuration(
                "authz.reload.enabled requires authz.policy_path",
            ));
        }
        if self.reload.debounce.is_zero() || self.reload.debounce > Duration::from_secs(60) {
            return Err(AuthzError::configuration(format!(
                "authz.reload.debounce must be between 1ms and 60s, got {:?}",
                self.reload.debounce
            )));
        }
        if self.known_modules.iter().any(|m| m.trim().is_empty()) {
            return Err(AuthzError::configuration(
                "authz.known_modules must not contain blank names",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            require_all_roles: self.require_all_roles,
            known_modules: self.known_modules.clone(),
        }
    }

    /// Compile the configured policy into an engine.
    pub fn build_engine(&self, library: PredicateLibrary) -> AuthzResult<PolicyEngine> {
        let table = match &self.policy_path {
            Some(path) => loader::load_file(path, &library, &self.load_options())?,
            None => loader::builtin_table(&library)?,
        };
        Ok(PolicyEngine::new(Arc::new(table), Arc::new(library)))
    }

    /// Compile the configured policy into a reloadable store.
    pub fn build_store(&self, library: PredicateLibrary) -> AuthzResult<Arc<PolicyStore>> {
        let engine = self.build_engine(library)?;
        Ok(Arc::new(PolicyStore::new(engine, self.load_options())))
    }

    /// Context for `identity` carrying the configured rule parameters.
    #[must_use]
    pub fn context_for(&self, identity: &Identity) -> AccessContext {
        AccessContext::for_identity(identity, self.rules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, Role, Scope};

    #[test]
    fn test_default_config() {
        let config = AuthzConfig::default();
        assert!(config.policy_path.is_none());
        assert!(config.require_all_roles);
        assert_eq!(config.known_modules.len(), HOSPITAL_MODULES.len());
        assert!(!config.reload.enabled);
        assert_eq!(config.reload.debounce, Duration::from_millis(500));
        assert_eq!(
            config.rules.get_i64(PATIENT_CANCEL_BEFORE_HOURS),
            Some(DEFAULT_PATIENT_CANCEL_BEFORE_HOURS)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_toml() {
        let config: AuthzConfig = toml::from_str(
            r#"
policy_path = "policy.toml"
known_modules = []

[reload]
enabled = true
debounce = "250ms"

[rules]
patientCancelBeforeHours = 12
"#,
        )
        .unwrap();
        assert_eq!(config.policy_path, Some(PathBuf::from("policy.toml")));
        assert!(config.known_modules.is_empty());
        assert_eq!(config.reload.debounce, Duration::from_millis(250));
        assert_eq!(config.rules.get_f64(PATIENT_CANCEL_BEFORE_HOURS), Some(12.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_reload_without_path() {
        let config = AuthzConfig {
            reload: ReloadConfig {
                enabled: true,
                ..ReloadConfig::default()
            },
            ..AuthzConfig::default()
        };
        assert!(matches!(config.validate(), Err(AuthzError::Configuration { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_debounce() {
        let mut config = AuthzConfig::default();
        config.reload.debounce = Duration::ZERO;
        assert!(config.validate().is_err());
        config.reload.debounce = Duration::from_secs(120);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_build_engine_from_builtin_policy() {
        let engine = AuthzConfig::default()
            .build_engine(PredicateLibrary::builtin())
            .unwrap();
        assert_eq!(engine.scope(Role::Admin, "billing", Action::Delete), Scope::Any);
    }

    #[test]
    fn test_build_engine_from_missing_file() {
        let config = AuthzConfig {
            policy_path: Some(PathBuf::from("/nonexistent/medgate/policy.toml")),
            ..AuthzConfig::default()
        };
        let err = config.build_engine(PredicateLibrary::builtin()).unwrap_err();
        assert!(matches!(err, AuthzError::Io { .. }));
    }

    #[test]
    fn test_context_for_identity() {
        let config = AuthzConfig::default();
        let identity = Identity::new(Role::Patient, 10).with_patient_id(7);
        let context = config.context_for(&identity);
        assert_eq!(context.user_id(), 10);
        assert_eq!(context.patient_id(), Some(7));
        assert!(context.rules().contains(PATIENT_CANCEL_BEFORE_HOURS));
    }
}
