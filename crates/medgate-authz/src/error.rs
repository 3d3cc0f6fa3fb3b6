//! Access-control error types.
//!
//! Configuration errors are raised while a policy document is loaded and must
//! abort startup. Request outcomes (`Forbidden`, `Unauthenticated`) are only
//! produced by the enforcement helpers; `PolicyEngine::decide` itself never
//! returns an error.

use std::path::PathBuf;

use crate::types::Role;

/// Errors produced by policy loading and request enforcement.
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// A rule references a predicate that is not registered in the library.
    #[error("Unknown predicate `{predicate}` referenced by {module}/{role}")]
    UnknownPredicate {
        /// Module whose rule carries the reference.
        module: String,
        /// Role whose rule carries the reference.
        role: Role,
        /// The dangling predicate name.
        predicate: String,
    },

    /// A module omits a role. Every module must enumerate every role.
    #[error("Module `{module}` does not define a rule for role `{role}`")]
    MissingRole {
        /// Module missing the entry.
        module: String,
        /// The omitted role.
        role: Role,
    },

    /// A rule grants `own` scope on a module that has no ownership keys.
    #[error("Module `{module}` grants `own` scope to `{role}` but declares no owner keys")]
    OwnershipUndefined {
        /// Module without ownership keys.
        module: String,
        /// Role holding the `own` grant.
        role: Role,
    },

    /// A module name is referenced but not declared in the registry.
    #[error("Unknown module `{module}`")]
    UnknownModule {
        /// The undeclared module name.
        module: String,
    },

    /// The policy document could not be parsed.
    #[error("Policy parse error: {message}")]
    Parse {
        /// Description of the parse failure.
        message: String,
    },

    /// The policy file could not be read.
    #[error("Failed to read policy file `{}`", path.display())]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration values are invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// The policy file watcher failed.
    #[error("Watcher error: {message}")]
    Watcher {
        /// Description of the watcher failure.
        message: String,
    },

    /// The request carries no identity.
    #[error("Unauthenticated: {message}")]
    Unauthenticated {
        /// Description of why no identity is available.
        message: String,
    },

    /// The acting identity may not perform the action.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Machine-readable denial code.
        code: String,
        /// Description of the denial.
        message: String,
    },
}

impl AuthzError {
    /// Creates a new `Parse` error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Watcher` error.
    #[must_use]
    pub fn watcher(message: impl Into<String>) -> Self {
        Self::Watcher {
            message: message.into(),
        }
    }

    /// Creates a new `Unauthenticated` error.
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Forbidden {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates an `UnknownModule` error.
    #[must_use]
    pub fn unknown_module(module: impl Into<String>) -> Self {
        Self::UnknownModule {
            module: module.into(),
        }
    }

    /// Returns `true` for errors raised while loading or validating a policy.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownPredicate { .. }
                | Self::MissingRole { .. }
                | Self::OwnershipUndefined { .. }
                | Self::UnknownModule { .. }
                | Self::Parse { .. }
                | Self::Io { .. }
                | Self::Configuration { .. }
        )
    }

    /// Returns `true` for per-request denial outcomes.
    #[must_use]
    pub fn is_request_error(&self) -> bool {
        matches!(self, Self::Unauthenticated { .. } | Self::Forbidden { .. })
    }
}

impl From<toml::de::Error> for AuthzError {
    fn from(err: toml::de::Error) -> Self {
        Self::parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthzError::UnknownPredicate {
            module: "medicine".to_string(),
            role: Role::Pharmacist,
            predicate: "in_stock".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown predicate `in_stock` referenced by medicine/pharmacist"
        );

        let err = AuthzError::MissingRole {
            module: "rooms".to_string(),
            role: Role::Driver,
        };
        assert!(err.to_string().contains("role `driver`"));
    }

    #[test]
    fn test_error_categories() {
        assert!(AuthzError::parse("bad").is_configuration_error());
        assert!(AuthzError::unknown_module("x").is_configuration_error());
        assert!(!AuthzError::forbidden("no-rule", "denied").is_configuration_error());

        assert!(AuthzError::forbidden("no-rule", "denied").is_request_error());
        assert!(AuthzError::unauthenticated("missing").is_request_error());
        assert!(!AuthzError::watcher("boom").is_request_error());
    }
}
