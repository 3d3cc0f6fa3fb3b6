//! Policy document parsing and compilation.
//!
//! A policy document is TOML. Each module declares its ownership keys and one
//! rule table per role:
//!
//! ```toml
//! [modules.appointments]
//! description = "Bookings between patients and doctors"
//! owner = ["patient", "doctor"]
//!
//! [modules.appointments.roles.patient]
//! create = "any"
//! read = "own"
//! update = "own"
//!
//! [modules.appointments.roles.patient.on]
//! update = ["cancel_window_open"]
//!
//! [modules.appointments.roles.driver]
//! ```
//!
//! [`compile`] validates the whole document before anything is returned, so a
//! broken document never produces a partially usable table.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::AuthzResult;
use crate::error::AuthzError;
use crate::ownership::OwnerKey;
use crate::policy::{ModulePolicy, PolicyTable};
use crate::predicates::PredicateLibrary;
use crate::types::{Role, Rule};

/// The hospital policy shipped with the crate.
pub const BUILTIN_POLICY: &str = include_str!("../policies/hospital.toml");

/// Modules of the hospital application.
pub const HOSPITAL_MODULES: [&str; 10] = [
    "patients",
    "doctors",
    "staff",
    "appointments",
    "billing",
    "medicine",
    "prescriptions",
    "lab_reports",
    "rooms",
    "ambulances",
];

// =============================================================================
// Document
// =============================================================================

/// Parsed, not yet validated, policy document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDocument {
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleDocument>,
}

/// One `[modules.<name>]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModuleDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Identity fields linking a row to its owners.
    pub owner: Vec<OwnerKey>,
    /// Rules keyed by role name.
    pub roles: BTreeMap<String, Rule>,
}

/// Validation switches for [`compile`].
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Reject modules that omit a role.
    pub require_all_roles: bool,
    /// Module registry. When non-empty the document must declare exactly
    /// these modules.
    pub known_modules: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            require_all_roles: true,
            known_modules: Vec::new(),
        }
    }
}

impl LoadOptions {
    /// Options for documents describing the hospital application.
    #[must_use]
    pub fn hospital() -> Self {
        Self {
            require_all_roles: true,
            known_modules: HOSPITAL_MODULES.iter().map(|m| (*m).to_string()).collect(),
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Parse a policy document without validating it.
pub fn parse_str(source: &str) -> AuthzResult<PolicyDocument> {
    Ok(toml::from_str(source)?)
}

/// Parse and compile a policy document held in memory.
pub fn load_str(
    source: &str,
    library: &PredicateLibrary,
    options: &LoadOptions,
) -> AuthzResult<PolicyTable> {
    compile(parse_str(source)?, library, options)
}

/// Read, parse and compile the policy file at `path`.
pub fn load_file(
    path: &Path,
    library: &PredicateLibrary,
    options: &LoadOptions,
) -> AuthzResult<PolicyTable> {
    let source = std::fs::read_to_string(path).map_err(|source| AuthzError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = load_str(&source, library, options)?;

    let summary = table.summary();
    tracing::info!(
        path = %path.display(),
        modules = summary.modules,
        rules = summary.rules,
        own_scoped = summary.own_scoped_rules,
        predicates = summary.predicate_references,
        "Loaded access policy"
    );

    Ok(table)
}

/// Compile the embedded hospital policy.
pub fn builtin_table(library: &PredicateLibrary) -> AuthzResult<PolicyTable> {
    let table = load_str(BUILTIN_POLICY, library, &LoadOptions::hospital())?;
    tracing::debug!(modules = table.modules().len(), "Compiled built-in policy");
    Ok(table)
}

/// Validate `document` and freeze it into a [`PolicyTable`].
///
/// Modules are checked in name order and the first violation is returned.
pub fn compile(
    document: PolicyDocument,
    library: &PredicateLibrary,
    options: &LoadOptions,
) -> AuthzResult<PolicyTable> {
    if document.modules.is_empty() {
        return Err(AuthzError::configuration("policy document declares no modules"));
    }

    let mut modules = HashMap::with_capacity(document.modules.len());

    for (name, module) in document.modules {
        if name.trim().is_empty() {
            return Err(AuthzError::parse("module name must not be empty"));
        }
        if !options.known_modules.is_empty() && !options.known_modules.contains(&name) {
            return Err(AuthzError::unknown_module(name));
        }

        let rules = compile_rules(&name, module.roles)?;

        if options.require_all_roles {
            if let Some(role) = Role::ALL.into_iter().find(|r| !rules.contains_key(r)) {
                return Err(AuthzError::MissingRole { module: name, role });
            }
        }

        for role in Role::ALL {
            let Some(rule) = rules.get(&role) else {
                continue;
            };
            if rule.uses_own_scope() && module.owner.is_empty() {
                return Err(AuthzError::OwnershipUndefined { module: name, role });
            }
            if let Some(missing) = rule.referenced_predicates().find(|p| !library.contains(p)) {
                return Err(AuthzError::UnknownPredicate {
                    predicate: missing.to_string(),
                    module: name,
                    role,
                });
            }
        }

        modules.insert(name, ModulePolicy::new(module.description, module.owner, rules));
    }

    if let Some(absent) = options
        .known_modules
        .iter()
        .find(|m| !modules.contains_key(m.as_str()))
    {
        return Err(AuthzError::configuration(format!(
            "module `{absent}` is registered but missing from the policy document"
        )));
    }

    Ok(PolicyTable::from_modules(modules))
}

fn compile_rules(module: &str, roles: BTreeMap<String, Rule>) -> AuthzResult<HashMap<Role, Rule>> {
    let mut rules = HashMap::with_capacity(roles.len());
    for (key, rule) in roles {
        let role: Role = key
            .parse()
            .map_err(|e| AuthzError::parse(format!("module `{module}`: {e}")))?;
        if rules.insert(role, rule).is_some() {
            return Err(AuthzError::parse(format!(
                "module `{module}` defines role `{role}` more than once"
            )));
        }
    }
    Ok(rules)
}
