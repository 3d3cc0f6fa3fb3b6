//! Core vocabulary of the access-control model: roles, actions, scopes and rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Role
// =============================================================================

/// Identity class of an authenticated user.
///
/// Roles are flat: no role implies the rights of another. An admin holds its
/// permissions only because every module grants them to `admin` explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Doctor,
    Nurse,
    Pharmacist,
    /// Laboratory staff. Also accepted as `lab_assistant`.
    #[serde(alias = "lab_assistant")]
    Technician,
    Driver,
    Worker,
    Patient,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 8] = [
        Role::Admin,
        Role::Doctor,
        Role::Nurse,
        Role::Pharmacist,
        Role::Technician,
        Role::Driver,
        Role::Worker,
        Role::Patient,
    ];

    /// Canonical lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Nurse => "nurse",
            Role::Pharmacist => "pharmacist",
            Role::Technician => "technician",
            Role::Driver => "driver",
            Role::Worker => "worker",
            Role::Patient => "patient",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known role, action or scope.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseKindError {
    kind: &'static str,
    value: String,
}

impl ParseKindError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

impl FromStr for Role {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "doctor" => Ok(Role::Doctor),
            "nurse" => Ok(Role::Nurse),
            "pharmacist" => Ok(Role::Pharmacist),
            "technician" | "lab_assistant" => Ok(Role::Technician),
            "driver" => Ok(Role::Driver),
            "worker" => Ok(Role::Worker),
            "patient" => Ok(Role::Patient),
            _ => Err(ParseKindError::new("role", s)),
        }
    }
}

// =============================================================================
// Action
// =============================================================================

/// CRUD action requested on a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    /// Every action, in CRUD order.
    pub const ALL: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    /// Map an HTTP method to the action it performs.
    ///
    /// Returns `None` for methods that do not map onto CRUD.
    #[must_use]
    pub fn from_http_method(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" | "HEAD" => Some(Action::Read),
            "POST" => Some(Action::Create),
            "PUT" | "PATCH" => Some(Action::Update),
            "DELETE" => Some(Action::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Action::Create),
            "read" => Ok(Action::Read),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            _ => Err(ParseKindError::new("action", s)),
        }
    }
}

// =============================================================================
// Scope
// =============================================================================

/// Breadth of access granted for one action.
///
/// Ordered from narrowest to widest so that `scope >= Scope::Own` reads as
/// "at least own-row access".
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Never allowed.
    #[default]
    None,
    /// Allowed only on rows owned by the acting identity.
    Own,
    /// Allowed regardless of ownership.
    Any,
}

impl Scope {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::None => "none",
            Scope::Own => "own",
            Scope::Any => "any",
        }
    }

    /// Returns `true` unless the scope is `none`.
    #[must_use]
    pub fn grants_something(&self) -> bool {
        !matches!(self, Scope::None)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Scope::None),
            "own" => Ok(Scope::Own),
            "any" => Ok(Scope::Any),
            _ => Err(ParseKindError::new("scope", s)),
        }
    }
}

// =============================================================================
// Rule
// =============================================================================

/// Predicates attached to a single action of a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActionPredicates {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub create: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub read: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub update: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<String>,
}

impl ActionPredicates {
    #[must_use]
    pub fn for_action(&self, action: Action) -> &[String] {
        match action {
            Action::Create => &self.create,
            Action::Read => &self.read,
            Action::Update => &self.update,
            Action::Delete => &self.delete,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        Action::ALL.iter().all(|a| self.for_action(*a).is_empty())
    }
}

/// Permissions of one role on one module.
///
/// A missing action key deserializes to [`Scope::None`], so an empty table is
/// an explicit "no access" entry.
///
/// `predicates` guard every action of the rule. Predicates under `on` guard
/// only the named action and are evaluated after the rule-wide ones:
///
/// ```toml
/// read = "own"
/// update = "own"
///
/// [on]
/// update = ["cancel_window_open"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Rule {
    pub create: Scope,
    pub read: Scope,
    pub update: Scope,
    pub delete: Scope,
    /// Names of predicates that must all hold, in evaluation order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub predicates: Vec<String>,
    #[serde(skip_serializing_if = "ActionPredicates::is_empty")]
    pub on: ActionPredicates,
}

impl Rule {
    /// A rule granting nothing.
    #[must_use]
    pub fn deny_all() -> Self {
        Self::default()
    }

    /// A rule granting `any` on every action, without predicates.
    #[must_use]
    pub fn full_access() -> Self {
        Self {
            create: Scope::Any,
            read: Scope::Any,
            update: Scope::Any,
            delete: Scope::Any,
            predicates: Vec::new(),
            on: ActionPredicates::default(),
        }
    }

    /// Scope configured for `action`.
    #[must_use]
    pub fn scope(&self, action: Action) -> Scope {
        match action {
            Action::Create => self.create,
            Action::Read => self.read,
            Action::Update => self.update,
            Action::Delete => self.delete,
        }
    }

    /// Predicates guarding `action`: rule-wide first, then action-specific.
    pub fn predicates_for(&self, action: Action) -> impl Iterator<Item = &str> {
        self.predicates
            .iter()
            .chain(self.on.for_action(action))
            .map(String::as_str)
    }

    /// Every predicate name the rule references.
    pub fn referenced_predicates(&self) -> impl Iterator<Item = &str> {
        self.predicates
            .iter()
            .chain(Action::ALL.into_iter().flat_map(move |a| self.on.for_action(a)))
            .map(String::as_str)
    }

    /// Returns `true` if any action uses `own` scope.
    #[must_use]
    pub fn uses_own_scope(&self) -> bool {
        Action::ALL.iter().any(|a| self.scope(*a) == Scope::Own)
    }

    /// Returns `true` if the rule grants nothing at all.
    #[must_use]
    pub fn is_deny_all(&self) -> bool {
        Action::ALL.iter().all(|a| self.scope(*a) == Scope::None)
    }
}
