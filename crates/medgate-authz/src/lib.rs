//! # medgate-authz
//!
//! Role and attribute based access control for the Medgate hospital platform.
//!
//! Every create, read, update and delete on a hospital module (patients,
//! appointments, billing, medicine, ...) is decided here from three inputs:
//! the caller's role, the module's policy, and optionally the row being
//! touched.
//!
//! ## Modules
//!
//! - [`types`] - Roles, actions, scopes and rules
//! - [`context`] - Identity bundle and per-request evaluation context
//! - [`row`] - Row views read by ownership checks and predicates
//! - [`predicates`] - Named row-level conditions
//! - [`ownership`] - Per-module ownership keys
//! - [`policy`] - The compiled `module → role → rule` table
//! - [`loader`] - Policy document parsing and validation
//! - [`engine`] - The authorization decision
//! - [`guard`] - Helpers for screens and handlers
//! - [`reload`] - Atomic policy replacement and file watching
//! - [`http`] - Axum extractor, middleware and error responses
//! - [`config`] - Access-control configuration
//!
//! ## Decisions fail closed
//!
//! An unknown module, a role without a rule, an `own` grant without a row, a
//! missing field or an unregistered predicate all deny. [`PolicyEngine::decide`]
//! never returns an error and never panics.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod guard;
pub mod http;
pub mod loader;
pub mod ownership;
pub mod policy;
pub mod predicates;
pub mod reload;
pub mod row;
pub mod types;

pub use config::{AuthzConfig, ReloadConfig};
pub use context::{AccessContext, AccessContextBuilder, Identity, RuleParams};
pub use engine::{AccessDecision, DenyReason, PolicyEngine};
pub use error::AuthzError;
pub use loader::{LoadOptions, PolicyDocument};
pub use ownership::{OwnerKey, OwnershipResolver};
pub use policy::{ModulePolicy, PolicySummary, PolicyTable};
pub use predicates::{PredicateFn, PredicateLibrary};
pub use reload::{PolicyStore, PolicyWatcher, ReloadEvent, WatchHandle};
pub use row::{Expiry, JsonRow, RowAttributes};
pub use types::{Action, Role, Rule, Scope};

/// Type alias for access-control results.
pub type AuthzResult<T> = Result<T, AuthzError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use medgate_authz::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthzResult;
    pub use crate::config::AuthzConfig;
    pub use crate::context::{AccessContext, Identity, RuleParams};
    pub use crate::engine::{AccessDecision, DenyReason, PolicyEngine};
    pub use crate::error::AuthzError;
    pub use crate::guard;
    pub use crate::loader::{self, LoadOptions};
    pub use crate::predicates::PredicateLibrary;
    pub use crate::reload::{PolicyStore, PolicyWatcher};
    pub use crate::row::{
        AmbulanceRow, AppointmentRow, BillingRow, DispenseRequest, JsonRow, MedicineRow,
        PatientRow, RowAttributes,
    };
    pub use crate::types::{Action, Role, Scope};
}
