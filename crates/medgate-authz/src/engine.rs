//! Authorization engine.
//!
//! The engine answers one question: may this role perform this action on this
//! module, optionally against this row? It combines three inputs in a fixed
//! order:
//!
//! 1. the rule for `(module, role)` from the [`PolicyTable`] (absent ⇒ deny),
//! 2. the rule's scope for the action (`none` ⇒ deny; `own` ⇒ the row must
//!    exist and belong to the caller),
//! 3. the conjunction of the rule's predicates (empty ⇒ true).
//!
//! Evaluation is synchronous, allocation-light and never fails. Anything the
//! engine cannot establish is a denial.
//!
//! # Example
//!
//! ```ignore
//! use medgate_authz::prelude::*;
//!
//! let library = Arc::new(PredicateLibrary::builtin());
//! let table = Arc::new(loader::builtin_table(&library)?);
//! let engine = PolicyEngine::new(table, library);
//!
//! let context = AccessContext::builder(1).with_patient_id(7).build();
//! let row = PatientRow { patient_id: 7, user_id: None };
//! assert!(engine.decide(Role::Patient, "patients", Action::Read, &context, Some(&row)));
//! ```

use std::sync::Arc;

use serde::Serialize;

use crate::context::AccessContext;
use crate::policy::PolicyTable;
use crate::predicates::PredicateLibrary;
use crate::row::RowAttributes;
use crate::types::{Action, Role, Scope};

// =============================================================================
// Access Decision
// =============================================================================

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq)]
pub enum AccessDecision {
    /// Access is granted.
    Allow,
    /// Access is denied with a reason.
    Deny(DenyReason),
}

impl AccessDecision {
    /// Returns `true` if access was granted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Returns `true` if access was denied.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }

    /// Get the deny reason if access was denied.
    #[must_use]
    pub fn deny_reason(&self) -> Option<&DenyReason> {
        match self {
            Self::Deny(reason) => Some(reason),
            Self::Allow => None,
        }
    }
}

// =============================================================================
// Deny Reason
// =============================================================================

/// Reason for access denial.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenyReason {
    /// Error code for programmatic handling.
    pub code: String,

    /// Human-readable error message.
    pub message: String,

    /// Additional details about the denial.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl DenyReason {
    pub const NO_RULE: &'static str = "no-rule";
    pub const SCOPE_NONE: &'static str = "scope-none";
    pub const ROW_REQUIRED: &'static str = "row-required";
    pub const NOT_OWNER: &'static str = "not-owner";
    pub const PREDICATE_FAILED: &'static str = "predicate-failed";
    pub const UNKNOWN_PREDICATE: &'static str = "unknown-predicate";
    pub const UNKNOWN_ROLE: &'static str = "unknown-role";

    fn new(code: &str, message: String, details: Option<serde_json::Value>) -> Self {
        Self {
            code: code.to_string(),
            message,
            details,
        }
    }

    /// No rule exists for the role on the module, or the module is unknown.
    #[must_use]
    pub fn no_rule(module: &str, role: Role) -> Self {
        Self::new(
            Self::NO_RULE,
            format!("No rule grants `{role}` access to module `{module}`"),
            None,
        )
    }

    /// The rule exists but grants nothing for the action.
    #[must_use]
    pub fn scope_none(module: &str, role: Role, action: Action) -> Self {
        Self::new(
            Self::SCOPE_NONE,
            format!("`{role}` may not {action} in module `{module}`"),
            None,
        )
    }

    /// `own` scope was granted but no row was supplied to check ownership.
    #[must_use]
    pub fn row_required(module: &str, action: Action) -> Self {
        Self::new(
            Self::ROW_REQUIRED,
            format!("{action} in module `{module}` is limited to owned rows and no row was given"),
            None,
        )
    }

    /// The row does not belong to the caller.
    #[must_use]
    pub fn not_owner(module: &str) -> Self {
        Self::new(
            Self::NOT_OWNER,
            format!("The row in module `{module}` is not owned by the caller"),
            None,
        )
    }

    /// A predicate evaluated to false.
    #[must_use]
    pub fn predicate_failed(predicate: &str) -> Self {
        Self::new(
            Self::PREDICATE_FAILED,
            format!("Condition `{predicate}` is not satisfied"),
            Some(serde_json::json!({ "predicate": predicate })),
        )
    }

    /// A predicate name could not be resolved.
    #[must_use]
    pub fn unknown_predicate(predicate: &str) -> Self {
        Self::new(
            Self::UNKNOWN_PREDICATE,
            format!("Condition `{predicate}` is not registered"),
            Some(serde_json::json!({ "predicate": predicate })),
        )
    }

    /// The role string did not name a known role.
    #[must_use]
    pub fn unknown_role(role: &str) -> Self {
        Self::new(
            Self::UNKNOWN_ROLE,
            format!("Unknown role `{role}`"),
            Some(serde_json::json!({ "role": role })),
        )
    }
}

// =============================================================================
// Policy Engine
// =============================================================================

/// Decides CRUD access against a compiled policy.
///
/// Cheap to clone; the table and the library are shared.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    table: Arc<PolicyTable>,
    predicates: Arc<PredicateLibrary>,
}

impl PolicyEngine {
    #[must_use]
    pub fn new(table: Arc<PolicyTable>, predicates: Arc<PredicateLibrary>) -> Self {
        Self { table, predicates }
    }

    /// Evaluate a request and explain the outcome.
    pub fn evaluate(
        &self,
        role: Role,
        module: &str,
        action: Action,
        context: &AccessContext,
        row: Option<&dyn RowAttributes>,
    ) -> AccessDecision {
        let decision = self.evaluate_inner(role, module, action, context, row);
        match &decision {
            AccessDecision::Allow => {
                tracing::trace!(%role, module, %action, "Access allowed");
            }
            AccessDecision::Deny(reason) => {
                tracing::debug!(
                    %role,
                    module,
                    %action,
                    user_id = context.user_id(),
                    code = %reason.code,
                    "Access denied: {}",
                    reason.message
                );
            }
        }
        decision
    }

    fn evaluate_inner(
        &self,
        role: Role,
        module: &str,
        action: Action,
        context: &AccessContext,
        row: Option<&dyn RowAttributes>,
    ) -> AccessDecision {
        let Some(rule) = self.table.lookup(module, role) else {
            return AccessDecision::Deny(DenyReason::no_rule(module, role));
        };

        match rule.scope(action) {
            Scope::None => {
                return AccessDecision::Deny(DenyReason::scope_none(module, role, action));
            }
            Scope::Own => {
                if row.is_none() {
                    return AccessDecision::Deny(DenyReason::row_required(module, action));
                }
                if !self.table.ownership().owns(module, row, context) {
                    return AccessDecision::Deny(DenyReason::not_owner(module));
                }
            }
            Scope::Any => {}
        }

        for name in rule.predicates_for(action) {
            let Some(predicate) = self.predicates.resolve(name) else {
                return AccessDecision::Deny(DenyReason::unknown_predicate(name));
            };
            if !predicate(row, context) {
                return AccessDecision::Deny(DenyReason::predicate_failed(name));
            }
        }

        AccessDecision::Allow
    }

    /// Returns `true` if the request is allowed.
    #[must_use]
    pub fn decide(
        &self,
        role: Role,
        module: &str,
        action: Action,
        context: &AccessContext,
        row: Option<&dyn RowAttributes>,
    ) -> bool {
        self.evaluate(role, module, action, context, row).is_allowed()
    }

    /// Like [`evaluate`](Self::evaluate) for a role given as text.
    ///
    /// An unrecognized role is denied.
    pub fn evaluate_for(
        &self,
        role: &str,
        module: &str,
        action: Action,
        context: &AccessContext,
        row: Option<&dyn RowAttributes>,
    ) -> AccessDecision {
        match role.parse::<Role>() {
            Ok(role) => self.evaluate(role, module, action, context, row),
            Err(_) => {
                tracing::debug!(role, module, %action, "Access denied: unknown role");
                AccessDecision::Deny(DenyReason::unknown_role(role))
            }
        }
    }

    /// Like [`decide`](Self::decide) for a role given as text.
    #[must_use]
    pub fn decide_for(
        &self,
        role: &str,
        module: &str,
        action: Action,
        context: &AccessContext,
        row: Option<&dyn RowAttributes>,
    ) -> bool {
        self.evaluate_for(role, module, action, context, row)
            .is_allowed()
    }

    /// Configured scope, without ownership or predicates.
    ///
    /// For module-level consumers such as menus and route guards.
    #[must_use]
    pub fn scope(&self, role: Role, module: &str, action: Action) -> Scope {
        self.table.scope(module, role, action)
    }

    /// A new engine over `table` sharing this engine's predicate library.
    #[must_use]
    pub fn with_table(&self, table: PolicyTable) -> Self {
        Self {
            table: Arc::new(table),
            predicates: Arc::clone(&self.predicates),
        }
    }

    #[must_use]
    pub fn table(&self) -> &PolicyTable {
        &self.table
    }

    #[must_use]
    pub fn predicates(&self) -> &PredicateLibrary {
        &self.predicates
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;
    use time::Duration;
    use time::macros::datetime;

    use super::*;
    use crate::context::PATIENT_CANCEL_BEFORE_HOURS;
    use crate::ownership::OwnerKey;
    use crate::policy::ModulePolicy;
    use crate::row::{AppointmentRow, JsonRow};
    use crate::types::Rule;

    fn engine_with(modules: Vec<(&str, Vec<OwnerKey>, Vec<(Role, Rule)>)>) -> PolicyEngine {
        let modules = modules
            .into_iter()
            .map(|(name, owner, rules)| {
                (
                    name.to_string(),
                    ModulePolicy::new(None, owner, rules.into_iter().collect::<HashMap<_, _>>()),
                )
            })
            .collect();
        PolicyEngine::new(
            Arc::new(PolicyTable::from_modules(modules)),
            Arc::new(PredicateLibrary::builtin()),
        )
    }

    fn appointment_engine() -> PolicyEngine {
        let mut patient = Rule {
            create: Scope::Any,
            read: Scope::Own,
            update: Scope::Own,
            ..Rule::default()
        };
        patient.on.update = vec!["cancel_window_open".to_string()];
        engine_with(vec![(
            "appointments",
            vec![OwnerKey::Patient, OwnerKey::Doctor],
            vec![(Role::Admin, Rule::full_access()), (Role::Patient, patient)],
        )])
    }

    fn patient_context() -> AccessContext {
        AccessContext::builder(1)
            .with_patient_id(7)
            .with_rule(PATIENT_CANCEL_BEFORE_HOURS, 4)
            .with_request_time(datetime!(2026-03-02 08:00 UTC))
            .build()
    }

    fn appointment_in(hours: i64) -> AppointmentRow {
        AppointmentRow {
            appointment_id: 1,
            patient_id: 7,
            doctor_id: 3,
            scheduled_at: Some(datetime!(2026-03-02 08:00 UTC) + Duration::hours(hours)),
            status: None,
        }
    }

    #[test]
    fn test_no_rule_denies() {
        let engine = appointment_engine();
        let context = patient_context();

        let decision = engine.evaluate(Role::Nurse, "appointments", Action::Read, &context, None);
        assert_eq!(decision.deny_reason().unwrap().code, DenyReason::NO_RULE);

        let decision = engine.evaluate(Role::Admin, "nonexistent", Action::Read, &context, None);
        assert_eq!(decision.deny_reason().unwrap().code, DenyReason::NO_RULE);
    }

    #[test]
    fn test_scope_none_denies() {
        let engine = appointment_engine();
        let decision = engine.evaluate(
            Role::Patient,
            "appointments",
            Action::Delete,
            &patient_context(),
            Some(&appointment_in(10)),
        );
        assert_eq!(decision.deny_reason().unwrap().code, DenyReason::SCOPE_NONE);
    }

    #[test]
    fn test_own_scope_requires_row_and_ownership() {
        let engine = appointment_engine();
        let context = patient_context();

        let decision = engine.evaluate(Role::Patient, "appointments", Action::Read, &context, None);
        assert_eq!(decision.deny_reason().unwrap().code, DenyReason::ROW_REQUIRED);

        let mut foreign = appointment_in(10);
        foreign.patient_id = 8;
        let decision =
            engine.evaluate(Role::Patient, "appointments", Action::Read, &context, Some(&foreign));
        assert_eq!(decision.deny_reason().unwrap().code, DenyReason::NOT_OWNER);

        assert!(engine.decide(
            Role::Patient,
            "appointments",
            Action::Read,
            &context,
            Some(&appointment_in(10))
        ));
    }

    #[test]
    fn test_action_predicates_only_guard_their_action() {
        let engine = appointment_engine();
        let context = patient_context();
        let soon = appointment_in(2);

        // Creating a booking has no row and no cancel window.
        assert!(engine.decide(Role::Patient, "appointments", Action::Create, &context, None));
        assert!(engine.decide(Role::Patient, "appointments", Action::Read, &context, Some(&soon)));

        let decision =
            engine.evaluate(Role::Patient, "appointments", Action::Update, &context, Some(&soon));
        let reason = decision.deny_reason().unwrap();
        assert_eq!(reason.code, DenyReason::PREDICATE_FAILED);
        assert_eq!(reason.details, Some(json!({ "predicate": "cancel_window_open" })));

        assert!(engine.decide(
            Role::Patient,
            "appointments",
            Action::Update,
            &context,
            Some(&appointment_in(6))
        ));
    }

    #[test]
    fn test_predicate_conjunction() {
        let rule = Rule {
            update: Scope::Any,
            predicates: vec!["within_stock".to_string(), "not_expired".to_string()],
            ..Rule::default()
        };
        let engine = engine_with(vec![("medicine", vec![], vec![(Role::Pharmacist, rule)])]);
        let context = AccessContext::builder(5)
            .with_request_time(datetime!(2026-03-02 08:00 UTC))
            .build();

        let ok = JsonRow::new(json!({ "stock_quantity": 5, "request_qty": 3, "expiry_date": "2027-01-01" }));
        let expired =
            JsonRow::new(json!({ "stock_quantity": 5, "request_qty": 3, "expiry_date": "2025-01-01" }));
        let too_many =
            JsonRow::new(json!({ "stock_quantity": 5, "request_qty": 10, "expiry_date": "2027-01-01" }));

        let decide = |row: &JsonRow| {
            engine.evaluate(Role::Pharmacist, "medicine", Action::Update, &context, Some(row))
        };
        assert!(decide(&ok).is_allowed());
        assert_eq!(
            decide(&expired).deny_reason().unwrap().details,
            Some(json!({ "predicate": "not_expired" }))
        );
        assert_eq!(
            decide(&too_many).deny_reason().unwrap().details,
            Some(json!({ "predicate": "within_stock" }))
        );
    }

    #[test]
    fn test_unregistered_predicate_denies() {
        let rule = Rule {
            read: Scope::Any,
            predicates: vec!["night_shift".to_string()],
            ..Rule::default()
        };
        let engine = engine_with(vec![("rooms", vec![], vec![(Role::Nurse, rule)])]);
        let decision =
            engine.evaluate(Role::Nurse, "rooms", Action::Read, &patient_context(), None);
        assert_eq!(decision.deny_reason().unwrap().code, DenyReason::UNKNOWN_PREDICATE);
    }

    #[test]
    fn test_decide_for_role_strings() {
        let engine = appointment_engine();
        let context = patient_context();
        assert!(engine.decide_for("ADMIN", "appointments", Action::Delete, &context, None));
        assert!(!engine.decide_for("superuser", "appointments", Action::Read, &context, None));
        assert!(!engine.decide_for("", "appointments", Action::Read, &context, None));

        let decision = engine.evaluate_for("root", "appointments", Action::Read, &context, None);
        assert_eq!(decision.deny_reason().unwrap().code, DenyReason::UNKNOWN_ROLE);
    }

    #[test]
    fn test_scope_query() {
        let engine = appointment_engine();
        assert_eq!(engine.scope(Role::Patient, "appointments", Action::Update), Scope::Own);
        assert_eq!(engine.scope(Role::Driver, "appointments", Action::Read), Scope::None);
        assert_eq!(engine.scope(Role::Admin, "unknown", Action::Read), Scope::None);
    }

    #[test]
    fn test_access_decision_methods() {
        let allow = AccessDecision::Allow;
        assert!(allow.is_allowed());
        assert!(!allow.is_denied());
        assert!(allow.deny_reason().is_none());

        let deny = AccessDecision::Deny(DenyReason::not_owner("patients"));
        assert!(!deny.is_allowed());
        assert!(deny.is_denied());
        assert_eq!(deny.deny_reason().unwrap().code, "not-owner");
    }

    #[test]
    fn test_deny_reason_serialization() {
        let value = serde_json::to_value(DenyReason::predicate_failed("within_stock")).unwrap();
        assert_eq!(value["code"], "predicate-failed");
        assert_eq!(value["details"]["predicate"], "within_stock");

        let value = serde_json::to_value(DenyReason::no_rule("rooms", Role::Driver)).unwrap();
        assert!(value.get("details").is_none());
    }
}
