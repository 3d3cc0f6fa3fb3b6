//! Decision consumers.
//!
//! Thin helpers over [`PolicyEngine`] for screens and handlers. They hold no
//! rule logic: every answer comes from the engine.

use crate::AuthzResult;
use crate::context::AccessContext;
use crate::engine::{AccessDecision, PolicyEngine};
use crate::error::AuthzError;
use crate::row::RowAttributes;
use crate::types::{Action, Role};

/// May the role create rows in the module?
#[must_use]
pub fn can_create(engine: &PolicyEngine, role: Role, module: &str, context: &AccessContext) -> bool {
    engine.decide(role, module, Action::Create, context, None)
}

/// May the role view `row`? Without a row, only `any` read scope passes.
#[must_use]
pub fn can_view(
    engine: &PolicyEngine,
    role: Role,
    module: &str,
    context: &AccessContext,
    row: Option<&dyn RowAttributes>,
) -> bool {
    engine.decide(role, module, Action::Read, context, row)
}

#[must_use]
pub fn can_edit(
    engine: &PolicyEngine,
    role: Role,
    module: &str,
    context: &AccessContext,
    row: Option<&dyn RowAttributes>,
) -> bool {
    engine.decide(role, module, Action::Update, context, row)
}

#[must_use]
pub fn can_delete(
    engine: &PolicyEngine,
    role: Role,
    module: &str,
    context: &AccessContext,
    row: Option<&dyn RowAttributes>,
) -> bool {
    engine.decide(role, module, Action::Delete, context, row)
}

/// May the role open the module's screens at all?
///
/// Module-level check: any read scope other than `none` passes. Row-level
/// reads are still decided per row.
#[must_use]
pub fn can_enter_route(engine: &PolicyEngine, role: Role, module: &str) -> bool {
    engine.scope(role, module, Action::Read).grants_something()
}

/// Actions the role holds any scope for on the module, in CRUD order.
///
/// Used to render action menus; it does not check ownership or predicates.
#[must_use]
pub fn permitted_actions(engine: &PolicyEngine, role: Role, module: &str) -> Vec<Action> {
    Action::ALL
        .into_iter()
        .filter(|action| engine.scope(role, module, *action).grants_something())
        .collect()
}

/// Evaluate a request and turn a denial into [`AuthzError::Forbidden`].
pub fn enforce(
    engine: &PolicyEngine,
    role: Role,
    module: &str,
    action: Action,
    context: &AccessContext,
    row: Option<&dyn RowAttributes>,
) -> AuthzResult<()> {
    match engine.evaluate(role, module, action, context, row) {
        AccessDecision::Allow => Ok(()),
        AccessDecision::Deny(reason) => Err(AuthzError::forbidden(reason.code, reason.message)),
    }
}
