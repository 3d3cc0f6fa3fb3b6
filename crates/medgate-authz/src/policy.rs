//! The compiled, read-only policy table.
//!
//! A [`PolicyTable`] maps `module → role → Rule` and carries each module's
//! ownership keys. It is produced by [`crate::loader`] after validation and is
//! never mutated afterwards; a reload builds a new table and swaps it in whole.
//!
//! The table only returns configuration. It never decides allow or deny: an
//! absent entry is reported as `None` and interpreted by the engine.

use std::collections::HashMap;

use serde::Serialize;

use crate::ownership::{OwnerKey, OwnershipResolver};
use crate::types::{Action, Role, Rule, Scope};

/// Policy of a single module.
#[derive(Debug, Clone, Default)]
pub struct ModulePolicy {
    description: Option<String>,
    owner_keys: Vec<OwnerKey>,
    rules: HashMap<Role, Rule>,
}

impl ModulePolicy {
    pub(crate) fn new(
        description: Option<String>,
        owner_keys: Vec<OwnerKey>,
        rules: HashMap<Role, Rule>,
    ) -> Self {
        Self {
            description,
            owner_keys,
            rules,
        }
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn owner_keys(&self) -> &[OwnerKey] {
        &self.owner_keys
    }

    #[must_use]
    pub fn rule(&self, role: Role) -> Option<&Rule> {
        self.rules.get(&role)
    }

    /// Rules in role declaration order.
    pub fn rules(&self) -> impl Iterator<Item = (Role, &Rule)> {
        Role::ALL
            .into_iter()
            .filter_map(|role| self.rules.get(&role).map(|rule| (role, rule)))
    }
}

/// Counts describing a loaded table, for logs and CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySummary {
    pub modules: usize,
    pub rules: usize,
    pub own_scoped_rules: usize,
    pub predicate_references: usize,
}

/// Immutable `module → role → Rule` table.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    modules: HashMap<String, ModulePolicy>,
    ownership: OwnershipResolver,
}

impl PolicyTable {
    pub(crate) fn from_modules(modules: HashMap<String, ModulePolicy>) -> Self {
        let ownership = modules
            .iter()
            .fold(OwnershipResolver::new(), |resolver, (name, module)| {
                resolver.with_module(name.clone(), module.owner_keys.clone())
            });
        Self { modules, ownership }
    }

    /// Rule for `(module, role)`, or `None` if the table has no entry.
    #[must_use]
    pub fn lookup(&self, module: &str, role: Role) -> Option<&Rule> {
        self.modules.get(module)?.rules.get(&role)
    }

    /// Configured scope for `(module, role, action)`; `none` when absent.
    #[must_use]
    pub fn scope(&self, module: &str, role: Role, action: Action) -> Scope {
        self.lookup(module, role)
            .map_or(Scope::None, |rule| rule.scope(action))
    }

    #[must_use]
    pub fn module(&self, module: &str) -> Option<&ModulePolicy> {
        self.modules.get(module)
    }

    #[must_use]
    pub fn contains_module(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    /// Module names, sorted.
    #[must_use]
    pub fn modules(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Ownership resolver derived from the modules' owner keys.
    #[must_use]
    pub fn ownership(&self) -> &OwnershipResolver {
        &self.ownership
    }

    #[must_use]
    pub fn summary(&self) -> PolicySummary {
        let rules = self.modules.values().flat_map(|m| m.rules.values());
        let (mut count, mut own, mut predicates) = (0, 0, 0);
        for rule in rules {
            count += 1;
            if rule.uses_own_scope() {
                own += 1;
            }
            predicates += rule.referenced_predicates().count();
        }
        PolicySummary {
            modules: self.modules.len(),
            rules: count,
            own_scoped_rules: own,
            predicate_references: predicates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PolicyTable {
        let mut rules = HashMap::new();
        rules.insert(Role::Admin, Rule::full_access());
        rules.insert(
            Role::Patient,
            Rule {
                read: Scope::Own,
                predicates: vec!["not_expired".to_string()],
                ..Rule::default()
            },
        );
        let mut modules = HashMap::new();
        modules.insert(
            "patients".to_string(),
            ModulePolicy::new(None, vec![OwnerKey::Patient], rules),
        );
        modules.insert(
            "rooms".to_string(),
            ModulePolicy::new(Some("Ward rooms".to_string()), vec![], HashMap::new()),
        );
        PolicyTable::from_modules(modules)
    }

    #[test]
    fn test_lookup() {
        let table = table();
        assert_eq!(table.lookup("patients", Role::Admin), Some(&Rule::full_access()));
        assert!(table.lookup("patients", Role::Driver).is_none());
        assert!(table.lookup("billing", Role::Admin).is_none());
        assert!(table.lookup("rooms", Role::Admin).is_none());
    }

    #[test]
    fn test_scope_defaults_to_none() {
        let table = table();
        assert_eq!(table.scope("patients", Role::Patient, Action::Read), Scope::Own);
        assert_eq!(table.scope("patients", Role::Patient, Action::Delete), Scope::None);
        assert_eq!(table.scope("patients", Role::Nurse, Action::Read), Scope::None);
        assert_eq!(table.scope("missing", Role::Admin, Action::Read), Scope::None);
    }

    #[test]
    fn test_modules_sorted_and_ownership_derived() {
        let table = table();
        assert_eq!(table.modules(), vec!["patients", "rooms"]);
        assert!(table.ownership().defines("patients"));
        assert!(!table.ownership().defines("rooms"));
        assert_eq!(table.module("rooms").unwrap().description(), Some("Ward rooms"));
    }

    #[test]
    fn test_summary() {
        let summary = table().summary();
        assert_eq!(summary.modules, 2);
        assert_eq!(summary.rules, 2);
        assert_eq!(summary.own_scoped_rules, 1);
        assert_eq!(summary.predicate_references, 1);
    }

    #[test]
    fn test_module_rules_in_role_order() {
        let table = table();
        let roles: Vec<Role> = table
            .module("patients")
            .unwrap()
            .rules()
            .map(|(role, _)| role)
            .collect();
        assert_eq!(roles, vec![Role::Admin, Role::Patient]);
    }
}
