//! Row ownership for `own`-scoped rules.
//!
//! Each module declares which identity fields link a row to its owners, in
//! the same way a compartment lists the references that place a resource in
//! it. A row is owned when ANY declared key matches: an appointment with
//! owner keys `[patient, doctor]` belongs both to its patient and to its
//! doctor.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::AccessContext;
use crate::row::RowAttributes;

/// Identity field compared between a row and the acting context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKey {
    /// `row.patient_id == context.patient_id`
    Patient,
    /// `row.doctor_id == context.doctor_id`
    Doctor,
    /// `row.staff_id == context.staff_id`
    Staff,
    /// `row.user_id == context.user_id`
    User,
}

impl OwnerKey {
    /// Compare the key's field on both sides. Absent on either side never matches.
    #[must_use]
    pub fn matches(&self, row: &dyn RowAttributes, context: &AccessContext) -> bool {
        let (row_value, context_value) = match self {
            OwnerKey::Patient => (row.patient_id(), context.patient_id()),
            OwnerKey::Doctor => (row.doctor_id(), context.doctor_id()),
            OwnerKey::Staff => (row.staff_id(), context.staff_id()),
            OwnerKey::User => (row.user_id(), Some(context.user_id())),
        };
        matches!((row_value, context_value), (Some(a), Some(b)) if a == b)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerKey::Patient => "patient",
            OwnerKey::Doctor => "doctor",
            OwnerKey::Staff => "staff",
            OwnerKey::User => "user",
        }
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-module ownership rules.
#[derive(Debug, Clone, Default)]
pub struct OwnershipResolver {
    modules: HashMap<String, Vec<OwnerKey>>,
}

impl OwnershipResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the owner keys of `module`. An empty list is ignored.
    #[must_use]
    pub fn with_module(mut self, module: impl Into<String>, keys: Vec<OwnerKey>) -> Self {
        if !keys.is_empty() {
            self.modules.insert(module.into(), keys);
        }
        self
    }

    /// Owner keys of `module`, if it declares any.
    #[must_use]
    pub fn keys(&self, module: &str) -> Option<&[OwnerKey]> {
        self.modules.get(module).map(Vec::as_slice)
    }

    /// Returns `true` if `module` declares at least one owner key.
    #[must_use]
    pub fn defines(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    /// Decide whether `row` of `module` belongs to the acting identity.
    ///
    /// Returns `false` when the row is absent or the module declares no keys.
    #[must_use]
    pub fn owns(
        &self,
        module: &str,
        row: Option<&dyn RowAttributes>,
        context: &AccessContext,
    ) -> bool {
        let Some(row) = row else {
            return false;
        };
        let Some(keys) = self.modules.get(module) else {
            return false;
        };
        keys.iter().any(|key| key.matches(row, context))
    }
}
