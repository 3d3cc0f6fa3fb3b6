//! Named row-level predicates.
//!
//! Rules reference predicates by name so policy documents stay plain data.
//! A predicate is a pure function of the row and the context: it performs no
//! I/O and never panics. Whenever it cannot establish its condition (missing
//! row, missing field, malformed value) it returns `false`.
//!
//! The library is assembled once at startup and shared read-only afterwards:
//!
//! ```ignore
//! use medgate_authz::predicates::PredicateLibrary;
//!
//! let library = PredicateLibrary::builtin()
//!     .with_predicate("night_shift", night_shift);
//! let engine = PolicyEngine::new(Arc::new(table), Arc::new(library));
//! ```

use std::collections::HashMap;
use std::fmt;

use crate::context::{AccessContext, PATIENT_CANCEL_BEFORE_HOURS};
use crate::row::{Expiry, RowAttributes};

/// Signature of a predicate.
pub type PredicateFn = fn(Option<&dyn RowAttributes>, &AccessContext) -> bool;

/// Names of the built-in predicates.
pub mod names {
    pub const ASSIGNED_DOCTOR: &str = "assigned_doctor";
    pub const ASSIGNED_STAFF: &str = "assigned_staff";
    pub const CANCEL_WINDOW_OPEN: &str = "cancel_window_open";
    pub const WITHIN_STOCK: &str = "within_stock";
    pub const NOT_EXPIRED: &str = "not_expired";
    pub const BILL_OUTSTANDING: &str = "bill_outstanding";
}

// =============================================================================
// Predicate Library
// =============================================================================

/// Registry of predicates addressable by name.
#[derive(Clone, Default)]
pub struct PredicateLibrary {
    predicates: HashMap<String, PredicateFn>,
}

impl PredicateLibrary {
    /// An empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Library with every built-in predicate registered.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .with_predicate(names::ASSIGNED_DOCTOR, assigned_doctor)
            .with_predicate(names::ASSIGNED_STAFF, assigned_staff)
            .with_predicate(names::CANCEL_WINDOW_OPEN, cancel_window_open)
            .with_predicate(names::WITHIN_STOCK, within_stock)
            .with_predicate(names::NOT_EXPIRED, not_expired)
            .with_predicate(names::BILL_OUTSTANDING, bill_outstanding)
    }

    /// Register `predicate` under `name`, replacing any previous entry.
    #[must_use]
    pub fn with_predicate(mut self, name: impl Into<String>, predicate: PredicateFn) -> Self {
        self.predicates.insert(name.into(), predicate);
        self
    }

    /// Look up a predicate by name.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<PredicateFn> {
        self.predicates.get(name).copied()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.predicates.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.predicates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl fmt::Debug for PredicateLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateLibrary")
            .field("names", &self.names())
            .finish()
    }
}

// =============================================================================
// Built-in Predicates
// =============================================================================

/// The row's doctor is the acting doctor.
///
/// Useful as an extra guard under `any` scope, e.g. letting any doctor open
/// the prescriptions module but only edit prescriptions they wrote.
pub fn assigned_doctor(row: Option<&dyn RowAttributes>, context: &AccessContext) -> bool {
    matches!(
        (row.and_then(|r| r.doctor_id()), context.doctor_id()),
        (Some(a), Some(b)) if a == b
    )
}

/// The row's staff member is the acting staff member (driver of an
/// ambulance, nurse of a room, technician of a lab report).
pub fn assigned_staff(row: Option<&dyn RowAttributes>, context: &AccessContext) -> bool {
    matches!(
        (row.and_then(|r| r.staff_id()), context.staff_id()),
        (Some(a), Some(b)) if a == b
    )
}

/// At least `patientCancelBeforeHours` remain before the row's scheduled time.
///
/// Measured from the context's request time. A missing or malformed scheduled
/// time, or a missing threshold, fails the check.
pub fn cancel_window_open(row: Option<&dyn RowAttributes>, context: &AccessContext) -> bool {
    let Some(scheduled_at) = row.and_then(|r| r.scheduled_at()) else {
        return false;
    };
    let Some(min_hours) = context.rules().get_f64(PATIENT_CANCEL_BEFORE_HOURS) else {
        return false;
    };
    let lead_hours = (scheduled_at - context.request_time()).as_seconds_f64() / 3600.0;
    lead_hours >= min_hours
}

/// The requested quantity does not exceed the available stock.
///
/// Missing stock counts as zero. A missing or negative request fails.
pub fn within_stock(row: Option<&dyn RowAttributes>, _context: &AccessContext) -> bool {
    let Some(row) = row else {
        return false;
    };
    let Some(requested) = row.requested_quantity() else {
        return false;
    };
    let available = row.stock_quantity().unwrap_or(0);
    requested >= 0 && requested <= available
}

/// The item has not expired as of the request date.
///
/// An item with no expiry tracked is not expired. An unreadable expiry is
/// treated as expired.
pub fn not_expired(row: Option<&dyn RowAttributes>, context: &AccessContext) -> bool {
    let Some(row) = row else {
        return false;
    };
    match row.expiry() {
        Expiry::Untracked => true,
        Expiry::Unreadable => false,
        Expiry::On(date) => date >= context.request_time().date(),
    }
}

/// The bill still has an open balance.
pub fn bill_outstanding(row: Option<&dyn RowAttributes>, _context: &AccessContext) -> bool {
    match row.and_then(|r| r.status()) {
        Some(status) => {
            let status = status.trim();
            !status.is_empty()
                && !status.eq_ignore_ascii_case("paid")
                && !status.eq_ignore_ascii_case("cancelled")
        }
        None => false,
    }
}
