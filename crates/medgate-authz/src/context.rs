//! Per-request evaluation context.
//!
//! An [`AccessContext`] carries the acting identity's attributes and the tunable
//! rule parameters consulted by predicates. It is built once per request from
//! the authenticated [`Identity`] and never changes afterwards.
//!
//! ```ignore
//! use medgate_authz::context::{AccessContext, Identity};
//!
//! let context = AccessContext::builder(identity.user_id)
//!     .with_identity(&identity)
//!     .with_rules(config.rules.clone())
//!     .build();
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::types::Role;

/// Rule parameter: minimum number of hours before an appointment at which a
/// patient may still change or cancel it.
pub const PATIENT_CANCEL_BEFORE_HOURS: &str = "patientCancelBeforeHours";

// =============================================================================
// Identity
// =============================================================================

/// Authenticated identity bundle supplied by the session layer.
///
/// The engine trusts this value verbatim; credential verification happens
/// before it is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub role: Role,
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staff_id: Option<i64>,
}

impl Identity {
    /// Identity with only a role and user id.
    #[must_use]
    pub fn new(role: Role, user_id: i64) -> Self {
        Self {
            role,
            user_id,
            patient_id: None,
            doctor_id: None,
            staff_id: None,
        }
    }

    #[must_use]
    pub fn with_patient_id(mut self, patient_id: i64) -> Self {
        self.patient_id = Some(patient_id);
        self
    }

    #[must_use]
    pub fn with_doctor_id(mut self, doctor_id: i64) -> Self {
        self.doctor_id = Some(doctor_id);
        self
    }

    #[must_use]
    pub fn with_staff_id(mut self, staff_id: i64) -> Self {
        self.staff_id = Some(staff_id);
        self
    }
}

// =============================================================================
// Rule Parameters
// =============================================================================

/// Open-ended bag of tunable thresholds consumed by predicates.
///
/// Values are stored as JSON scalars. Getters return `None` when a key is
/// missing or holds a value of the wrong type; the engine never interprets
/// the domain meaning of a parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleParams(BTreeMap<String, Value>);

impl RuleParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Merge `other` over `self`; keys in `other` win.
    #[must_use]
    pub fn merged_with(mut self, other: &RuleParams) -> Self {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
        self
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Numeric parameter. Numeric strings are accepted; NaN and infinities are not.
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        let value = match self.0.get(key)? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        value.is_finite().then_some(value)
    }

    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.as_str()
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key)?.as_bool()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// Access Context
// =============================================================================

/// Identity attributes and rule parameters for one authorization decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessContext {
    user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    patient_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    doctor_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    staff_id: Option<i64>,
    #[serde(default)]
    rules: RuleParams,
    /// Instant the request was received. Time-based predicates measure
    /// against this value so a decision does not depend on when it runs.
    #[serde(default = "OffsetDateTime::now_utc", with = "time::serde::rfc3339")]
    request_time: OffsetDateTime,
}

impl AccessContext {
    /// Start building a context for `user_id`.
    #[must_use]
    pub fn builder(user_id: i64) -> AccessContextBuilder {
        AccessContextBuilder::new(user_id)
    }

    /// Context for an identity with the given rule parameters, stamped now.
    #[must_use]
    pub fn for_identity(identity: &Identity, rules: RuleParams) -> Self {
        AccessContextBuilder::new(identity.user_id)
            .with_identity(identity)
            .with_rules(rules)
            .build()
    }

    /// Builder preset with this context's values.
    #[must_use]
    pub fn to_builder(&self) -> AccessContextBuilder {
        AccessContextBuilder {
            user_id: self.user_id,
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            staff_id: self.staff_id,
            rules: self.rules.clone(),
            request_time: Some(self.request_time),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    #[must_use]
    pub fn patient_id(&self) -> Option<i64> {
        self.patient_id
    }

    #[must_use]
    pub fn doctor_id(&self) -> Option<i64> {
        self.doctor_id
    }

    #[must_use]
    pub fn staff_id(&self) -> Option<i64> {
        self.staff_id
    }

    #[must_use]
    pub fn rules(&self) -> &RuleParams {
        &self.rules
    }

    #[must_use]
    pub fn request_time(&self) -> OffsetDateTime {
        self.request_time
    }
}

/// Builder for [`AccessContext`].
#[derive(Debug, Clone)]
pub struct AccessContextBuilder {
    user_id: i64,
    patient_id: Option<i64>,
    doctor_id: Option<i64>,
    staff_id: Option<i64>,
    rules: RuleParams,
    request_time: Option<OffsetDateTime>,
}

impl AccessContextBuilder {
    #[must_use]
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            patient_id: None,
            doctor_id: None,
            staff_id: None,
            rules: RuleParams::default(),
            request_time: None,
        }
    }

    /// Copy identity attributes from the session bundle.
    #[must_use]
    pub fn with_identity(mut self, identity: &Identity) -> Self {
        self.user_id = identity.user_id;
        self.patient_id = identity.patient_id;
        self.doctor_id = identity.doctor_id;
        self.staff_id = identity.staff_id;
        self
    }

    #[must_use]
    pub fn with_patient_id(mut self, patient_id: i64) -> Self {
        self.patient_id = Some(patient_id);
        self
    }

    #[must_use]
    pub fn with_doctor_id(mut self, doctor_id: i64) -> Self {
        self.doctor_id = Some(doctor_id);
        self
    }

    #[must_use]
    pub fn with_staff_id(mut self, staff_id: i64) -> Self {
        self.staff_id = Some(staff_id);
        self
    }

    #[must_use]
    pub fn with_rules(mut self, rules: RuleParams) -> Self {
        self.rules = rules;
        self
    }

    #[must_use]
    pub fn with_rule(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.rules = self.rules.with(key, value);
        self
    }

    /// Pin the request instant. Defaults to the time `build` is called.
    #[must_use]
    pub fn with_request_time(mut self, request_time: OffsetDateTime) -> Self {
        self.request_time = Some(request_time);
        self
    }

    #[must_use]
    pub fn build(self) -> AccessContext {
        AccessContext {
            user_id: self.user_id,
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            staff_id: self.staff_id,
            rules: self.rules,
            request_time: self.request_time.unwrap_or_else(OffsetDateTime::now_utc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn test_builder_from_identity() {
        let identity = Identity::new(Role::Doctor, 10).with_doctor_id(3);
        let context = AccessContext::builder(0)
            .with_identity(&identity)
            .with_rule(PATIENT_CANCEL_BEFORE_HOURS, 4)
            .with_request_time(datetime!(2026-03-01 09:00 UTC))
            .build();

        assert_eq!(context.user_id(), 10);
        assert_eq!(context.doctor_id(), Some(3));
        assert_eq!(context.patient_id(), None);
        assert_eq!(context.staff_id(), None);
        assert_eq!(context.rules().get_f64(PATIENT_CANCEL_BEFORE_HOURS), Some(4.0));
        assert_eq!(context.request_time(), datetime!(2026-03-01 09:00 UTC));
    }

    #[test]
    fn test_rule_params_typed_getters() {
        let rules = RuleParams::new()
            .with("hours", 4)
            .with("fraction", 2.5)
            .with("numeric_text", "6")
            .with("label", "ward-a")
            .with("flag", true)
            .with("nan_text", "NaN");

        assert_eq!(rules.get_f64("hours"), Some(4.0));
        assert_eq!(rules.get_i64("hours"), Some(4));
        assert_eq!(rules.get_f64("fraction"), Some(2.5));
        assert_eq!(rules.get_i64("fraction"), None);
        assert_eq!(rules.get_f64("numeric_text"), Some(6.0));
        assert_eq!(rules.get_str("label"), Some("ward-a"));
        assert_eq!(rules.get_f64("label"), None);
        assert_eq!(rules.get_bool("flag"), Some(true));
        assert_eq!(rules.get_f64("nan_text"), None);
        assert_eq!(rules.get_f64("missing"), None);
        assert_eq!(rules.len(), 6);
    }

    #[test]
    fn test_rule_params_merge() {
        let defaults = RuleParams::new().with("a", 1).with("b", 2);
        let overrides = RuleParams::new().with("b", 20).with("c", 30);
        let merged = defaults.merged_with(&overrides);

        assert_eq!(merged.get_i64("a"), Some(1));
        assert_eq!(merged.get_i64("b"), Some(20));
        assert_eq!(merged.get_i64("c"), Some(30));
    }

    #[test]
    fn test_context_deserialize() {
        let context: AccessContext = serde_json::from_value(json!({
            "userId": 5,
            "patientId": 7,
            "rules": { "patientCancelBeforeHours": 4 },
            "requestTime": "2026-03-01T09:00:00Z"
        }))
        .unwrap();

        assert_eq!(context.user_id(), 5);
        assert_eq!(context.patient_id(), Some(7));
        assert_eq!(context.rules().get_i64(PATIENT_CANCEL_BEFORE_HOURS), Some(4));
        assert_eq!(context.request_time(), datetime!(2026-03-01 09:00 UTC));
    }

    #[test]
    fn test_to_builder_preserves_values() {
        let context = AccessContext::builder(5)
            .with_staff_id(9)
            .with_rule("maxDose", 3)
            .with_request_time(datetime!(2026-03-01 09:00 UTC))
            .build();
        let moved = context
            .to_builder()
            .with_request_time(datetime!(2026-03-02 09:00 UTC))
            .build();

        assert_eq!(moved.user_id(), 5);
        assert_eq!(moved.staff_id(), Some(9));
        assert_eq!(moved.rules(), context.rules());
        assert_eq!(moved.request_time(), datetime!(2026-03-02 09:00 UTC));
        assert_eq!(context.to_builder().build(), context);
    }

    #[test]
    fn test_identity_deserialize() {
        let identity: Identity = serde_json::from_value(json!({
            "role": "patient",
            "user_id": 12,
            "patient_id": 7
        }))
        .unwrap();
        assert_eq!(identity, Identity::new(Role::Patient, 12).with_patient_id(7));

        let bad: Result<Identity, _> =
            serde_json::from_value(json!({ "role": "janitor", "user_id": 1 }));
        assert!(bad.is_err());
    }
}
