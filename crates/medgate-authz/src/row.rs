//! Row views read by ownership checks and predicates.
//!
//! The engine never sees a concrete table record. It reads the few fields it
//! needs through [`RowAttributes`], whose accessors default to "absent". A row
//! type only overrides the accessors for fields it actually has, so a missing
//! field is a visible default rather than a silent lookup failure.
//!
//! Typed rows cover the hospital modules. [`JsonRow`] adapts loosely typed JSON
//! (request bodies, CLI input); values of the wrong type read as absent.

use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};

// =============================================================================
// Row Attributes
// =============================================================================

/// Expiry state of a stock item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// The item has no expiry tracked.
    Untracked,
    /// An expiry is recorded but cannot be read as a date.
    Unreadable,
    /// The item expires at the end of this day.
    On(Date),
}

/// Fields of a domain row that authorization decisions may read.
///
/// Implementations must be side-effect free; the engine calls accessors any
/// number of times during a decision.
pub trait RowAttributes {
    fn patient_id(&self) -> Option<i64> {
        None
    }

    fn doctor_id(&self) -> Option<i64> {
        None
    }

    fn staff_id(&self) -> Option<i64> {
        None
    }

    fn user_id(&self) -> Option<i64> {
        None
    }

    /// Scheduled instant of an appointment or booking.
    fn scheduled_at(&self) -> Option<OffsetDateTime> {
        None
    }

    /// Units available in stock.
    fn stock_quantity(&self) -> Option<i64> {
        None
    }

    /// Units requested by the operation being authorized.
    fn requested_quantity(&self) -> Option<i64> {
        None
    }

    fn expiry(&self) -> Expiry {
        Expiry::Untracked
    }

    /// Workflow status (billing, appointment, ambulance).
    fn status(&self) -> Option<&str> {
        None
    }
}

// =============================================================================
// Typed Rows
// =============================================================================

/// A patient record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientRow {
    pub patient_id: i64,
    pub user_id: Option<i64>,
}

impl RowAttributes for PatientRow {
    fn patient_id(&self) -> Option<i64> {
        Some(self.patient_id)
    }

    fn user_id(&self) -> Option<i64> {
        self.user_id
    }
}

/// A doctor profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctorRow {
    pub doctor_id: i64,
    pub user_id: Option<i64>,
}

impl RowAttributes for DoctorRow {
    fn doctor_id(&self) -> Option<i64> {
        Some(self.doctor_id)
    }

    fn user_id(&self) -> Option<i64> {
        self.user_id
    }
}

/// A staff member (nurse, pharmacist, technician, driver, worker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffRow {
    pub staff_id: i64,
    pub user_id: Option<i64>,
}

impl RowAttributes for StaffRow {
    fn staff_id(&self) -> Option<i64> {
        Some(self.staff_id)
    }

    fn user_id(&self) -> Option<i64> {
        self.user_id
    }
}

/// An appointment between a patient and a doctor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentRow {
    pub appointment_id: i64,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub scheduled_at: Option<OffsetDateTime>,
    pub status: Option<String>,
}

impl RowAttributes for AppointmentRow {
    fn patient_id(&self) -> Option<i64> {
        Some(self.patient_id)
    }

    fn doctor_id(&self) -> Option<i64> {
        Some(self.doctor_id)
    }

    fn scheduled_at(&self) -> Option<OffsetDateTime> {
        self.scheduled_at
    }

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

/// A bill issued to a patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingRow {
    pub bill_id: i64,
    pub patient_id: i64,
    pub status: Option<String>,
}

impl RowAttributes for BillingRow {
    fn patient_id(&self) -> Option<i64> {
        Some(self.patient_id)
    }

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

/// A medicine inventory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MedicineRow {
    pub medicine_id: i64,
    pub stock_quantity: Option<i64>,
    pub expiry_date: Option<Date>,
}

impl RowAttributes for MedicineRow {
    fn stock_quantity(&self) -> Option<i64> {
        self.stock_quantity
    }

    fn expiry(&self) -> Expiry {
        self.expiry_date.map_or(Expiry::Untracked, Expiry::On)
    }
}

/// A request to dispense medicine against a prescription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispenseRequest {
    pub medicine_id: i64,
    pub patient_id: Option<i64>,
    pub stock_quantity: Option<i64>,
    pub request_qty: i64,
    pub expiry_date: Option<Date>,
}

impl RowAttributes for DispenseRequest {
    fn patient_id(&self) -> Option<i64> {
        self.patient_id
    }

    fn stock_quantity(&self) -> Option<i64> {
        self.stock_quantity
    }

    fn requested_quantity(&self) -> Option<i64> {
        Some(self.request_qty)
    }

    fn expiry(&self) -> Expiry {
        self.expiry_date.map_or(Expiry::Untracked, Expiry::On)
    }
}

/// A prescription written by a doctor for a patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrescriptionRow {
    pub prescription_id: i64,
    pub patient_id: i64,
    pub doctor_id: i64,
}

impl RowAttributes for PrescriptionRow {
    fn patient_id(&self) -> Option<i64> {
        Some(self.patient_id)
    }

    fn doctor_id(&self) -> Option<i64> {
        Some(self.doctor_id)
    }
}

/// A laboratory report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabReportRow {
    pub report_id: i64,
    pub patient_id: i64,
    pub doctor_id: Option<i64>,
    /// Technician who produced the report.
    pub staff_id: Option<i64>,
}

impl RowAttributes for LabReportRow {
    fn patient_id(&self) -> Option<i64> {
        Some(self.patient_id)
    }

    fn doctor_id(&self) -> Option<i64> {
        self.doctor_id
    }

    fn staff_id(&self) -> Option<i64> {
        self.staff_id
    }
}

/// A ward room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRow {
    pub room_id: i64,
    /// Current occupant.
    pub patient_id: Option<i64>,
    /// Nurse assigned to the room.
    pub staff_id: Option<i64>,
}

impl RowAttributes for RoomRow {
    fn patient_id(&self) -> Option<i64> {
        self.patient_id
    }

    fn staff_id(&self) -> Option<i64> {
        self.staff_id
    }
}

/// An ambulance and its assigned driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbulanceRow {
    pub ambulance_id: i64,
    pub staff_id: Option<i64>,
    pub status: Option<String>,
}

impl RowAttributes for AmbulanceRow {
    fn staff_id(&self) -> Option<i64> {
        self.staff_id
    }

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}

// =============================================================================
// JSON Rows
// =============================================================================

/// Loosely typed row backed by a JSON object.
///
/// Keys are read in `snake_case` first, then `camelCase`. Identifiers and
/// quantities accept integers or integer strings. Appointment instants come
/// from `scheduled_at` (RFC 3339) or from `appointment_date` plus
/// `appointment_time`, interpreted as UTC.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRow(Value);

impl JsonRow {
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    fn field(&self, snake: &str, camel: &str) -> Option<&Value> {
        let object = self.0.as_object()?;
        let present = |key: &str| object.get(key).filter(|v| !v.is_null());
        present(snake).or_else(|| present(camel))
    }

    fn integer(&self, snake: &str, camel: &str) -> Option<i64> {
        match self.field(snake, camel)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn text(&self, snake: &str, camel: &str) -> Option<&str> {
        self.field(snake, camel)?.as_str()
    }
}

impl From<Value> for JsonRow {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl RowAttributes for JsonRow {
    fn patient_id(&self) -> Option<i64> {
        self.integer("patient_id", "patientId")
    }

    fn doctor_id(&self) -> Option<i64> {
        self.integer("doctor_id", "doctorId")
    }

    fn staff_id(&self) -> Option<i64> {
        self.integer("staff_id", "staffId")
    }

    fn user_id(&self) -> Option<i64> {
        self.integer("user_id", "userId")
    }

    fn scheduled_at(&self) -> Option<OffsetDateTime> {
        if let Some(raw) = self.text("scheduled_at", "scheduledAt") {
            return OffsetDateTime::parse(raw.trim(), &Rfc3339).ok();
        }
        let date = parse_date(self.text("appointment_date", "appointmentDate")?)?;
        let time = parse_time(self.text("appointment_time", "appointmentTime")?)?;
        Some(PrimitiveDateTime::new(date, time).assume_utc())
    }

    fn stock_quantity(&self) -> Option<i64> {
        self.integer("stock_quantity", "stockQuantity")
    }

    fn requested_quantity(&self) -> Option<i64> {
        self.integer("request_qty", "requestQty")
            .or_else(|| self.integer("requested_quantity", "requestedQuantity"))
    }

    fn expiry(&self) -> Expiry {
        match self.field("expiry_date", "expiryDate") {
            None => Expiry::Untracked,
            Some(Value::String(raw)) => parse_date(raw).map_or(Expiry::Unreadable, Expiry::On),
            Some(_) => Expiry::Unreadable,
        }
    }

    fn status(&self) -> Option<&str> {
        self.text("status", "status")
    }
}

/// Parse `YYYY-MM-DD`, or the date part of an RFC 3339 timestamp.
fn parse_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .or_else(|| OffsetDateTime::parse(raw, &Rfc3339).ok().map(|dt| dt.date()))
}

/// Parse `HH:MM:SS` or `HH:MM`.
fn parse_time(raw: &str) -> Option<Time> {
    let raw = raw.trim();
    Time::parse(raw, format_description!("[hour]:[minute]:[second]"))
        .ok()
        .or_else(|| Time::parse(raw, format_description!("[hour]:[minute]")).ok())
}
