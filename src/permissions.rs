//! Per-entity, per-role allow-lists of the fields an update endpoint may write.
//!
//! Keys outside the caller's allow-list are dropped without error. Ownership
//! and business-rule checks (e.g. who may change an appointment status) are
//! made by the callers before filtering.

use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::auth::repo_types::Role;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    User,
    Patient,
    Doctor,
    Appointment,
}

type FieldTable = HashMap<Entity, HashMap<Role, &'static [&'static str]>>;

const PATIENT_SELF: &[&str] = &[
    "emergencyContact",
    "medicalHistory",
    "insurance",
    "bloodType",
    "height",
    "weight",
    "lifestyle",
];
const PATIENT_CLINICAL: &[&str] = &["medicalHistory", "bloodType", "height", "weight"];

const DOCTOR_SELF: &[&str] = &[
    "specializations",
    "experienceYears",
    "education",
    "languages",
    "bio",
    "availability",
    "consultationFee",
    "isAcceptingNewPatients",
];
const DOCTOR_ADMIN: &[&str] = &[
    "specializations",
    "experienceYears",
    "education",
    "languages",
    "bio",
    "availability",
    "consultationFee",
    "isAcceptingNewPatients",
    "licenseNumber",
    "isVerified",
];

const APPOINTMENT_PATIENT: &[&str] = &["appointmentDate", "duration", "reason", "symptoms"];
const APPOINTMENT_DOCTOR: &[&str] = &[
    "appointmentDate",
    "duration",
    "type",
    "status",
    "notes",
    "diagnosis",
    "prescription",
    "meetingLink",
    "location",
    "cancellationReason",
];
const APPOINTMENT_ADMIN: &[&str] = &[
    "appointmentDate",
    "duration",
    "type",
    "status",
    "reason",
    "symptoms",
    "notes",
    "diagnosis",
    "prescription",
    "meetingLink",
    "location",
    "cancellationReason",
    "paymentStatus",
    "paymentAmount",
];

const USER_SELF: &[&str] = &["firstName", "lastName"];
const USER_ADMIN: &[&str] = &["firstName", "lastName", "isActive", "isVerified"];

lazy_static! {
    static ref WRITABLE_FIELDS: FieldTable = {
        let mut t: FieldTable = HashMap::new();
        t.insert(
            Entity::User,
            HashMap::from([
                (Role::Patient, USER_SELF),
                (Role::Doctor, USER_SELF),
                (Role::Admin, USER_ADMIN),
            ]),
        );
        t.insert(
            Entity::Patient,
            HashMap::from([
                (Role::Patient, PATIENT_SELF),
                (Role::Doctor, PATIENT_CLINICAL),
                (Role::Admin, PATIENT_SELF),
            ]),
        );
        t.insert(
            Entity::Doctor,
            HashMap::from([(Role::Doctor, DOCTOR_SELF), (Role::Admin, DOCTOR_ADMIN)]),
        );
        t.insert(
            Entity::Appointment,
            HashMap::from([
                (Role::Patient, APPOINTMENT_PATIENT),
                (Role::Doctor, APPOINTMENT_DOCTOR),
                (Role::Admin, APPOINTMENT_ADMIN),
            ]),
        );
        t
    };
}

/// Fields `role` may write on `entity`; empty when the role has no entry.
pub fn writable_fields(entity: Entity, role: Role) -> &'static [&'static str] {
    WRITABLE_FIELDS
        .get(&entity)
        .and_then(|by_role| by_role.get(&role))
        .copied()
        .unwrap_or(&[])
}

pub fn can_write(entity: Entity, role: Role, field: &str) -> bool {
    writable_fields(entity, role).contains(&field)
}

/// Keeps the keys of `payload` that `role` may write on `entity`.
pub fn filter_update(
    entity: Entity,
    role: Role,
    payload: Map<String, Value>,
) -> Map<String, Value> {
    let allowed = writable_fields(entity, role);
    let mut kept = Map::new();
    let mut dropped = Vec::new();
    for (key, value) in payload {
        if allowed.contains(&key.as_str()) {
            kept.insert(key, value);
        } else {
            dropped.push(key);
        }
    }
    if !dropped.is_empty() {
        debug!(?entity, %role, ?dropped, "dropped non-writable fields");
    }
    kept
}

/// Decodes a filtered payload into a typed patch, reporting bad values as
/// validation errors.
pub fn into_patch<T: DeserializeOwned>(filtered: Map<String, Value>) -> AppResult<T> {
    serde_json::from_value(Value::Object(filtered))
        .map_err(|e| AppError::validation(format!("invalid field value: {e}")))
}
