use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

pub const BLOOD_TYPES: [&str; 8] = ["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyContact {
    pub name: String,
    pub relationship: Option<String>,
    pub phone: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct MedicalHistory {
    pub allergies: Vec<String>,
    pub conditions: Vec<String>,
    pub medications: Vec<String>,
    pub surgeries: Vec<String>,
    pub family_history: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Insurance {
    pub provider: String,
    pub policy_number: String,
    pub group_number: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Lifestyle {
    pub smoker: bool,
    pub alcohol: bool,
    pub exercise: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct PatientRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub emergency_contact: Option<Json<EmergencyContact>>,
    pub medical_history: Json<MedicalHistory>,
    pub insurance: Option<Json<Insurance>>,
    pub blood_type: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub lifestyle: Json<Lifestyle>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Clinical profile attached 1:1 to a patient account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub user_id: Uuid,
    pub emergency_contact: Option<EmergencyContact>,
    pub medical_history: MedicalHistory,
    pub insurance: Option<Insurance>,
    pub blood_type: Option<String>,
    #[serde(rename = "height")]
    pub height_cm: Option<f64>,
    #[serde(rename = "weight")]
    pub weight_kg: Option<f64>,
    pub lifestyle: Lifestyle,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<PatientRow> for Patient {
    fn from(r: PatientRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            emergency_contact: r.emergency_contact.map(|j| j.0),
            medical_history: r.medical_history.0,
            insurance: r.insurance.map(|j| j.0),
            blood_type: r.blood_type,
            height_cm: r.height_cm,
            weight_kg: r.weight_kg,
            lifestyle: r.lifestyle.0,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Deserialized from an already permission-filtered payload.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientPatch {
    pub emergency_contact: Option<EmergencyContact>,
    pub medical_history: Option<MedicalHistory>,
    pub insurance: Option<Insurance>,
    pub blood_type: Option<String>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub lifestyle: Option<Lifestyle>,
}

fn positive(value: f64, field: &str) -> Result<f64, String> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("{field} must be a positive number"))
    }
}

impl Patient {
    pub fn apply(&mut self, patch: PatientPatch) -> Result<(), String> {
        if let Some(bt) = patch.blood_type {
            if !BLOOD_TYPES.contains(&bt.as_str()) {
                return Err(format!("bloodType must be one of {}", BLOOD_TYPES.join(", ")));
            }
            self.blood_type = Some(bt);
        }
        if let Some(h) = patch.height {
            self.height_cm = Some(positive(h, "height")?);
        }
        if let Some(w) = patch.weight {
            self.weight_kg = Some(positive(w, "weight")?);
        }
        if let Some(contact) = patch.emergency_contact {
            if contact.name.trim().is_empty() || contact.phone.trim().is_empty() {
                return Err("emergencyContact requires name and phone".into());
            }
            self.emergency_contact = Some(contact);
        }
        if let Some(history) = patch.medical_history {
            self.medical_history = history;
        }
        if let Some(insurance) = patch.insurance {
            self.insurance = Some(insurance);
        }
        if let Some(lifestyle) = patch.lifestyle {
            self.lifestyle = lifestyle;
        }
        Ok(())
    }
}
