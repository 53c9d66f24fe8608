use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::scheduling::availability::AvailabilityWindow;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    pub degree: String,
    pub institution: String,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DoctorRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub license_number: String,
    pub specializations: Vec<String>,
    pub experience_years: i32,
    pub education: Json<Vec<Education>>,
    pub languages: Vec<String>,
    pub bio: Option<String>,
    pub availability: Json<Vec<AvailabilityWindow>>,
    pub consultation_fee: f64,
    pub is_accepting_new_patients: bool,
    pub is_verified: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub license_number: String,
    pub specializations: Vec<String>,
    pub experience_years: i32,
    pub education: Vec<Education>,
    pub languages: Vec<String>,
    pub bio: Option<String>,
    pub availability: Vec<AvailabilityWindow>,
    pub consultation_fee: f64,
    pub is_accepting_new_patients: bool,
    pub is_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<DoctorRow> for Doctor {
    fn from(r: DoctorRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            license_number: r.license_number,
            specializations: r.specializations,
            experience_years: r.experience_years,
            education: r.education.0,
            languages: r.languages,
            bio: r.bio,
            availability: r.availability.0,
            consultation_fee: r.consultation_fee,
            is_accepting_new_patients: r.is_accepting_new_patients,
            is_verified: r.is_verified,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Doctor profile joined with the owning account's name, for listings.
#[derive(Debug, Clone, FromRow)]
pub struct DoctorListingRow {
    #[sqlx(flatten)]
    pub doctor: DoctorRow,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorListing {
    #[serde(flatten)]
    pub doctor: Doctor,
    pub first_name: String,
    pub last_name: String,
}

impl From<DoctorListingRow> for DoctorListing {
    fn from(r: DoctorListingRow) -> Self {
        Self {
            doctor: r.doctor.into(),
            first_name: r.first_name,
            last_name: r.last_name,
        }
    }
}

/// Profile values captured at registration.
#[derive(Debug, Clone, Default)]
pub struct NewDoctor {
    pub license_number: String,
    pub specializations: Vec<String>,
    pub experience_years: i32,
    pub languages: Vec<String>,
    pub consultation_fee: f64,
}

/// Deserialized from an already permission-filtered payload.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorPatch {
    pub specializations: Option<Vec<String>>,
    pub experience_years: Option<i32>,
    pub education: Option<Vec<Education>>,
    pub languages: Option<Vec<String>>,
    pub bio: Option<String>,
    pub availability: Option<Vec<AvailabilityWindow>>,
    pub consultation_fee: Option<f64>,
    pub is_accepting_new_patients: Option<bool>,
    pub license_number: Option<String>,
    pub is_verified: Option<bool>,
}

impl Doctor {
    pub fn apply(&mut self, patch: DoctorPatch) -> Result<(), String> {
        if let Some(windows) = patch.availability {
            for w in &windows {
                w.validate()?;
            }
            self.availability = windows;
        }
        if let Some(years) = patch.experience_years {
            if years < 0 {
                return Err("experienceYears must not be negative".into());
            }
            self.experience_years = years;
        }
        if let Some(fee) = patch.consultation_fee {
            if !fee.is_finite() || fee < 0.0 {
                return Err("consultationFee must be a non-negative amount".into());
            }
            self.consultation_fee = fee;
        }
        if let Some(license) = patch.license_number {
            let license = license.trim();
            if license.is_empty() {
                return Err("licenseNumber must not be empty".into());
            }
            self.license_number = license.to_string();
        }
        if let Some(v) = patch.specializations {
            self.specializations = v;
        }
        if let Some(v) = patch.education {
            self.education = v;
        }
        if let Some(v) = patch.languages {
            self.languages = v;
        }
        if let Some(v) = patch.bio {
            self.bio = Some(v);
        }
        if let Some(v) = patch.is_accepting_new_patients {
            self.is_accepting_new_patients = v;
        }
        if let Some(v) = patch.is_verified {
            self.is_verified = v;
        }
        Ok(())
    }
}
