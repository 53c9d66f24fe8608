use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{AppointmentStatus, AppointmentType, PaymentStatus};

fn default_duration() -> i32 {
    30
}

fn default_type() -> AppointmentType {
    AppointmentType::Consultation
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub doctor_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub appointment_date: OffsetDateTime,
    #[serde(default = "default_duration")]
    pub duration: i32,
    #[serde(rename = "type", default = "default_type")]
    pub appointment_type: AppointmentType,
    pub reason: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
}

/// Typed view of an update payload after field filtering.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentPatch {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub appointment_date: Option<OffsetDateTime>,
    pub duration: Option<i32>,
    #[serde(rename = "type")]
    pub appointment_type: Option<AppointmentType>,
    pub status: Option<AppointmentStatus>,
    pub reason: Option<String>,
    pub symptoms: Option<Vec<String>>,
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
    pub cancellation_reason: Option<String>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_amount: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub status: Option<AppointmentStatus>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub from: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub to: Option<OffsetDateTime>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}
