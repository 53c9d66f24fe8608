use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub const BLOCKING: [AppointmentStatus; 3] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }

    /// Whether an appointment in this status occupies its doctor's time.
    pub fn blocks_slot(&self) -> bool {
        Self::BLOCKING.contains(self)
    }
}

impl FromStr for AppointmentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "scheduled" => Self::Scheduled,
            "confirmed" => Self::Confirmed,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            "no_show" => Self::NoShow,
            other => anyhow::bail!("unknown appointment status {other:?}"),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentType {
    Consultation,
    Followup,
    Emergency,
    Checkup,
}

impl AppointmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentType::Consultation => "consultation",
            AppointmentType::Followup => "followup",
            AppointmentType::Emergency => "emergency",
            AppointmentType::Checkup => "checkup",
        }
    }
}

impl FromStr for AppointmentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "consultation" => Self::Consultation,
            "followup" => Self::Followup,
            "emergency" => Self::Emergency,
            "checkup" => Self::Checkup,
            other => anyhow::bail!("unknown appointment type {other:?}"),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Self::Pending,
            "paid" => Self::Paid,
            "refunded" => Self::Refunded,
            "failed" => Self::Failed,
            other => anyhow::bail!("unknown payment status {other:?}"),
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AppointmentRow {
    pub id: Uuid,
    pub uid: String,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: OffsetDateTime,
    pub duration: i32,
    pub appointment_type: String,
    pub status: String,
    pub reason: String,
    pub symptoms: Vec<String>,
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub payment_status: String,
    pub payment_amount: Option<f64>,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<OffsetDateTime>,
    pub rescheduled_from: Option<String>,
    pub ai_insights: Option<serde_json::Value>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Booking record. Serialized in the camelCase interop shape; the internal
/// primary key stays private and `uid` is the public id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(skip_serializing)]
    pub id: Uuid,
    pub uid: String,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub appointment_date: OffsetDateTime,
    pub duration: i32,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    pub reason: String,
    pub symptoms: Vec<String>,
    pub notes: Option<String>,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub payment_status: PaymentStatus,
    pub payment_amount: Option<f64>,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
    pub cancelled_by: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub cancelled_at: Option<OffsetDateTime>,
    pub rescheduled_from: Option<String>,
    pub ai_insights: Option<serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = anyhow::Error;

    fn try_from(r: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            uid: r.uid,
            patient_id: r.patient_id,
            doctor_id: r.doctor_id,
            appointment_date: r.appointment_date,
            duration: r.duration,
            appointment_type: r.appointment_type.parse()?,
            status: r.status.parse()?,
            reason: r.reason,
            symptoms: r.symptoms,
            notes: r.notes,
            diagnosis: r.diagnosis,
            prescription: r.prescription,
            payment_status: r.payment_status.parse()?,
            payment_amount: r.payment_amount,
            meeting_link: r.meeting_link,
            location: r.location,
            cancelled_by: r.cancelled_by,
            cancellation_reason: r.cancellation_reason,
            cancelled_at: r.cancelled_at,
            rescheduled_from: r.rescheduled_from,
            ai_insights: r.ai_insights,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Values written when a booking is created.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: OffsetDateTime,
    pub duration: i32,
    pub appointment_type: AppointmentType,
    pub reason: String,
    pub symptoms: Vec<String>,
    pub meeting_link: Option<String>,
    pub location: Option<String>,
    pub payment_amount: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip_through_the_database_form() {
        for s in [
            AppointmentStatus::Scheduled,
            AppointmentStatus::Confirmed,
            AppointmentStatus::InProgress,
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled,
            AppointmentStatus::NoShow,
        ] {
            assert_eq!(s.as_str().parse::<AppointmentStatus>().unwrap(), s);
            assert_eq!(serde_json::to_value(s).unwrap(), s.as_str());
        }
        assert!("done".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn blocking_statuses() {
        assert!(AppointmentStatus::InProgress.blocks_slot());
        assert!(!AppointmentStatus::Completed.blocks_slot());
        assert!(!AppointmentStatus::NoShow.blocks_slot());
    }
}
