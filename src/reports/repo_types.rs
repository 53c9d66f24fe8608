use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Lab,
    Imaging,
    Prescription,
    Discharge,
    AiAnalysis,
    Other,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Lab => "lab",
            ReportType::Imaging => "imaging",
            ReportType::Prescription => "prescription",
            ReportType::Discharge => "discharge",
            ReportType::AiAnalysis => "ai_analysis",
            ReportType::Other => "other",
        }
    }
}

impl FromStr for ReportType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "lab" => Self::Lab,
            "imaging" => Self::Imaging,
            "prescription" => Self::Prescription,
            "discharge" => Self::Discharge,
            "ai_analysis" => Self::AiAnalysis,
            "other" => Self::Other,
            other => anyhow::bail!("unknown report type {other:?}"),
        })
    }
}

/// Condensed AI image analysis kept with the report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiSummary {
    pub severity: String,
    pub confidence: f64,
    pub findings: Vec<String>,
    pub conditions: Vec<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ReportRow {
    pub id: Uuid,
    pub uid: String,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub uploaded_by: Uuid,
    pub title: String,
    pub report_type: String,
    pub description: Option<String>,
    pub file_key: String,
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub ai_analysis: Option<Json<AiSummary>>,
    pub block_hash: Option<String>,
    pub chain_stored_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(skip_serializing)]
    pub id: Uuid,
    pub uid: String,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub uploaded_by: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub file_key: String,
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub ai_analysis: Option<AiSummary>,
    pub block_hash: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub chain_stored_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl TryFrom<ReportRow> for Report {
    type Error = anyhow::Error;

    fn try_from(r: ReportRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            uid: r.uid,
            patient_id: r.patient_id,
            doctor_id: r.doctor_id,
            appointment_id: r.appointment_id,
            uploaded_by: r.uploaded_by,
            title: r.title,
            report_type: r.report_type.parse()?,
            description: r.description,
            file_key: r.file_key,
            file_name: r.file_name,
            content_type: r.content_type,
            file_size: r.file_size,
            ai_analysis: r.ai_analysis.map(|j| j.0),
            block_hash: r.block_hash,
            chain_stored_at: r.chain_stored_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub uid: String,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub uploaded_by: Uuid,
    pub title: String,
    pub report_type: ReportType,
    pub description: Option<String>,
    pub file_key: String,
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
}
