use bytes::Bytes;
use serde::Deserialize;
use uuid::Uuid;

use super::repo_types::ReportType;

/// A report upload after the multipart body has been read.
#[derive(Debug, Clone)]
pub struct ReportUpload {
    pub title: String,
    pub report_type: ReportType,
    pub description: Option<String>,
    pub patient_id: Option<Uuid>,
    pub appointment_uid: Option<String>,
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportListQuery {
    pub patient_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}
