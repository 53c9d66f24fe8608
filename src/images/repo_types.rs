use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageCategory {
    Xray,
    Scan,
    Photo,
    Document,
    #[default]
    Other,
}

impl ImageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageCategory::Xray => "xray",
            ImageCategory::Scan => "scan",
            ImageCategory::Photo => "photo",
            ImageCategory::Document => "document",
            ImageCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim().to_ascii_lowercase().as_str() {
            "xray" => Self::Xray,
            "scan" => Self::Scan,
            "photo" => Self::Photo,
            "document" => Self::Document,
            "other" => Self::Other,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ReportImageRow {
    pub id: Uuid,
    pub report_id: Uuid,
    pub s3_key: String,
    pub content_type: String,
    pub category: String,
    pub is_primary: bool,
    pub created_at: OffsetDateTime,
}

/// Image as returned to clients, with a short-lived download URL.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportImage {
    pub id: Uuid,
    pub category: ImageCategory,
    pub content_type: String,
    pub is_primary: bool,
    pub url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ReportImage {
    pub fn from_row(row: ReportImageRow, url: String) -> Self {
        Self {
            id: row.id,
            category: ImageCategory::parse(&row.category).unwrap_or_default(),
            content_type: row.content_type,
            is_primary: row.is_primary,
            url,
            created_at: row.created_at,
        }
    }
}
