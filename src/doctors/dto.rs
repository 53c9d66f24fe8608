use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorQuery {
    pub specialization: Option<String>,
    #[serde(default)]
    pub accepting: bool,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    /// Clinic-local day, `YYYY-MM-DD`.
    pub date: String,
    #[serde(default = "default_slot_minutes")]
    pub duration: i64,
    #[serde(default = "default_slot_minutes")]
    pub step: i64,
}

fn default_slot_minutes() -> i64 {
    30
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotsResponse {
    pub doctor_id: Uuid,
    pub date: String,
    pub duration: i64,
    #[serde(with = "rfc3339_list")]
    pub slots: Vec<OffsetDateTime>,
}

mod rfc3339_list {
    use serde::{ser::SerializeSeq, Serializer};
    use time::{format_description::well_known::Rfc3339, OffsetDateTime};

    pub fn serialize<S: Serializer>(v: &[OffsetDateTime], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(v.len()))?;
        for dt in v {
            let text = dt.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
            seq.serialize_element(&text)?;
        }
        seq.end()
    }
}
