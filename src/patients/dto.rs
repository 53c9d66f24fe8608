use serde::Serialize;

use super::repo_types::Patient;
use crate::auth::repo_types::User;

/// Patient record together with the owning account's public fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientProfile {
    #[serde(flatten)]
    pub patient: Patient,
    pub user: User,
}
