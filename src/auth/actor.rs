use uuid::Uuid;

use super::repo_types::{Role, User};
use crate::{
    doctors::repo_types::Doctor, error::AppResult, patients::repo_types::Patient, state::AppState,
};

/// Authenticated user together with the id of their clinical profile, if any.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user: User,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
}

impl Actor {
    pub async fn resolve(st: &AppState, user: User) -> AppResult<Self> {
        let (patient_id, doctor_id) = match user.role {
            Role::Patient => (Patient::find_by_user(&st.db, user.id).await?.map(|p| p.id), None),
            Role::Doctor => (None, Doctor::find_by_user(&st.db, user.id).await?.map(|d| d.id)),
            Role::Admin => (None, None),
        };
        Ok(Self {
            user,
            patient_id,
            doctor_id,
        })
    }

    pub fn role(&self) -> Role {
        self.user.role
    }
}
