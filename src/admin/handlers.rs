use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        extractors::{AdminOnly, Authorized},
        repo_types::{Role, User},
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/:uid", delete(delete_user))
        .route("/admin/users/:uid/deactivate", post(deactivate_user))
        .route("/admin/users/:uid/activate", post(activate_user))
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub role: Option<Role>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

/// Admins cannot lock themselves out.
fn ensure_not_self(admin: &User, target: &User) -> AppResult<()> {
    if admin.id == target.id {
        return Err(AppError::validation_code(
            "SELF_ACTION",
            "Admins cannot deactivate or delete their own account",
        ));
    }
    Ok(())
}

async fn load(state: &AppState, uid: &str) -> AppResult<User> {
    User::find_by_uid(&state.db, uid)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

#[instrument(skip(state, _auth))]
pub async fn list_users(
    State(state): State<AppState>,
    _auth: Authorized<AdminOnly>,
    Query(q): Query<UserQuery>,
) -> AppResult<Json<Vec<User>>> {
    let users = User::list(&state.db, q.role, q.limit.clamp(1, 200), q.offset.max(0)).await?;
    Ok(Json(users))
}

async fn set_active(state: &AppState, admin: &User, uid: &str, active: bool) -> AppResult<User> {
    let mut target = load(state, uid).await?;
    if !active {
        ensure_not_self(admin, &target)?;
    }
    User::set_active(&state.db, target.id, active).await?;
    target.is_active = active;
    info!(admin_id = %admin.id, user_id = %target.id, active, "account status changed");
    Ok(target)
}

#[instrument(skip(state, auth))]
pub async fn deactivate_user(
    State(state): State<AppState>,
    auth: Authorized<AdminOnly>,
    Path(uid): Path<String>,
) -> AppResult<Json<User>> {
    Ok(Json(set_active(&state, &auth.user, &uid, false).await?))
}

#[instrument(skip(state, auth))]
pub async fn activate_user(
    State(state): State<AppState>,
    auth: Authorized<AdminOnly>,
    Path(uid): Path<String>,
) -> AppResult<Json<User>> {
    Ok(Json(set_active(&state, &auth.user, &uid, true).await?))
}

#[instrument(skip(state, auth))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: Authorized<AdminOnly>,
    Path(uid): Path<String>,
) -> AppResult<StatusCode> {
    let target = load(&state, &uid).await?;
    ensure_not_self(&auth.user, &target)?;
    if !User::delete(&state.db, target.id).await? {
        warn!(user_id = %target.id, "user vanished before delete");
        return Err(AppError::not_found("User not found"));
    }
    info!(admin_id = %auth.user.id, user_id = %target.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::tests::sample_user;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    #[test]
    fn admins_cannot_target_themselves() {
        let admin = sample_user(Role::Admin);
        assert_eq!(
            ensure_not_self(&admin, &admin).unwrap_err().code(),
            "SELF_ACTION"
        );
        assert!(ensure_not_self(&admin, &sample_user(Role::Patient)).is_ok());
    }

    #[test]
    fn role_filter_decodes() {
        let q: UserQuery = serde_json::from_value(serde_json::json!({"role": "doctor"})).unwrap();
        assert_eq!(q.role, Some(Role::Doctor));
        assert_eq!(q.limit, 50);
    }

    #[tokio::test]
    async fn listing_requires_a_credential() {
        let app = routes().with_state(AppState::fake());
        let res = app
            .oneshot(Request::get("/admin/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
