use std::marker::PhantomData;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use axum_extra::extract::CookieJar;
use tracing::warn;

use super::{
    errors::AuthError,
    jwt::JwtKeys,
    repo_types::{Role, User},
};
use crate::{error::AppError, state::AppState};

/// Reads the credential from `Authorization: Bearer <token>`, falling back to
/// the named cookie.
pub fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }
    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

/// Accepts only a present, active account.
pub fn ensure_active(user: Option<User>) -> Result<User, AuthError> {
    let user = user.ok_or(AuthError::UserNotFound)?;
    if !user.is_active {
        return Err(AuthError::AccountDeactivated);
    }
    Ok(user)
}

/// Empty `allowed` means any authenticated role.
pub fn ensure_role(role: Role, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.is_empty() || allowed.contains(&role) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

/// Authenticated, active user. Rejects with the gate's error response before
/// the handler runs.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers, &state.config.jwt.cookie_name)
            .ok_or(AuthError::MissingCredential)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify_access(&token).map_err(|e| {
            warn!(reason = %e, "rejected credential");
            e
        })?;

        let user = User::find_by_id(&state.db, claims.sub).await?;
        let user = ensure_active(user).map_err(|e| {
            warn!(user_id = %claims.sub, reason = %e, "rejected account");
            e
        })?;
        Ok(AuthUser(user))
    }
}

/// Role set accepted by [`Authorized`].
pub trait RoleSet: Send + Sync + 'static {
    const ALLOWED: &'static [Role];
}

pub struct AdminOnly;
impl RoleSet for AdminOnly {
    const ALLOWED: &'static [Role] = &[Role::Admin];
}

pub struct PatientsOnly;
impl RoleSet for PatientsOnly {
    const ALLOWED: &'static [Role] = &[Role::Patient];
}

pub struct DoctorsAndAdmins;
impl RoleSet for DoctorsAndAdmins {
    const ALLOWED: &'static [Role] = &[Role::Doctor, Role::Admin];
}

/// [`AuthUser`] further restricted to the roles in `R`.
pub struct Authorized<R: RoleSet> {
    pub user: User,
    _roles: PhantomData<R>,
}

#[async_trait]
impl<R: RoleSet> FromRequestParts<AppState> for Authorized<R> {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        ensure_role(user.role, R::ALLOWED).map_err(|e| {
            warn!(user_id = %user.id, role = %user.role, "role not permitted");
            e
        })?;
        Ok(Authorized {
            user,
            _roles: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::tests::sample_user;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        headers.insert(header::COOKIE, HeaderValue::from_static("auth_token=from-cookie"));
        assert_eq!(extract_token(&headers, "auth_token").as_deref(), Some("abc.def"));
    }

    #[test]
    fn cookie_is_used_without_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; auth_token=tok123"),
        );
        assert_eq!(extract_token(&headers, "auth_token").as_deref(), Some("tok123"));
        assert_eq!(extract_token(&headers, "other"), None);
    }

    #[test]
    fn non_bearer_scheme_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(extract_token(&headers, "auth_token"), None);
    }

    #[test]
    fn inactive_or_missing_accounts_are_rejected() {
        assert_eq!(ensure_active(None).unwrap_err(), AuthError::UserNotFound);

        let mut user = sample_user(Role::Patient);
        user.is_active = false;
        assert_eq!(ensure_active(Some(user)).unwrap_err(), AuthError::AccountDeactivated);

        assert!(ensure_active(Some(sample_user(Role::Patient))).is_ok());
    }

    #[test]
    fn role_sets_gate_by_role() {
        assert!(ensure_role(Role::Admin, AdminOnly::ALLOWED).is_ok());
        assert_eq!(
            ensure_role(Role::Doctor, AdminOnly::ALLOWED).unwrap_err(),
            AuthError::Forbidden
        );
        assert!(ensure_role(Role::Doctor, DoctorsAndAdmins::ALLOWED).is_ok());
        assert!(ensure_role(Role::Patient, PatientsOnly::ALLOWED).is_ok());
        assert!(ensure_role(Role::Patient, &[]).is_ok());
    }
}
