use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest},
        extractors::{ensure_active, AuthUser},
        jwt::JwtKeys,
        password::{check_password_policy, hash_password, normalize_email, verify_password},
        repo_types::{NewUser, Role, User, UserPatch},
    },
    doctors::repo_types::{Doctor, NewDoctor},
    error::{AppError, AppResult},
    patients::repo_types::Patient,
    permissions::{filter_update, into_patch, Entity},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).patch(patch_me))
}

fn invalid_credentials() -> AppError {
    AppError::Unauthenticated {
        code: "INVALID_CREDENTIALS",
        message: "Invalid credentials".into(),
    }
}

/// Normalizes and checks a registration before anything is written.
pub fn validate_registration(req: &mut RegisterRequest) -> AppResult<()> {
    req.email = normalize_email(&req.email).ok_or_else(|| AppError::validation("Invalid email"))?;
    req.first_name = req.first_name.trim().to_string();
    req.last_name = req.last_name.trim().to_string();

    check_password_policy(&req.password).map_err(AppError::validation)?;
    if req.first_name.is_empty() || req.last_name.is_empty() {
        return Err(AppError::validation("firstName and lastName are required"));
    }
    match req.role {
        Role::Admin => Err(AppError::forbidden("Admin accounts cannot be self-registered")),
        Role::Doctor => {
            let license = req.license_number.as_deref().map(str::trim).unwrap_or("");
            if license.is_empty() {
                return Err(AppError::validation("licenseNumber is required for doctors"));
            }
            if req.experience_years < 0
                || !req.consultation_fee.is_finite()
                || req.consultation_fee < 0.0
            {
                return Err(AppError::validation(
                    "experienceYears and consultationFee must not be negative",
                ));
            }
            Ok(())
        }
        Role::Patient => Ok(()),
    }
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    let jwt = &state.config.jwt;
    Cookie::build((jwt.cookie_name.clone(), token))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(jwt.ttl_minutes))
        .build()
}

fn issue(state: &AppState, user: User) -> AppResult<(String, AuthResponse)> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(&user)?;
    let refresh_token = keys.sign_refresh(&user)?;
    Ok((
        access_token.clone(),
        AuthResponse {
            access_token,
            refresh_token,
            user,
        },
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(mut payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, CookieJar, Json<AuthResponse>)> {
    validate_registration(&mut payload).map_err(|e| {
        warn!(email = %payload.email, reason = %e, "registration rejected");
        e
    })?;

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::conflict("EMAIL_IN_USE", "Email already registered"));
    }

    let hash = hash_password(&payload.password)?;

    let mut tx = state.db.begin().await?;
    let user = User::create(
        &mut *tx,
        &NewUser {
            email: &payload.email,
            password_hash: Some(&hash),
            first_name: &payload.first_name,
            last_name: &payload.last_name,
            role: payload.role,
        },
    )
    .await?;
    match user.role {
        Role::Patient => {
            Patient::create(&mut *tx, user.id).await?;
        }
        Role::Doctor => {
            let profile = NewDoctor {
                license_number: payload
                    .license_number
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or_default()
                    .to_string(),
                specializations: payload.specializations,
                experience_years: payload.experience_years,
                languages: payload.languages,
                consultation_fee: payload.consultation_fee,
            };
            Doctor::create(&mut *tx, user.id, &profile).await?;
        }
        Role::Admin => {}
    }
    tx.commit().await?;

    info!(user_id = %user.id, email = %user.email, role = %user.role, "user registered");
    let (access, body) = issue(&state, user)?;
    Ok((
        StatusCode::CREATED,
        jar.add(session_cookie(&state, access)),
        Json(body),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(mut payload): Json<LoginRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    payload.email = normalize_email(&payload.email).ok_or_else(invalid_credentials)?;

    let Some(user) = User::find_by_email(&state.db, &payload.email).await? else {
        warn!(email = %payload.email, "login unknown email");
        return Err(invalid_credentials());
    };
    let Some(hash) = user.password_hash.as_deref() else {
        warn!(user_id = %user.id, "password login on account without password");
        return Err(invalid_credentials());
    };
    if !verify_password(&payload.password, hash) {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid_credentials());
    }
    let user = ensure_active(Some(user))?;

    User::touch_last_login(&state.db, user.id).await?;
    info!(user_id = %user.id, "user logged in");

    let (access, body) = issue(&state, user)?;
    Ok((jar.add(session_cookie(&state, access)), Json(body)))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<Json<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(reason = %e, "refresh rejected");
        e
    })?;
    let user = ensure_active(User::find_by_id(&state.db, claims.sub).await?)?;
    let (_, body) = issue(&state, user)?;
    Ok(Json(body))
}

#[instrument(skip(state, jar))]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, StatusCode) {
    let cookie = Cookie::build((state.config.jwt.cookie_name.clone(), ""))
        .path("/")
        .build();
    (jar.remove(cookie), StatusCode::NO_CONTENT)
}

#[instrument(skip(user))]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

#[instrument(skip(state, user, payload))]
pub async fn patch_me(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
    Json(payload): Json<Map<String, Value>>,
) -> AppResult<Json<User>> {
    let filtered = filter_update(Entity::User, user.role, payload);
    if filtered.is_empty() {
        return Ok(Json(user));
    }
    let patch: UserPatch = into_patch(filtered)?;
    user.apply(patch).map_err(AppError::validation)?;
    let saved = user.save(&state.db).await?;
    info!(user_id = %saved.id, "account updated");
    Ok(Json(saved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::tests::{expired_token, sample_user};
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    fn registration(role: Role) -> RegisterRequest {
        RegisterRequest {
            email: "  Someone@Example.COM ".into(),
            password: "correct horse 9".into(),
            first_name: " Sam ".into(),
            last_name: "Lee".into(),
            role,
            license_number: None,
            specializations: vec![],
            experience_years: 0,
            languages: vec![],
            consultation_fee: 0.0,
        }
    }

    #[test]
    fn registration_normalizes_email_and_names() {
        let mut req = registration(Role::Patient);
        validate_registration(&mut req).unwrap();
        assert_eq!(req.email, "someone@example.com");
        assert_eq!(req.first_name, "Sam");
    }

    #[test]
    fn admins_cannot_self_register() {
        let mut req = registration(Role::Admin);
        assert_eq!(validate_registration(&mut req).unwrap_err().code(), "FORBIDDEN");
    }

    #[test]
    fn doctors_need_a_license() {
        let mut req = registration(Role::Doctor);
        assert_eq!(
            validate_registration(&mut req).unwrap_err().code(),
            "VALIDATION_ERROR"
        );
        req.license_number = Some("MD-42".into());
        assert!(validate_registration(&mut req).is_ok());
    }

    #[test]
    fn short_password_is_rejected() {
        let mut req = registration(Role::Patient);
        req.password = "short".into();
        assert!(validate_registration(&mut req).is_err());
    }

    async fn call_me(headers: &[(&str, String)]) -> (StatusCode, Value) {
        let app = me_routes().with_state(AppState::fake());
        let mut req = Request::get("/me");
        for (k, v) in headers {
            req = req.header(*k, v);
        }
        let res = app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_credential_is_auth_required() {
        let (status, body) = call_me(&[]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTH_REQUIRED");
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn expired_token_is_reported() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = expired_token(&keys, &sample_user(Role::Patient));
        let (status, body) = call_me(&[("authorization", format!("Bearer {token}"))]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "TOKEN_EXPIRED");
    }

    #[tokio::test]
    async fn refresh_token_in_cookie_is_wrong_kind() {
        let state = AppState::fake();
        let keys = JwtKeys::from_ref(&state);
        let token = keys.sign_refresh(&sample_user(Role::Doctor)).unwrap();
        let (status, body) = call_me(&[("cookie", format!("auth_token={token}"))]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_TOKEN_TYPE");
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() {
        let (status, body) = call_me(&[("authorization", "Bearer nope".to_string())]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn logout_expires_the_cookie() {
        let app = auth_routes().with_state(AppState::fake());
        let res = app
            .oneshot(
                Request::post("/auth/logout")
                    .header("cookie", "auth_token=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let set_cookie = res
            .headers()
            .get("set-cookie")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(set_cookie.starts_with("auth_token="));
    }
}
