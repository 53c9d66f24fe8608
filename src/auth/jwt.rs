use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::{
    claims::{Claims, TokenKind},
    errors::AuthError,
    repo_types::User,
};
use crate::{config::JwtConfig, state::AppState};

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs((cfg.ttl_minutes.max(0) as u64) * 60),
            refresh_ttl: Duration::from_secs((cfg.refresh_ttl_minutes.max(0) as u64) * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

impl JwtKeys {
    fn sign_with_kind(&self, user: &User, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user.id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user: &User) -> anyhow::Result<String> {
        self.sign_with_kind(user, TokenKind::Access)
    }

    pub fn sign_refresh(&self, user: &User) -> anyhow::Result<String> {
        self.sign_with_kind(user, TokenKind::Refresh)
    }

    /// Decode and validate signature, expiry, issuer and audience.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            }
        })?;
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Access {
            return Err(AuthError::WrongTokenKind);
        }
        Ok(claims)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.verify(token)?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::WrongTokenKind);
        }
        Ok(claims)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::repo_types::Role;
    use uuid::Uuid;

    pub(crate) fn jwt_config(secret: &str, issuer: &str, audience: &str) -> JwtConfig {
        JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
            cookie_name: "auth_token".into(),
        }
    }

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from(&jwt_config(secret, issuer, audience))
    }

    pub(crate) fn sample_user(role: Role) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            uid: "USR-TEST0001".into(),
            email: "someone@example.com".into(),
            password_hash: None,
            first_name: "Sam".into(),
            last_name: "Lee".into(),
            role,
            is_active: true,
            is_verified: true,
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Token whose `exp` lies well past the default validation leeway.
    pub(crate) fn expired_token(keys: &JwtKeys, user: &User) -> String {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: (now - 7200) as usize,
            exp: (now - 3600) as usize,
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
            kind: TokenKind::Access,
        };
        encode(&Header::default(), &claims, &keys.encoding).unwrap()
    }

    #[test]
    fn sign_and_verify_access_token() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let user = sample_user(Role::Doctor);
        let token = keys.sign_access(&user).expect("sign access");
        let claims = keys.verify_access(&token).expect("verify token");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, Role::Doctor);
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let user = sample_user(Role::Patient);
        let refresh = keys.sign_refresh(&user).expect("sign refresh");
        assert_eq!(keys.verify_refresh(&refresh).unwrap().sub, user.id);
        assert_eq!(keys.verify_access(&refresh).unwrap_err(), AuthError::WrongTokenKind);

        let access = keys.sign_access(&user).expect("sign access");
        assert_eq!(keys.verify_refresh(&access).unwrap_err(), AuthError::WrongTokenKind);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let keys = make_keys("dev-secret", "iss", "aud");
        let token = expired_token(&keys, &sample_user(Role::Patient));
        assert_eq!(keys.verify(&token).unwrap_err(), AuthError::ExpiredToken);
    }

    #[test]
    fn wrong_secret_or_garbage_is_invalid() {
        let good = make_keys("secret-a", "iss", "aud");
        let bad = make_keys("secret-b", "iss", "aud");
        let token = good.sign_access(&sample_user(Role::Admin)).unwrap();
        assert_eq!(bad.verify(&token).unwrap_err(), AuthError::InvalidToken);
        assert_eq!(good.verify("not.a.jwt").unwrap_err(), AuthError::InvalidToken);
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good = make_keys("same-secret", "good-iss", "good-aud");
        let other = make_keys("same-secret", "bad-iss", "bad-aud");
        let token = good.sign_access(&sample_user(Role::Patient)).unwrap();
        assert_eq!(other.verify(&token).unwrap_err(), AuthError::InvalidToken);
    }
}
