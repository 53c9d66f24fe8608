use serde::{Deserialize, Serialize};

use super::repo_types::{Role, User};

fn default_role() -> Role {
    Role::Patient
}

/// Request body for registration. Doctor accounts carry their profile
/// basics; patient accounts get an empty clinical profile.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default = "default_role")]
    pub role: Role,
    pub license_number: Option<String>,
    #[serde(default)]
    pub specializations: Vec<String>,
    #[serde(default)]
    pub experience_years: i32,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub consultation_fee: f64,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Response returned after login, register or refresh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::tests::sample_user;

    #[test]
    fn register_defaults_to_patient() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "a@b.co",
            "password": "longenough",
            "firstName": "A",
            "lastName": "B"
        }))
        .unwrap();
        assert_eq!(req.role, Role::Patient);
        assert!(req.license_number.is_none());
    }

    #[test]
    fn auth_response_hides_password_hash() {
        let mut user = sample_user(Role::Patient);
        user.password_hash = Some("$argon2id$secret".into());
        let json = serde_json::to_string(&AuthResponse {
            access_token: "a".into(),
            refresh_token: "r".into(),
            user,
        })
        .unwrap();
        assert!(json.contains("accessToken"));
        assert!(!json.contains("argon2"));
    }
}
