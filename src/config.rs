use anyhow::Context;
use serde::Deserialize;
use time::{macros::format_description, UtcOffset};

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
    pub cookie_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

/// Endpoints of the external collaborators. A missing URL disables the
/// corresponding integration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    pub ai_url: Option<String>,
    pub ai_timeout_secs: u64,
    pub blockchain_url: Option<String>,
    pub hospitals_url: Option<String>,
    pub hospitals_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub services: ServicesConfig,
    /// Offset used to derive the clinic-local weekday and clock time of a booking.
    pub clinic_offset: UtcOffset,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "carepoint".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "carepoint-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES").unwrap_or(60 * 24 * 14),
            cookie_name: std::env::var("AUTH_COOKIE_NAME").unwrap_or_else(|_| "auth_token".into()),
        };
        let storage = StorageConfig {
            endpoint: std::env::var("MINIO_ENDPOINT").context("MINIO_ENDPOINT")?,
            bucket: std::env::var("MINIO_BUCKET").unwrap_or_else(|_| "carepoint-reports".into()),
            access_key: std::env::var("MINIO_ACCESS_KEY").context("MINIO_ACCESS_KEY")?,
            secret_key: std::env::var("MINIO_SECRET_KEY").context("MINIO_SECRET_KEY")?,
            region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };
        let services = ServicesConfig {
            ai_url: env_opt("AI_SERVICE_URL"),
            ai_timeout_secs: env_parse("AI_TIMEOUT_SECS").unwrap_or(10),
            blockchain_url: env_opt("BLOCKCHAIN_SERVICE_URL"),
            hospitals_url: env_opt("HOSPITALS_LOOKUP_URL"),
            hospitals_timeout_secs: env_parse("HOSPITALS_TIMEOUT_SECS").unwrap_or(5),
        };
        let clinic_offset = match std::env::var("CLINIC_UTC_OFFSET") {
            Ok(raw) => parse_utc_offset(&raw)?,
            Err(_) => UtcOffset::UTC,
        };
        Ok(Self {
            database_url,
            jwt,
            storage,
            services,
            clinic_offset,
        })
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

/// Parses offsets written as `+05:30` / `-03:00`; `Z` and `UTC` mean zero.
pub fn parse_utc_offset(raw: &str) -> anyhow::Result<UtcOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(
        raw,
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .with_context(|| format!("invalid CLINIC_UTC_OFFSET {raw:?}"))
}
