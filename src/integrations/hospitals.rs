use std::time::Duration;

use anyhow::Context;
use axum::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Hospital {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    #[serde(default = "default_radius_km")]
    pub radius: f64,
}

fn default_radius_km() -> f64 {
    5.0
}

impl NearbyQuery {
    pub fn validate(&self) -> Result<(), String> {
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lng) {
            return Err("lat/lng out of range".into());
        }
        if !self.radius.is_finite() || self.radius <= 0.0 || self.radius > 100.0 {
            return Err("radius must be between 0 and 100 km".into());
        }
        Ok(())
    }
}

#[async_trait]
pub trait HospitalLookup: Send + Sync {
    async fn nearby(&self, query: NearbyQuery) -> anyhow::Result<Vec<Hospital>>;
}

#[derive(Clone)]
pub struct HttpHospitalLookup {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl HttpHospitalLookup {
    pub fn new(base_url: Option<String>, timeout_secs: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("build hospitals http client")?;
        Ok(Self { http, base_url })
    }
}

#[async_trait]
impl HospitalLookup for HttpHospitalLookup {
    async fn nearby(&self, query: NearbyQuery) -> anyhow::Result<Vec<Hospital>> {
        let base = self
            .base_url
            .as_deref()
            .context("hospitals lookup is not configured")?;
        self.http
            .get(base)
            .query(&query)
            .send()
            .await
            .context("hospitals request")?
            .error_for_status()
            .context("hospitals status")?
            .json()
            .await
            .context("hospitals body")
    }
}

/// Lookup failures and timeouts degrade to an empty list.
pub async fn nearby_or_empty(lookup: &dyn HospitalLookup, query: NearbyQuery) -> Vec<Hospital> {
    match lookup.nearby(query).await {
        Ok(list) => list,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "hospital lookup failed, returning empty list");
            Vec::new()
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct FakeHospitals(pub Vec<Hospital>);

    #[async_trait]
    impl HospitalLookup for FakeHospitals {
        async fn nearby(&self, _query: NearbyQuery) -> anyhow::Result<Vec<Hospital>> {
            Ok(self.0.clone())
        }
    }

    struct Slow;

    #[async_trait]
    impl HospitalLookup for Slow {
        async fn nearby(&self, _query: NearbyQuery) -> anyhow::Result<Vec<Hospital>> {
            anyhow::bail!("operation timed out")
        }
    }

    fn query() -> NearbyQuery {
        NearbyQuery {
            lat: 52.52,
            lng: 13.40,
            radius: 5.0,
        }
    }

    #[tokio::test]
    async fn failure_falls_back_to_empty() {
        assert!(nearby_or_empty(&Slow, query()).await.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_lookup_is_empty() {
        let lookup = HttpHospitalLookup::new(None, 1).unwrap();
        assert!(nearby_or_empty(&lookup, query()).await.is_empty());
    }

    #[test]
    fn query_bounds() {
        assert!(query().validate().is_ok());
        let mut q = query();
        q.lat = 91.0;
        assert!(q.validate().is_err());
        let mut q = query();
        q.radius = 0.0;
        assert!(q.validate().is_err());
    }
}
