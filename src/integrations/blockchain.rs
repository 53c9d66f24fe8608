use std::time::Duration;

use anyhow::Context;
use axum::async_trait;
use base64ct::{Base64, Encoding};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChainRecord {
    pub hash: String,
    #[serde(default)]
    pub previous_hash: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredBlock {
    pub block_hash: String,
    pub index: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainUpload<'a> {
    pub patient_id: Uuid,
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub metadata: serde_json::Value,
    pub labels: Vec<String>,
    pub tags: Vec<String>,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn records(&self, patient_id: Uuid) -> anyhow::Result<Vec<ChainRecord>>;
    async fn store(&self, upload: &ChainUpload<'_>, file: &[u8]) -> anyhow::Result<StoredBlock>;
    /// `None` when the ledger has no entry for the file.
    async fn verify(&self, file_id: &str) -> anyhow::Result<Option<serde_json::Value>>;
}

#[derive(Clone)]
pub struct HttpChainClient {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl HttpChainClient {
    pub fn new(base_url: Option<String>, timeout_secs: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("build blockchain http client")?;
        Ok(Self {
            http,
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    fn url(&self, path: &str) -> anyhow::Result<String> {
        let base = self
            .base_url
            .as_deref()
            .context("blockchain service is not configured")?;
        Ok(format!("{base}{path}"))
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn records(&self, patient_id: Uuid) -> anyhow::Result<Vec<ChainRecord>> {
        self.http
            .get(self.url(&format!("/records/{patient_id}"))?)
            .send()
            .await
            .context("chain records request")?
            .error_for_status()
            .context("chain records status")?
            .json()
            .await
            .context("chain records body")
    }

    async fn store(&self, upload: &ChainUpload<'_>, file: &[u8]) -> anyhow::Result<StoredBlock> {
        let mut body = serde_json::to_value(upload).context("encode chain upload")?;
        body["file"] = serde_json::Value::String(Base64::encode_string(file));
        self.http
            .post(self.url("/records")?)
            .json(&body)
            .send()
            .await
            .context("chain store request")?
            .error_for_status()
            .context("chain store status")?
            .json()
            .await
            .context("chain store body")
    }

    async fn verify(&self, file_id: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let res = self
            .http
            .get(self.url(&format!("/verify/{file_id}"))?)
            .send()
            .await
            .context("chain verify request")?;
        if res.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = res
            .error_for_status()
            .context("chain verify status")?
            .json()
            .await
            .context("chain verify body")?;
        Ok(Some(body))
    }
}
