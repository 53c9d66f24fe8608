use std::time::Duration;

use anyhow::Context;
use axum::async_trait;
use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnoseRequest {
    pub symptoms: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub condition: String,
    pub probability: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub medications: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    pub suggestions: Vec<Suggestion>,
    pub confidence: f64,
    #[serde(default)]
    pub analysis: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    pub diagnosis: String,
    #[serde(default)]
    pub conditions: Vec<String>,
    pub confidence: f64,
    #[serde(default)]
    pub findings: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl ImageAnalysis {
    /// Coarse severity bucket stored alongside a report's analysis.
    pub fn severity(&self) -> &'static str {
        match self.conditions.len() {
            0 => "low",
            1 | 2 => "medium",
            _ => "high",
        }
    }
}

#[async_trait]
pub trait AiClient: Send + Sync {
    async fn is_available(&self) -> bool;
    async fn diagnose(&self, req: &DiagnoseRequest) -> anyhow::Result<Diagnosis>;
    async fn analyze_image(
        &self,
        image: &[u8],
        content_type: &str,
    ) -> anyhow::Result<ImageAnalysis>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeImageBody<'a> {
    image: String,
    content_type: &'a str,
}

/// HTTP client for the diagnosis service. Without a base URL every probe
/// reports unavailable.
#[derive(Clone)]
pub struct HttpAiClient {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl HttpAiClient {
    pub fn new(base_url: Option<String>, timeout_secs: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("build ai http client")?;
        Ok(Self {
            http,
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        })
    }

    fn url(&self, path: &str) -> anyhow::Result<String> {
        let base = self
            .base_url
            .as_deref()
            .context("ai service is not configured")?;
        Ok(format!("{base}{path}"))
    }
}

#[async_trait]
impl AiClient for HttpAiClient {
    async fn is_available(&self) -> bool {
        let Ok(url) = self.url("/health") else {
            return false;
        };
        match self.http.get(&url).send().await {
            Ok(res) => res.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "ai health probe failed");
                false
            }
        }
    }

    async fn diagnose(&self, req: &DiagnoseRequest) -> anyhow::Result<Diagnosis> {
        let res = self
            .http
            .post(self.url("/diagnose")?)
            .json(req)
            .send()
            .await
            .context("ai diagnose request")?
            .error_for_status()
            .context("ai diagnose status")?;
        res.json::<Diagnosis>().await.context("ai diagnose body")
    }

    async fn analyze_image(
        &self,
        image: &[u8],
        content_type: &str,
    ) -> anyhow::Result<ImageAnalysis> {
        let body = AnalyzeImageBody {
            image: Base64::encode_string(image),
            content_type,
        };
        let res = self
            .http
            .post(self.url("/analyze-image")?)
            .json(&body)
            .send()
            .await
            .context("ai analyze-image request")?
            .error_for_status()
            .context("ai analyze-image status")?;
        res.json::<ImageAnalysis>().await.context("ai analyze-image body")
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Canned answers; `available = false` makes every call fail.
    pub(crate) struct FakeAi {
        pub available: bool,
    }

    #[async_trait]
    impl AiClient for FakeAi {
        async fn is_available(&self) -> bool {
            self.available
        }

        async fn diagnose(&self, req: &DiagnoseRequest) -> anyhow::Result<Diagnosis> {
            anyhow::ensure!(self.available, "ai offline");
            Ok(Diagnosis {
                suggestions: req
                    .symptoms
                    .iter()
                    .map(|s| Suggestion {
                        condition: format!("{s}-related condition"),
                        probability: 0.5,
                        description: None,
                        recommendations: vec![],
                        medications: vec![],
                    })
                    .collect(),
                confidence: 0.5,
                analysis: "fake".into(),
            })
        }

        async fn analyze_image(&self, _image: &[u8], _ct: &str) -> anyhow::Result<ImageAnalysis> {
            anyhow::ensure!(self.available, "ai offline");
            Ok(ImageAnalysis {
                diagnosis: "normal".into(),
                conditions: vec![],
                confidence: 0.9,
                findings: vec!["no abnormality".into()],
                recommendations: vec![],
            })
        }
    }

    #[tokio::test]
    async fn unconfigured_client_is_unavailable() {
        let client = HttpAiClient::new(None, 1).unwrap();
        assert!(!client.is_available().await);
        let err = client
            .diagnose(&DiagnoseRequest {
                symptoms: vec!["cough".into()],
                description: None,
                patient_id: None,
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn diagnosis_accepts_sparse_suggestions() {
        let d: Diagnosis = serde_json::from_value(serde_json::json!({
            "suggestions": [{"condition": "flu", "probability": 0.7}],
            "confidence": 0.7
        }))
        .unwrap();
        assert_eq!(d.suggestions[0].condition, "flu");
        assert!(d.suggestions[0].medications.is_empty());
    }

    #[test]
    fn severity_grows_with_conditions() {
        let mut a = ImageAnalysis {
            diagnosis: "x".into(),
            conditions: vec![],
            confidence: 0.5,
            findings: vec![],
            recommendations: vec![],
        };
        assert_eq!(a.severity(), "low");
        a.conditions = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(a.severity(), "high");
    }
}
