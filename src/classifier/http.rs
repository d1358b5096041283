/// HTTP classifier client
use crate::{
    classifier::{AnalysisOutcome, ClassificationError, Classifier, ModelInfo},
    config::ClassifierConfig,
    error::{HerdError, HerdResult},
    records::AnalysisResult,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

/// Longest upstream error body echoed back into an error message
const MAX_ERROR_BODY: usize = 200;

/// Classifier reached over HTTP (`POST {image_path}` → prediction JSON)
#[derive(Clone)]
pub struct HttpClassifier {
    http_client: reqwest::Client,
    predict_url: String,
    model_info_url: String,
    timeout: Duration,
}

impl HttpClassifier {
    /// Create a client with the configured timeout
    pub fn new(config: &ClassifierConfig) -> HerdResult<Self> {
        Self::with_timeout(config, Duration::from_secs(config.timeout_secs))
    }

    pub fn with_timeout(config: &ClassifierConfig, timeout: Duration) -> HerdResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| HerdError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            predict_url: config.predict_url(),
            model_info_url: config.model_info_url(),
            timeout,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> ClassificationError {
        if e.is_timeout() {
            ClassificationError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else if e.is_decode() {
            ClassificationError::InvalidResponse(e.to_string())
        } else {
            ClassificationError::Unreachable(e.to_string())
        }
    }

    /// Turn a non-success response into an upstream error
    ///
    /// Prefers the `error` field of a JSON body, then the raw body, then the
    /// status reason phrase.
    async fn upstream_error(&self, response: reqwest::Response) -> ClassificationError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(Value::as_str).map(String::from))
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty()).then(|| trimmed.chars().take(MAX_ERROR_BODY).collect())
            })
            .unwrap_or_else(|| reason(status));

        ClassificationError::Upstream {
            status: status.as_u16(),
            message,
        }
    }
}

fn reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Unknown status")
        .to_string()
}

/// Accept only a JSON object carrying a string `predicted_class`
fn parse_prediction(body: Value) -> AnalysisOutcome {
    let Value::Object(fields) = body else {
        return Err(ClassificationError::InvalidResponse(
            "response body is not a JSON object".to_string(),
        ));
    };

    match fields.get(AnalysisResult::PREDICTED_CLASS) {
        Some(Value::String(_)) => Ok(AnalysisResult::from_map(fields)),
        _ => Err(ClassificationError::InvalidResponse(
            "response has no predicted_class".to_string(),
        )),
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, storage_path: &Path) -> AnalysisOutcome {
        let response = self
            .http_client
            .post(&self.predict_url)
            .json(&json!({ "image_path": storage_path.to_string_lossy() }))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(self.upstream_error(response).await);
        }

        let body: Value = response.json().await.map_err(|e| self.transport_error(e))?;
        parse_prediction(body)
    }

    async fn model_info(&self) -> Result<ModelInfo, ClassificationError> {
        let response = self
            .http_client
            .get(&self.model_info_url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(self.upstream_error(response).await);
        }

        response.json().await.map_err(|e| self.transport_error(e))
    }
}
