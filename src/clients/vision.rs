//! Vision annotation ports and their HTTP client implementation.
//!
//! The pipeline consumes these as capability ports; each call fails in
//! isolation and the classification engine degrades a failed source to
//! "no contribution".

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Categorical likelihood reported per safety category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Likelihood {
    #[default]
    Unknown,
    VeryUnlikely,
    Unlikely,
    Possible,
    Likely,
    VeryLikely,
}

impl Likelihood {
    /// Fixed ordinal mapping into a numeric score.
    pub fn score(&self) -> f64 {
        match self {
            Likelihood::Unknown => 0.0,
            Likelihood::VeryUnlikely => 0.1,
            Likelihood::Unlikely => 0.25,
            Likelihood::Possible => 0.5,
            Likelihood::Likely => 0.7,
            Likelihood::VeryLikely => 0.9,
        }
    }
}

/// Safety likelihoods for an image.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SafetyAnnotation {
    #[serde(default)]
    pub adult: Likelihood,
    #[serde(default)]
    pub racy: Likelihood,
}

/// Free-text label with confidence.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelAnnotation {
    pub description: String,
    #[serde(default)]
    pub score: f64,
}

#[async_trait]
pub trait VisionSafetyPort: Send + Sync {
    async fn classify(&self, image: &[u8]) -> Result<SafetyAnnotation>;
}

#[async_trait]
pub trait VisionLabelPort: Send + Sync {
    async fn classify(&self, image: &[u8], max_results: u32) -> Result<Vec<LabelAnnotation>>;
}

/// Client for a Google-Vision-shaped `images:annotate` endpoint.
#[derive(Clone)]
pub struct GoogleVisionClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateResult {
    safe_search_annotation: Option<SafetyAnnotation>,
    #[serde(default)]
    label_annotations: Vec<LabelAnnotation>,
}

impl GoogleVisionClient {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }

    async fn annotate(
        &self,
        image: &[u8],
        feature: &str,
        max_results: Option<u32>,
    ) -> Result<AnnotateResult> {
        let mut feature_body = serde_json::json!({ "type": feature });
        if let Some(max) = max_results {
            feature_body["maxResults"] = serde_json::json!(max);
        }
        let body = serde_json::json!({
            "requests": [{
                "image": { "content": BASE64.encode(image) },
                "features": [feature_body],
            }]
        });

        let response = self
            .http
            .post(format!("{}?key={}", self.endpoint, self.api_key))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<AnnotateResponse>()
            .await?;

        Ok(response.responses.into_iter().next().unwrap_or_default())
    }
}

#[async_trait]
impl VisionSafetyPort for GoogleVisionClient {
    async fn classify(&self, image: &[u8]) -> Result<SafetyAnnotation> {
        let result = self.annotate(image, "SAFE_SEARCH_DETECTION", None).await?;
        Ok(result.safe_search_annotation.unwrap_or_default())
    }
}

#[async_trait]
impl VisionLabelPort for GoogleVisionClient {
    async fn classify(&self, image: &[u8], max_results: u32) -> Result<Vec<LabelAnnotation>> {
        let result = self
            .annotate(image, "LABEL_DETECTION", Some(max_results))
            .await?;
        Ok(result.label_annotations)
    }
}
