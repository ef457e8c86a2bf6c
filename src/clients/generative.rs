//! Generative classifier port. Feature-flagged; a malformed or absent
//! response resolves to "no contribution", never an error surfaced to the
//! pipeline.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerativeSeverity {
    #[default]
    Suggest,
    Forbidden,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerativeTrigger {
    #[serde(default)]
    pub trigger: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub severity: GenerativeSeverity,
}

/// Structured verdict parsed from the model's best-effort JSON payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerativeVerdict {
    #[serde(default)]
    pub triggers: Vec<GenerativeTrigger>,
    #[serde(default)]
    pub forbidden_reasons: Vec<String>,
}

#[async_trait]
pub trait GenerativeClassifierPort: Send + Sync {
    async fn classify(
        &self,
        image: &[u8],
        mime_type: &str,
        maker_tags: &[String],
    ) -> Result<Option<GenerativeVerdict>>;
}

/// Extract the substring between the first `{` and the last `}` and parse it
/// as a verdict. Generative output often wraps JSON in prose or code fences.
pub fn parse_verdict_text(text: &str) -> Option<GenerativeVerdict> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

const PROMPT: &str = "You are a moderation classifier. Return ONLY valid JSON.\n\
Schema: {\"triggers\": [{\"trigger\": string, \"confidence\": number, \"severity\": \"suggest\"|\"forbidden\"}], \"forbiddenReasons\": [string]}\n\
Only include triggers that are NOT nudityErotic, explicit18, needlesInjections, spidersInsects.\n\
If nothing is detected, return {\"triggers\": [], \"forbiddenReasons\": []}.";

/// Client for a Vertex-shaped `generateContent` endpoint.
#[derive(Clone)]
pub struct VertexGenerativeClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl VertexGenerativeClient {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl GenerativeClassifierPort for VertexGenerativeClient {
    async fn classify(
        &self,
        image: &[u8],
        mime_type: &str,
        maker_tags: &[String],
    ) -> Result<Option<GenerativeVerdict>> {
        let mut prompt = PROMPT.to_string();
        if !maker_tags.is_empty() {
            prompt.push_str("\nUploader-declared tags: ");
            prompt.push_str(&maker_tags.join(", "));
        }
        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": prompt },
                    { "inlineData": { "data": BASE64.encode(image), "mimeType": mime_type } },
                ],
            }],
            "generationConfig": { "temperature": 0 },
        });

        let response = self
            .http
            .post(format!("{}?key={}", self.endpoint, self.api_key))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<GenerateResponse>()
            .await?;

        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text);

        Ok(text.as_deref().and_then(parse_verdict_text))
    }
}
