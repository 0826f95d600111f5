use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;

/// Per-call generation knobs. Both gateways share one client and differ
/// only in these values and their prompts.
#[derive(Clone, Debug)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
    #[serde(rename = "safetySettings")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];
const BLOCK_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Thin client for the `generateContent` endpoint of the external
/// text-generation capability. One attempt per call, no retry.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(client: reqwest::Client, api_base: String, api_key: String) -> Self {
        Self {
            client,
            api_base,
            api_key,
        }
    }

    /// Sends `prompt` and returns the first candidate's text.
    pub async fn generate(&self, prompt: String, params: &GenerationParams) -> Result<String, Error> {
        // The key travels in the query string; never log the URL.
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.api_base, params.model, self.api_key
        );
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_output_tokens,
            },
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: BLOCK_THRESHOLD,
                })
                .collect(),
        };

        debug!("calling generateContent on model {}", params.model);
        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorEnvelope>()
                .await
                .ok()
                .and_then(|envelope| envelope.error)
                .and_then(|detail| detail.message)
                .unwrap_or_else(|| format!("upstream returned status {status}"));
            return Err(Error::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let reply: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(format!("undecodable success body: {e}")))?;

        let Some(candidate) = reply.candidates.and_then(|mut c| {
            if c.is_empty() {
                None
            } else {
                Some(c.remove(0))
            }
        }) else {
            return Err(Error::MalformedResponse("no candidates in reply".to_string()));
        };

        let finish_reason = candidate.finish_reason.clone();
        let text = candidate
            .content
            .and_then(|content| content.parts)
            .and_then(|mut parts| {
                if parts.is_empty() {
                    None
                } else {
                    parts.remove(0).text
                }
            });

        match text {
            Some(text) => Ok(text),
            None => Err(Error::MalformedResponse(format!(
                "candidate carried no text (finish reason: {})",
                finish_reason.as_deref().unwrap_or("unknown")
            ))),
        }
    }
}
