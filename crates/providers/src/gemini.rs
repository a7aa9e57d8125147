//! Google Generative Language (Gemini) REST client.

use crate::openai::check_status;
use crate::{Attachment, EmbedResponse, EmbeddingProvider, LlmProvider, ProviderError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    cfg: Arc<GeminiConfig>,
}

impl GeminiProvider {
    pub fn new(cfg: GeminiConfig) -> Self {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            cfg: Arc::new(cfg),
        }
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!(
            "{}/v1beta/models/{}:{}",
            self.cfg.base_url.trim_end_matches('/'),
            model,
            method
        )
    }
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

fn request_parts(prompt: &str, attachments: &[Attachment]) -> Vec<Part> {
    let mut parts = Vec::with_capacity(attachments.len() + 1);
    parts.push(Part::Text {
        text: prompt.to_string(),
    });
    for attachment in attachments {
        match attachment {
            Attachment::Text(text) => {
                if !text.is_empty() {
                    parts.push(Part::Text { text: text.clone() });
                }
            }
            Attachment::Image { mime, data } => parts.push(Part::Inline {
                inline_data: InlineData {
                    mime_type: mime.clone(),
                    data: STANDARD.encode(data),
                },
            }),
        }
    }
    parts
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
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

fn response_text(resp: GenerateResponse) -> Result<String, ProviderError> {
    let Some(candidate) = resp.candidates.into_iter().next() else {
        return Err(ProviderError::InvalidResponse(format!(
            "no candidates returned (prompt feedback: {})",
            resp.prompt_feedback.unwrap_or_default()
        )));
    };
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.is_empty() {
        return Err(ProviderError::InvalidResponse(format!(
            "empty candidate (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(text)
}

#[async_trait::async_trait]
impl LlmProvider for GeminiProvider {
    async fn generate(
        &self,
        prompt: &str,
        attachments: &[Attachment],
    ) -> Result<String, ProviderError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct GenerationConfig {
            temperature: f32,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct GenerateRequest {
            contents: Vec<Content>,
            generation_config: GenerationConfig,
        }

        let body = GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: request_parts(prompt, attachments),
            }],
            generation_config: GenerationConfig {
                temperature: self.cfg.temperature,
            },
        };

        debug!(
            model = %self.cfg.chat_model,
            parts = body.contents[0].parts.len(),
            "gemini generateContent"
        );
        let resp = self
            .client
            .post(self.model_url(&self.cfg.chat_model, "generateContent"))
            .header("x-goog-api-key", &self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        let resp = check_status(resp).await?;

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        response_text(parsed)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for GeminiProvider {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
        #[derive(Serialize)]
        struct EmbedContentRequest {
            model: String,
            content: Content,
        }
        #[derive(Serialize)]
        struct BatchEmbedRequest {
            requests: Vec<EmbedContentRequest>,
        }
        #[derive(Deserialize)]
        struct Embedding {
            values: Vec<f32>,
        }
        #[derive(Deserialize)]
        struct BatchEmbedResponse {
            #[serde(default)]
            embeddings: Vec<Embedding>,
        }

        if texts.is_empty() {
            return Ok(EmbedResponse { vectors: vec![] });
        }
        let model = self
            .cfg
            .embedding_model
            .strip_prefix("models/")
            .unwrap_or(&self.cfg.embedding_model);
        let body = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|t| EmbedContentRequest {
                    model: format!("models/{}", model),
                    content: Content {
                        role: None,
                        parts: vec![Part::Text { text: t.clone() }],
                    },
                })
                .collect(),
        };

        let resp = self
            .client
            .post(self.model_url(model, "batchEmbedContents"))
            .header("x-goog-api-key", &self.cfg.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;
        let resp = check_status(resp).await?;

        let parsed: BatchEmbedResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        if parsed.embeddings.len() != texts.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        Ok(EmbedResponse {
            vectors: parsed.embeddings.into_iter().map(|e| e.values).collect(),
        })
    }
}
