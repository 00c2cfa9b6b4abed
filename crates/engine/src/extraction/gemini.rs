//! Gemini `generateContent` extractor.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Extraction, Extractor, ImageSource, validate_payload};
use crate::{EngineError, ExtractionError, ExtractionSettings, ResultEngine};

const PROMPT: &str = "Extract the purchase details from this receipt image. \
Return vendorName, receiptNumber, totalAmount (a plain decimal number), \
currencyCode (ISO 4217, three letters), transactionDate (YYYY-MM-DD) and payerName. \
Use null for anything that is not printed on the receipt.";

/// Extractor backed by Google's Gemini API.
pub struct GeminiExtractor {
    client: reqwest::Client,
    api_key: HeaderValue,
    settings: ExtractionSettings,
}

impl std::fmt::Debug for GeminiExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiExtractor")
            .field("model", &self.settings.model)
            .field("endpoint", &self.settings.endpoint)
            .finish_non_exhaustive()
    }
}

/// Transport failure without the request URL, which may carry credentials.
fn transport(context: &str, err: reqwest::Error) -> ExtractionError {
    ExtractionError::transport(format!("{context}: {}", err.without_url()))
}

impl GeminiExtractor {
    pub fn new(settings: ExtractionSettings) -> ResultEngine<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(EngineError::Configuration(
                "extraction api_key is not set".to_string(),
            ));
        }
        let mut api_key = HeaderValue::from_str(settings.api_key.trim()).map_err(|_| {
            EngineError::Configuration("extraction api_key is not a valid header value".to_string())
        })?;
        api_key.set_sensitive(true);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| EngineError::Configuration(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            settings,
        })
    }

    fn build_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.model
        )
    }

    fn generate_request(&self, body: &GeminiRequest) -> reqwest::RequestBuilder {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("x-goog-api-key"),
            self.api_key.clone(),
        );
        self.client.post(self.build_url()).headers(headers).json(body)
    }

    fn too_large(&self, size: u64) -> ExtractionError {
        ExtractionError::transport(format!(
            "image is {size} bytes, limit is {}",
            self.settings.max_image_bytes
        ))
    }

    async fn fetch_image(&self, url: &str) -> Result<(String, Vec<u8>), ExtractionError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport("image fetch failed", e))?;
        if !response.status().is_success() {
            return Err(ExtractionError::transport(format!(
                "image fetch returned HTTP {}",
                response.status()
            )));
        }
        let limit = self.settings.max_image_bytes;
        if let Some(length) = response.content_length().filter(|l| *l > limit as u64) {
            return Err(self.too_large(length));
        }
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or_else(|| "image/jpeg".to_string());

        // Content-Length may be absent or wrong; enforce the cap while reading.
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport("image fetch failed", e))?
        {
            if bytes.len() + chunk.len() > limit {
                return Err(self.too_large((bytes.len() + chunk.len()) as u64));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok((mime_type, bytes))
    }
}

// Gemini API request/response structures

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
struct GeminiInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    #[serde(rename = "responseSchema")]
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
struct GeminiPartResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "vendorName": {"type": "STRING"},
            "receiptNumber": {"type": "STRING", "nullable": true},
            "totalAmount": {"type": "NUMBER"},
            "currencyCode": {"type": "STRING", "nullable": true},
            "transactionDate": {"type": "STRING"},
            "payerName": {"type": "STRING", "nullable": true}
        },
        "required": ["vendorName", "totalAmount", "transactionDate"]
    })
}

fn request_body(mime_type: String, bytes: &[u8]) -> GeminiRequest {
    GeminiRequest {
        contents: vec![GeminiContent {
            role: "user".to_string(),
            parts: vec![
                GeminiPart::Text {
                    text: PROMPT.to_string(),
                },
                GeminiPart::Inline {
                    inline_data: GeminiInlineData {
                        mime_type,
                        data: STANDARD.encode(bytes),
                    },
                },
            ],
        }],
        generation_config: GeminiGenerationConfig {
            temperature: 0.0,
            response_mime_type: "application/json".to_string(),
            response_schema: response_schema(),
        },
    }
}

/// Turn a raw `generateContent` response body into a validated extraction.
pub(crate) fn parse_model_response(body: &str) -> Result<Extraction, ExtractionError> {
    let parsed: GeminiResponse = serde_json::from_str(body)
        .map_err(|e| ExtractionError::upstream(format!("malformed response body: {e}")))?;

    if let Some(error) = parsed.error {
        return Err(ExtractionError::upstream(format!(
            "Gemini API error: {}",
            error.message
        )));
    }

    let text = parsed
        .candidates
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
        .ok_or_else(|| ExtractionError::upstream("no content in response"))?;

    let payload: Value = serde_json::from_str(strip_fences(&text))
        .map_err(|e| ExtractionError::upstream(format!("model output is not JSON: {e}")))?;
    validate_payload(payload)
}

fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(text)
}

#[async_trait]
impl Extractor for GeminiExtractor {
    async fn extract(&self, source: &ImageSource) -> Result<Extraction, ExtractionError> {
        let (mime_type, bytes) = match source {
            ImageSource::Url(url) => self.fetch_image(url).await?,
            ImageSource::Inline {
                mime_type, bytes, ..
            } => (mime_type.clone(), bytes.clone()),
        };
        if bytes.len() > self.settings.max_image_bytes {
            return Err(self.too_large(bytes.len() as u64));
        }

        let response = self
            .generate_request(&request_body(mime_type, &bytes))
            .send()
            .await
            .map_err(|e| transport("generateContent failed", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ExtractionError::upstream(format!("HTTP {status}: {text}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| transport("reading generateContent response failed", e))?;
        parse_model_response(&text)
    }
}
