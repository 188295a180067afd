//! Multimodal language service client.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::error::{FormlensError, Result};
use crate::input::PageImage;
use crate::models::config::VisionConfig;

/// Synchronous image + instruction model call.
#[async_trait]
pub trait VisionService: Send + Sync {
    /// Send the instruction and all page images, returning the model's text.
    async fn invoke(&self, prompt: &str, pages: &[PageImage]) -> Result<String>;
}

/// Chat-completions implementation of [`VisionService`].
pub struct HttpVisionService {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl HttpVisionService {
    pub fn new(config: &VisionConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(FormlensError::Config("vision.endpoint is not set".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim().to_string(),
            api_key: config.resolved_api_key(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn request_body(&self, prompt: &str, pages: &[PageImage]) -> Value {
        let mut content = vec![json!({ "type": "text", "text": prompt })];
        content.extend(pages.iter().map(|page| {
            json!({
                "type": "image_url",
                "image_url": { "url": data_uri(page), "detail": "high" }
            })
        }));

        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [{ "role": "user", "content": content }]
        })
    }
}

/// `data:` URI carrying the encoded page.
pub fn data_uri(page: &PageImage) -> String {
    format!("data:{};base64,{}", page.mime_type, BASE64_STANDARD.encode(&page.data))
}

#[async_trait]
impl VisionService for HttpVisionService {
    async fn invoke(&self, prompt: &str, pages: &[PageImage]) -> Result<String> {
        let body = self.request_body(prompt, pages);
        debug!("Invoking {} with {} page image(s)", self.model, pages.len());

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(FormlensError::service(status, text));
        }

        trace!("Vision response: {} bytes", text.len());
        let parsed: ChatResponse = serde_json::from_str(&text)?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> PageImage {
        PageImage {
            page_number: 1,
            width: 1,
            height: 1,
            mime_type: "image/png",
            data: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(data_uri(&page()), "data:image/png;base64,AQID");
    }

    #[test]
    fn test_request_body_orders_text_then_pages() {
        let service = HttpVisionService::new(&VisionConfig::default()).unwrap();
        let body = service.request_body("extract", &[page(), page()]);
        let content = body["messages"][0]["content"].as_array().unwrap();

        assert_eq!(content.len(), 3);
        assert_eq!(content[0]["text"], "extract");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(body["model"], "gpt-4o");
    }

    #[test]
    fn test_missing_endpoint() {
        let config = VisionConfig {
            endpoint: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(HttpVisionService::new(&config), Err(FormlensError::Config(_))));
    }
}
