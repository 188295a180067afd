//! Configuration structures for the extraction pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable consulted when `layout.api_key` is unset.
pub const LAYOUT_KEY_ENV: &str = "FORMLENS_LAYOUT_KEY";

/// Environment variable consulted when `vision.api_key` is unset.
pub const VISION_KEY_ENV: &str = "FORMLENS_VISION_KEY";

/// Main configuration for the formlens pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormlensConfig {
    /// Which extraction back-end to use.
    pub strategy: StrategyKind,

    /// Layout-analysis service configuration.
    pub layout: LayoutConfig,

    /// Multimodal language service configuration.
    pub vision: VisionConfig,

    /// Page rendering configuration (vision strategy).
    pub render: RenderConfig,
}

/// Extraction back-end selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Asynchronous layout analysis with polling.
    #[default]
    Layout,
    /// Synchronous multimodal model call.
    Vision,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Layout => write!(f, "layout"),
            StrategyKind::Vision => write!(f, "vision"),
        }
    }
}

/// Layout-analysis service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Service base URL, e.g. `https://<resource>.cognitiveservices.azure.com`.
    pub endpoint: String,

    /// Subscription key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Analysis model identifier.
    pub model_id: String,

    /// API version query parameter.
    pub api_version: String,

    /// Optional analysis add-ons requested from the service.
    pub features: Vec<String>,

    /// Delay between status queries in milliseconds.
    pub poll_interval_ms: u64,

    /// Maximum number of status queries.
    pub max_attempts: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            model_id: "prebuilt-layout".to_string(),
            api_version: "2023-07-31".to_string(),
            features: vec!["keyValuePairs".to_string(), "languages".to_string()],
            poll_interval_ms: 2000,
            max_attempts: 60,
        }
    }
}

impl LayoutConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// API key from config, falling back to the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(LAYOUT_KEY_ENV).ok())
            .filter(|k| !k.is_empty())
    }
}

/// Multimodal language service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Chat-completions URL.
    pub endpoint: String,

    /// Bearer token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name.
    pub model: String,

    /// Response token limit.
    pub max_tokens: u32,

    /// Sampling temperature; extraction wants deterministic output.
    pub temperature: f32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: None,
            model: "gpt-4o".to_string(),
            max_tokens: 4096,
            temperature: 0.0,
        }
    }
}

impl VisionConfig {
    /// API key from config, falling back to the environment.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(VISION_KEY_ENV).ok())
            .filter(|k| !k.is_empty())
    }
}

/// Page rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Upscaling factor applied to the page size in points.
    pub scale: f32,

    /// JPEG quality (1 - 100).
    pub jpeg_quality: u8,

    /// Maximum pages to render (0 = unlimited).
    pub max_pages: usize,

    /// Directory holding the pdfium shared library; the system library is tried otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdfium_library_dir: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            scale: 2.0,
            jpeg_quality: 85,
            max_pages: 0,
            pdfium_library_dir: None,
        }
    }
}

impl FormlensConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FormlensConfig::default();
        assert_eq!(config.strategy, StrategyKind::Layout);
        assert_eq!(config.layout.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.layout.max_attempts, 60);
        assert_eq!(config.render.scale, 2.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FormlensConfig =
            serde_json::from_str(r#"{"strategy": "vision", "layout": {"max_attempts": 5}}"#).unwrap();
        assert_eq!(config.strategy, StrategyKind::Vision);
        assert_eq!(config.layout.max_attempts, 5);
        assert_eq!(config.layout.model_id, "prebuilt-layout");
    }

    #[test]
    fn test_explicit_key_wins() {
        let layout = LayoutConfig {
            api_key: Some("from-file".to_string()),
            ..Default::default()
        };
        assert_eq!(layout.resolved_api_key().as_deref(), Some("from-file"));
    }
}
