use crate::config::{read_api_key, GeminiSettings, API_KEY_VARS};
use crate::models::AspectRatio;
use crate::upload::png_data_uri;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use thiserror::Error;
use serde::Deserialize;
use reqwest::{Client, Url};
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, error};

pub const IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const TEXT_MODEL: &str = "gemini-2.5-flash";
pub const VIDEO_MODEL: &str = "veo-3.1-fast-generate-preview";

pub const COST_SYSTEM_INSTRUCTION: &str = "You are an expert architectural quantity surveyor and cost estimator. Provide detailed, professional cost analysis based on the parameters provided. Output in Markdown format.";

/// Backend message meaning the selected key is unknown or expired.
pub const ENTITY_NOT_FOUND: &str = "Requested entity was not found";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("API error ({status}): {message}")] Api { status: u16, message: String },
    #[error("parse error: {0}")] Parse(String),
    #[error("no image data returned")] NoImage,
    #[error("empty text response")] EmptyText,
    #[error("no video generated")] NoVideo,
    #[error("credential rejected: {0}")] Credential(String),
    #[error("video generation timed out after {0:?}")] Timeout(Duration),
}

impl From<reqwest::Error> for GenerationError {
    fn from(e: reqwest::Error) -> Self { GenerationError::Http(e.to_string()) }
}

#[derive(Debug, Clone)]
pub struct VideoOutput {
    pub bytes: Bytes,
    pub mime_type: String,
}

/// The generative operations the tools rely on.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns a `data:image/png;base64,` URI.
    async fn generate_image(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<String, GenerationError>;
    /// `base64_image` is raw base64 without a data-URI prefix.
    async fn generate_image_from_image(&self, prompt: &str, base64_image: &str, mime_type: &str) -> Result<String, GenerationError>;
    /// Returns the Markdown report verbatim.
    async fn generate_cost_analysis(&self, prompt: &str) -> Result<String, GenerationError>;
    async fn generate_video(&self, prompt: &str) -> Result<VideoOutput, GenerationError>;
}

/// Hook used by the video path to get a usable credential in place.
#[async_trait]
pub trait KeySelector: Send + Sync {
    async fn has_selected_key(&self) -> bool;
    async fn open_select_key(&self);
}

/// Key picked by the selector at runtime. Takes precedence over the environment.
pub type SelectedKey = Arc<RwLock<Option<String>>>;

/// Selects keys from the environment. Reselection re-reads `.env` into the
/// shared `SelectedKey`; the process environment is left alone.
pub struct EnvKeySelector {
    selected: SelectedKey,
    path: Option<PathBuf>,
}

impl EnvKeySelector {
    pub fn new(selected: SelectedKey) -> Self {
        Self { selected, path: None }
    }

    /// Reloads from `path` instead of searching for `.env`.
    pub fn from_file(selected: SelectedKey, path: impl Into<PathBuf>) -> Self {
        Self { selected, path: Some(path.into()) }
    }

    fn reload(&self) -> Result<Option<(String, String)>, dotenv::Error> {
        let iter = match &self.path {
            Some(path) => dotenv::from_path_iter(path)?,
            None => dotenv::dotenv_iter()?,
        };
        let vars: Vec<(String, String)> = iter.flatten().filter(|(_, v)| !v.is_empty()).collect();
        Ok(API_KEY_VARS.iter().find_map(|name| vars.iter().find(|(n, _)| n.as_str() == *name).cloned()))
    }
}

#[async_trait]
impl KeySelector for EnvKeySelector {
    async fn has_selected_key(&self) -> bool {
        self.selected.read().is_some() || !read_api_key().is_empty()
    }

    async fn open_select_key(&self) {
        warn!("🔑 Reloading Gemini credentials from .env");
        match self.reload() {
            Ok(Some((name, value))) => {
                *self.selected.write() = Some(value);
                info!("🔑 Reloaded {}", name);
            }
            Ok(None) => warn!("🔑 .env holds no Gemini key"),
            Err(e) => warn!("🔑 No .env file to reload credentials from: {}", e),
        }
    }
}

// Truncates base64 payloads inside JSON so responses can be logged.
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" || key == "bytesBase64Encoded" {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=') {
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn log_preview(text: &str) -> String {
    if text.len() <= 1000 {
        return text.to_string();
    }
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(mut value) => {
            truncate_base64_in_json(&mut value);
            serde_json::to_string(&value).unwrap_or_default()
        }
        Err(_) => format!("{}...", text.chars().take(1000).collect::<String>()),
    }
}

fn preview(data: &str) -> String {
    let total = data.chars().count();
    if total > 50 { format!("{}...[{} chars total]", data.chars().take(50).collect::<String>(), total) } else { data.to_string() }
}

pub struct GeminiClient {
    client: Client,
    settings: GeminiSettings,
    api_key: Option<String>,
    selected_key: SelectedKey,
    selector: Arc<dyn KeySelector>,
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings) -> Self {
        let selected_key = SelectedKey::default();
        let selector = Arc::new(EnvKeySelector::new(selected_key.clone()));
        Self { client: Client::new(), settings, api_key: None, selected_key, selector }
    }

    /// Pins the credential instead of reading it from the environment per call.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_key_selector(mut self, selector: Arc<dyn KeySelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Slot a selector writes into to replace the environment key.
    pub fn selected_key(&self) -> SelectedKey {
        self.selected_key.clone()
    }

    fn api_key(&self) -> String {
        if let Some(key) = &self.api_key {
            return key.clone();
        }
        if let Some(key) = self.selected_key.read().as_ref() {
            return key.clone();
        }
        read_api_key()
    }

    fn endpoint(&self, path: &str, key: &str) -> String {
        format!("{}/{}?key={}", self.settings.base_url, path.trim_start_matches('/'), key)
    }

    fn redact(url: &str, key: &str) -> String {
        if key.is_empty() { url.to_string() } else { url.replace(key, "***") }
    }

    async fn read_json(response: reqwest::Response, label: &str) -> Result<serde_json::Value, GenerationError> {
        let status = response.status();
        info!("📥 {} response status: {}", label, status);
        let text = response.text().await?;
        if !status.is_success() {
            error!("❌ {} API error response: {}", label, log_preview(&text));
            return Err(GenerationError::Api { status: status.as_u16(), message: api_error_message(&text) });
        }
        info!("📥 {} response: {}", label, log_preview(&text));
        serde_json::from_str(&text).map_err(|e| GenerationError::Parse(format!("{}: {}", e, log_preview(&text))))
    }

    async fn post(&self, path: &str, body: &serde_json::Value, label: &str) -> Result<serde_json::Value, GenerationError> {
        let key = self.api_key();
        let url = self.endpoint(path, &key);
        info!("🔗 Making request to: {}", Self::redact(&url, &key));
        let response = self.client.post(&url).json(body).send().await?;
        Self::read_json(response, label).await
    }

    async fn get(&self, path: &str, label: &str) -> Result<serde_json::Value, GenerationError> {
        let key = self.api_key();
        let url = self.endpoint(path, &key);
        let response = self.client.get(&url).send().await?;
        Self::read_json(response, label).await
    }

    async fn generate_content_image(&self, body: serde_json::Value) -> Result<String, GenerationError> {
        let value = self.post(&format!("models/{}:generateContent", IMAGE_MODEL), &body, "image").await?;
        let parsed: GeminiResponse = serde_json::from_value(value).map_err(|e| GenerationError::Parse(e.to_string()))?;
        let data = extract_first_image_b64(&parsed).ok_or(GenerationError::NoImage)?;
        info!("🖼️ Extracted image from API response: {}", preview(&data));
        Ok(png_data_uri(&data))
    }

    async fn submit_video(&self, prompt: &str) -> Result<VideoOutput, GenerationError> {
        if !self.selector.has_selected_key().await {
            self.selector.open_select_key().await;
        }

        let body = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": 1,
                "resolution": "1080p",
                "aspectRatio": "16:9"
            }
        });
        let value = self.post(&format!("models/{}:predictLongRunning", VIDEO_MODEL), &body, "video").await?;
        let operation: Operation = serde_json::from_value(value).map_err(|e| GenerationError::Parse(e.to_string()))?;
        let name = operation.name.clone().ok_or_else(|| GenerationError::Parse("operation without a name".into()))?;
        info!("🎬 Video job submitted: {}", name);

        let polling = self.poll_until_done(&name, operation);
        let mut operation = match self.settings.poll_timeout {
            Some(limit) => tokio::time::timeout(limit, polling).await.map_err(|_| GenerationError::Timeout(limit))??,
            None => polling.await?,
        };

        if let Some(err) = operation.error.take() {
            return Err(GenerationError::Api { status: err.code.unwrap_or(500) as u16, message: err.message.unwrap_or_default() });
        }
        let uri = operation.video_uri().ok_or(GenerationError::NoVideo)?;
        self.download_video(&uri).await
    }

    async fn poll_until_done(&self, name: &str, mut operation: Operation) -> Result<Operation, GenerationError> {
        let mut checks = 0u32;
        while !operation.done {
            tokio::time::sleep(self.settings.poll_interval).await;
            checks += 1;
            let value = self.get(name, "video status").await?;
            operation = serde_json::from_value(value).map_err(|e| GenerationError::Parse(e.to_string()))?;
            info!("⏳ Video job {} status check {}: done={}", name, checks, operation.done);
        }
        Ok(operation)
    }

    async fn download_video(&self, uri: &str) -> Result<VideoOutput, GenerationError> {
        let key = self.api_key();
        let mut url = Url::parse(uri).map_err(|e| GenerationError::Parse(format!("bad video uri: {}", e)))?;
        url.query_pairs_mut().append_pair("key", &key);
        info!("⬇️ Downloading video from: {}", Self::redact(url.as_str(), &key));

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api { status: status.as_u16(), message: api_error_message(&text) });
        }
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("video/mp4")
            .to_string();
        let bytes = response.bytes().await?;
        info!("✅ Downloaded video: {} bytes ({})", bytes.len(), mime_type);
        Ok(VideoOutput { bytes, mime_type })
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate_image(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<String, GenerationError> {
        info!("Generating image with Gemini API ({})...", aspect_ratio);
        let body = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": { "aspectRatio": aspect_ratio.as_str() }
            }
        });
        let result = self.generate_content_image(body).await;
        if let Err(e) = &result {
            error!("❌ Image generation failed: {}", e);
        }
        result
    }

    async fn generate_image_from_image(&self, prompt: &str, base64_image: &str, mime_type: &str) -> Result<String, GenerationError> {
        info!("Generating image from {} input ({})...", mime_type, preview(base64_image));
        let body = json!({
            "contents": [{
                "parts": [
                    { "inlineData": { "data": base64_image, "mimeType": mime_type } },
                    { "text": prompt }
                ]
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"]
            }
        });
        let result = self.generate_content_image(body).await;
        if let Err(e) = &result {
            error!("❌ Image-to-image generation failed: {}", e);
        }
        result
    }

    async fn generate_cost_analysis(&self, prompt: &str) -> Result<String, GenerationError> {
        info!("Generating cost analysis with Gemini API...");
        let body = json!({
            "systemInstruction": {
                "parts": [{ "text": COST_SYSTEM_INSTRUCTION }]
            },
            "contents": [{
                "parts": [{ "text": prompt }]
            }]
        });
        let value = self.post(&format!("models/{}:generateContent", TEXT_MODEL), &body, "cost analysis").await
            .inspect_err(|e| error!("❌ Cost analysis failed: {}", e))?;
        let parsed: GeminiResponse = serde_json::from_value(value).map_err(|e| GenerationError::Parse(e.to_string()))?;
        let text = extract_text(&parsed);
        if text.trim().is_empty() {
            error!("❌ Cost analysis returned no text");
            return Err(GenerationError::EmptyText);
        }
        info!("✅ Cost analysis generated ({} chars)", text.len());
        Ok(text)
    }

    async fn generate_video(&self, prompt: &str) -> Result<VideoOutput, GenerationError> {
        info!("Generating video with Veo for prompt: {}", preview(prompt));
        match self.submit_video(prompt).await {
            Err(e) if e.to_string().contains(ENTITY_NOT_FOUND) => {
                error!("❌ Video generation rejected the credential: {}", e);
                self.selector.open_select_key().await;
                Err(GenerationError::Credential(e.to_string()))
            }
            Err(e) => {
                error!("❌ Video generation failed: {}", e);
                Err(e)
            }
            ok => ok,
        }
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData
    },
    Text { text: String },
    Other(serde_json::Value)
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Operation {
    name: Option<String>,
    #[serde(default)]
    done: bool,
    error: Option<ApiStatus>,
    response: Option<VideoResponse>,
}

impl Operation {
    fn video_uri(&self) -> Option<String> {
        self.response
            .as_ref()?
            .generate_video_response
            .as_ref()?
            .generated_samples
            .first()?
            .video
            .as_ref()?
            .uri
            .clone()
            .filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResponse { generate_video_response: Option<GenerateVideoResponse> }

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse { #[serde(default)] generated_samples: Vec<GeneratedSample> }

#[derive(Debug, Deserialize)]
struct GeneratedSample { video: Option<VideoRef> }

#[derive(Debug, Deserialize)]
struct VideoRef { uri: Option<String> }

#[derive(Debug, Deserialize)]
struct ApiStatus {
    code: Option<i64>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody { error: ApiStatus }

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error.message)
        .unwrap_or_else(|| body.to_string())
}

fn extract_first_image_b64(resp: &GeminiResponse) -> Option<String> {
    for c in &resp.candidates {
        for p in &c.content.parts {
            if let Part::Inline { inline_data } = p {
                info!("🎯 Found image data with mime type: {}", inline_data.mime_type);
                return Some(inline_data.data.clone());
            }
        }
    }
    info!("⚠️ No inline image data found in response structure");
    None
}

fn extract_text(resp: &GeminiResponse) -> String {
    resp.candidates
        .first()
        .map(|c| {
            c.content.parts.iter().filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            }).collect::<String>()
        })
        .unwrap_or_default()
}
