use crate::{
    config::Config,
    domain::{ImageHost, MemeCatalog, TemplateGenerator},
    errors::ServiceError,
    models::{Meme, MemeTemplate},
};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing;

const IMGFLIP: &str = "imgflip";
const MEMEGEN: &str = "memegen";
const IMGBB: &str = "imgbb";

// Creates the shared HTTP client used by every collaborator.
pub fn create_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()
}

fn transport(service: &'static str) -> impl FnOnce(reqwest::Error) -> ServiceError {
    move |source| ServiceError::Transport { service, source }
}

// --- imgflip ---

#[derive(Deserialize)]
struct ImgflipResponse {
    success: bool,
    #[serde(default)]
    data: Option<ImgflipData>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct ImgflipData {
    memes: Vec<Meme>,
}

#[derive(Debug, Clone)]
pub struct ImgflipCatalog {
    client: Client,
    url: String,
}

impl ImgflipCatalog {
    pub fn new(client: Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl MemeCatalog for ImgflipCatalog {
    async fn list_memes(&self) -> Result<Vec<Meme>, ServiceError> {
        tracing::debug!(url = %self.url, "imgflip: Listing memes");
        let resp = self.client.get(&self.url).send().await.map_err(transport(IMGFLIP))?;
        if !resp.status().is_success() {
            return Err(ServiceError::Status { service: IMGFLIP, status: resp.status() });
        }

        let body: ImgflipResponse = resp.json().await.map_err(transport(IMGFLIP))?;
        match (body.success, body.data) {
            (true, Some(data)) => {
                tracing::debug!("imgflip: Returned {} memes", data.memes.len());
                Ok(data.memes)
            }
            _ => Err(ServiceError::Rejected {
                service: IMGFLIP,
                reason: body.error_message.unwrap_or_else(|| "no memes in response".to_string()),
            }),
        }
    }
}

// --- memegen.link ---

/// Escapes caption text into a memegen.link path segment; blank text becomes `_`.
pub fn caption_segment(text: &str) -> String {
    if text.is_empty() {
        return "_".to_string();
    }
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '_' => out.push_str("__"),
            '-' => out.push_str("--"),
            ' ' => out.push('_'),
            '\n' => out.push_str("~n"),
            '?' => out.push_str("~q"),
            '&' => out.push_str("~a"),
            '%' => out.push_str("~p"),
            '#' => out.push_str("~h"),
            '/' => out.push_str("~s"),
            '\\' => out.push_str("~b"),
            '<' => out.push_str("~l"),
            '>' => out.push_str("~g"),
            '"' => out.push_str("''"),
            other => out.push(other),
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct MemegenTemplates {
    client: Client,
    base_url: String,
}

impl MemegenTemplates {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl TemplateGenerator for MemegenTemplates {
    async fn list_templates(&self) -> Result<Vec<MemeTemplate>, ServiceError> {
        let url = format!("{}/templates", self.base_url);
        tracing::debug!(%url, "memegen: Listing templates");
        let resp = self.client.get(&url).send().await.map_err(transport(MEMEGEN))?;
        if !resp.status().is_success() {
            return Err(ServiceError::Status { service: MEMEGEN, status: resp.status() });
        }
        resp.json().await.map_err(transport(MEMEGEN))
    }

    fn caption_url(&self, template_id: &str, top: &str, bottom: &str) -> String {
        format!(
            "{}/images/{}/{}/{}.png",
            self.base_url,
            template_id,
            caption_segment(top),
            caption_segment(bottom)
        )
    }

    async fn render(&self, template_id: &str, top: &str, bottom: &str) -> Result<Vec<u8>, ServiceError> {
        let url = self.caption_url(template_id, top, bottom);
        tracing::debug!(%url, "memegen: Fetching caption image");
        let resp = self.client.get(&url).send().await.map_err(transport(MEMEGEN))?;
        if !resp.status().is_success() {
            return Err(ServiceError::Status { service: MEMEGEN, status: resp.status() });
        }
        let bytes = resp.bytes().await.map_err(transport(MEMEGEN))?;
        Ok(bytes.to_vec())
    }
}

// --- imgbb ---

#[derive(Deserialize)]
struct ImgbbResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<ImgbbData>,
    #[serde(default)]
    error: Option<ImgbbError>,
}

#[derive(Deserialize)]
struct ImgbbData {
    url: String,
}

#[derive(Deserialize)]
struct ImgbbError {
    message: String,
}

#[derive(Debug, Clone)]
pub struct ImgbbHost {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl ImgbbHost {
    pub fn new(client: Client, url: String, api_key: Option<String>) -> Self {
        Self { client, url, api_key }
    }
}

#[async_trait]
impl ImageHost for ImgbbHost {
    async fn upload(&self, image: &[u8]) -> Result<String, ServiceError> {
        let api_key = self.api_key.as_deref().ok_or(ServiceError::MissingApiKey(IMGBB))?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        tracing::debug!(bytes = image.len(), "imgbb: Uploading image");

        let resp = self
            .client
            .post(&self.url)
            .form(&[("key", api_key), ("image", encoded.as_str())])
            .send()
            .await
            .map_err(transport(IMGBB))?;
        let status = resp.status();

        // imgbb reports failures in the JSON body, with or without an error status
        let body: ImgbbResponse = match resp.json().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => return Err(ServiceError::Status { service: IMGBB, status }),
            Err(e) => return Err(transport(IMGBB)(e)),
        };

        match body {
            ImgbbResponse { success: true, data: Some(data), .. } => {
                tracing::info!(url = %data.url, "imgbb: Upload successful");
                Ok(data.url)
            }
            ImgbbResponse { error, .. } => {
                let reason = error.map(|e| e.message).unwrap_or_else(|| format!("upload failed with status {}", status));
                tracing::warn!(%reason, "imgbb: Upload rejected");
                Err(ServiceError::Rejected { service: IMGBB, reason })
            }
        }
    }
}

/// Builds the three collaborators from application config.
pub fn create_collaborators(config: &Config, client: Client) -> (ImgflipCatalog, MemegenTemplates, ImgbbHost) {
    tracing::info!(meme_api = %config.meme_api_url, memegen = %config.memegen_api_url, "Configuring external APIs");
    if config.imgbb_api_key.is_none() {
        tracing::warn!("IMGBB_API_KEY not set, uploads will be rejected");
    }
    (
        ImgflipCatalog::new(client.clone(), config.meme_api_url.clone()),
        MemegenTemplates::new(client.clone(), config.memegen_api_url.clone()),
        ImgbbHost::new(client, config.image_host_url.clone(), config.imgbb_api_key.clone()),
    )
}
