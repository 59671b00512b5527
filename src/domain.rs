use crate::errors::{ServiceError, StorageError};
use crate::models::{Meme, MemeTemplate};
use async_trait::async_trait;

/// Persistent string key/value storage backing all local state.
///
/// Reads never fail: a backend that cannot produce a value reports it as absent.
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;

    /// Writes are synchronous; once this returns `Ok` the value is committed.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Writes several keys as one commit.
    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), StorageError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

/// Read-only listing of memes from the external catalog.
#[async_trait]
pub trait MemeCatalog: Send + Sync + 'static {
    /// Lists all memes in catalog order.
    async fn list_memes(&self) -> Result<Vec<Meme>, ServiceError>;
}

/// Caption templates and rendered caption image URLs.
#[async_trait]
pub trait TemplateGenerator: Send + Sync + 'static {
    async fn list_templates(&self) -> Result<Vec<MemeTemplate>, ServiceError>;

    fn caption_url(&self, template_id: &str, top: &str, bottom: &str) -> String;

    /// Fetches the rendered caption image bytes.
    async fn render(&self, template_id: &str, top: &str, bottom: &str) -> Result<Vec<u8>, ServiceError>;
}

/// Image hosting: give it bytes, get back a hosted URL or a failure reason.
#[async_trait]
pub trait ImageHost: Send + Sync + 'static {
    async fn upload(&self, image: &[u8]) -> Result<String, ServiceError>;
}
