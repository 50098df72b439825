use async_trait::async_trait;
use reqwest::Client;

use crate::error::LoadError;
use crate::key_set::KeySet;

/// Something that can produce the current set of trusted keys
#[async_trait]
pub trait KeySetSource: Send + Sync {
    /// Load a fresh key set
    async fn load(&self) -> Result<KeySet, LoadError>;

    /// Whether `load` always returns the same value without doing I/O
    fn is_static(&self) -> bool {
        false
    }
}

/// A key set materialized from configuration
#[derive(Debug, Clone)]
pub struct StaticSource {
    key_set: KeySet,
}

impl StaticSource {
    pub fn new(key_set: KeySet) -> Self {
        Self { key_set }
    }

    /// Build from a JWKS document
    pub fn from_json(document: &[u8]) -> Result<Self, LoadError> {
        Ok(Self::new(KeySet::from_json(document)?))
    }
}

#[async_trait]
impl KeySetSource for StaticSource {
    async fn load(&self) -> Result<KeySet, LoadError> {
        Ok(self.key_set.clone())
    }

    fn is_static(&self) -> bool {
        true
    }
}

/// A key set fetched over HTTP from a JWKS endpoint
#[derive(Debug, Clone)]
pub struct RemoteSource {
    url: String,
    client: Client,
}

impl RemoteSource {
    pub fn new(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KeySetSource for RemoteSource {
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn load(&self) -> Result<KeySet, LoadError> {
        let document = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let key_set = KeySet::from_json(&document)?;
        tracing::debug!(keys = key_set.len(), "fetched JWKS");

        Ok(key_set)
    }
}
