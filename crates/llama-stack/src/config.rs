use std::fmt::Debug;

use serde_json::{Map, Value};

const DEFAULT_BASE_URL: &str = "http://localhost:8321";

/// Builder for [`LlamaStackConfig`].
#[derive(Clone, PartialEq, Eq)]
pub struct LlamaStackConfigBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    provider_data: Map<String, Value>,
}

impl LlamaStackConfigBuilder {
    /// Creates a builder with the given server URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: Some(base_url.into()),
            api_key: None,
            provider_data: Map::new(),
        }
    }

    /// Creates a builder for a plain HTTP server on `host:port`.
    #[inline]
    pub fn with_host_port(host: &str, port: u16) -> Self {
        Self::with_base_url(format!("http://{host}:{port}"))
    }

    /// Sets the bearer token sent with every request.
    #[inline]
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Adds a provider data entry, e.g. the API key of a search provider.
    ///
    /// Provider data are forwarded by the server to the tool providers.
    #[inline]
    pub fn with_provider_data<K: Into<String>, V: Into<Value>>(
        mut self,
        key: K,
        value: V,
    ) -> Self {
        self.provider_data.insert(key.into(), value.into());
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> LlamaStackConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        LlamaStackConfig {
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: self.api_key,
            provider_data: if self.provider_data.is_empty() {
                None
            } else {
                Some(Value::Object(self.provider_data).to_string())
            },
        }
    }
}

impl Default for LlamaStackConfigBuilder {
    #[inline]
    fn default() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }
}

impl Debug for LlamaStackConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlamaStackConfigBuilder")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<deducted>"))
            .field("provider_data", &self.provider_data.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Configuration for the Llama Stack backend.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct LlamaStackConfig {
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    // Serialized JSON object, sent as a header.
    pub(crate) provider_data: Option<String>,
}

impl LlamaStackConfig {
    /// Returns the server URL.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Debug for LlamaStackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlamaStackConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<deducted>"))
            .field(
                "provider_data",
                &self.provider_data.as_ref().map(|_| "<deducted>"),
            )
            .finish()
    }
}
