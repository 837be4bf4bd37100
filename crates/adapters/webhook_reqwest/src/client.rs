//! [`WebhookClient`] implementation over a shared [`reqwest::Client`].

use autorule_app::ports::{WebhookClient, WebhookRequest, WebhookResponse};
use autorule_domain::action::WebhookMethod;
use autorule_domain::error::AutoRuleError;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::WebhookError;

/// Settings shared by every outbound webhook call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// `User-Agent` header sent with each request.
    pub user_agent: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("autorule/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// HTTP client performing webhook actions.
///
/// Timeouts are applied per request, from the action itself.
#[derive(Debug, Clone)]
pub struct ReqwestWebhookClient {
    client: reqwest::Client,
}

impl ReqwestWebhookClient {
    /// Build the underlying connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::Build`] if the TLS backend cannot be initialised.
    pub fn new(config: &WebhookConfig) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(WebhookError::Build)?;
        Ok(Self { client })
    }
}

/// Flatten a JSON object into query pairs. Strings are used as-is, other
/// values use their JSON text. Non-object payloads produce no parameters.
fn query_pairs(payload: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = payload else {
        return Vec::new();
    };
    map.iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

impl WebhookClient for ReqwestWebhookClient {
    async fn send(&self, request: WebhookRequest) -> Result<WebhookResponse, AutoRuleError> {
        let mut builder = match request.method {
            WebhookMethod::Get => self.client.get(&request.url),
            WebhookMethod::Post => self.client.post(&request.url),
        }
        .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.method {
            WebhookMethod::Get => builder.query(&query_pairs(&request.payload)),
            WebhookMethod::Post => builder.json(&request.payload),
        };

        let response = builder.send().await.map_err(WebhookError::Request)?;
        let status = response.status().as_u16();
        debug!(url = %request.url, status, "webhook answered");
        Ok(WebhookResponse { status })
    }
}
