//! Webhook port: outbound HTTP calls triggered by rules.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use autorule_domain::action::{Webhook, WebhookMethod};
use autorule_domain::error::AutoRuleError;
use serde_json::Value;

/// A fully resolved HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookRequest {
    pub url: String,
    pub method: WebhookMethod,
    /// JSON body for `POST`, query parameters for `GET`.
    pub payload: Value,
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
}

impl From<&Webhook> for WebhookRequest {
    fn from(hook: &Webhook) -> Self {
        Self {
            url: hook.url.clone(),
            method: hook.method,
            payload: hook.payload.clone(),
            headers: hook.headers.clone(),
            timeout: Duration::from_secs(hook.timeout_seconds),
        }
    }
}

/// What the remote end answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: u16,
}

impl WebhookResponse {
    #[must_use]
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client used by the webhook action.
pub trait WebhookClient {
    /// Send the request and report the response status.
    ///
    /// Transport failures (DNS, connect, timeout) resolve to
    /// [`AutoRuleError::TransientIo`]. A non-2xx status is **not** an error
    /// at this level.
    fn send(
        &self,
        request: WebhookRequest,
    ) -> impl Future<Output = Result<WebhookResponse, AutoRuleError>> + Send;
}

impl<T: WebhookClient + Send + Sync> WebhookClient for Arc<T> {
    fn send(
        &self,
        request: WebhookRequest,
    ) -> impl Future<Output = Result<WebhookResponse, AutoRuleError>> + Send {
        (**self).send(request)
    }
}
