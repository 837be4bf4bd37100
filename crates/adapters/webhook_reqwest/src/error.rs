//! Webhook adapter error types.

use autorule_domain::error::AutoRuleError;

/// Errors originating from the HTTP transport.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// The request could not be sent or timed out.
    #[error("webhook request failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl From<WebhookError> for AutoRuleError {
    fn from(err: WebhookError) -> Self {
        Self::transient(err)
    }
}
