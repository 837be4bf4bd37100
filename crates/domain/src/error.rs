//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`AutoRuleError`]
//! via `#[from]`. Adapter-specific failures (database, broker, HTTP) are boxed
//! into [`AutoRuleError::TransientIo`].

/// Top-level error shared by ports, the evaluator and the executor.
#[derive(Debug, thiserror::Error)]
pub enum AutoRuleError {
    /// A domain invariant was violated.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A condition or action document cannot be interpreted.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// An action was attempted but its side effect did not land.
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// A collaborator (telemetry store, rule store, command channel, webhook
    /// transport) failed. Retried on the next tick at the earliest.
    #[error("transient I/O error: {0}")]
    TransientIo(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AutoRuleError {
    /// Box an adapter error into [`AutoRuleError::TransientIo`].
    pub fn transient(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::TransientIo(Box::new(err))
    }

    /// Whether this error comes from a misconfigured rule rather than a
    /// failing collaborator.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

/// Invariant violations on domain objects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The rule name is empty.
    #[error("name must not be empty")]
    EmptyName,
}

/// Rule documents that cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// A condition node has an unknown `type` or malformed fields.
    #[error("unsupported condition {kind:?}: {reason}")]
    UnsupportedCondition {
        /// The `type` tag found on the node, if any.
        kind: Option<String>,
        /// Why the node could not be decoded.
        reason: String,
    },

    /// An action node has an unknown `type` or malformed fields.
    #[error("unsupported action {kind:?}: {reason}")]
    UnsupportedAction {
        /// The `type` tag found on the node, if any.
        kind: Option<String>,
        /// Why the node could not be decoded.
        reason: String,
    },

    /// A device-bound node was reached without a device id.
    #[error("{node} requires a device id")]
    MissingDevice {
        /// The node type that needed the device.
        node: &'static str,
    },

    /// A `HH:MM` value could not be parsed.
    #[error("invalid time of day {0:?}, expected HH:MM")]
    InvalidTimeOfDay(String),

    /// The notification channel is not implemented.
    #[error("unsupported notification channel {0:?}")]
    UnsupportedNotification(String),
}

/// Side effects that were attempted but did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The command channel refused to publish (e.g. not connected).
    #[error("command for device {device_id} was not published")]
    CommandNotPublished {
        /// Target device.
        device_id: String,
    },

    /// The webhook target answered with a non-2xx status.
    #[error("webhook {url} answered with status {status}")]
    WebhookStatus {
        /// Target URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Some steps of a best-effort sequence failed.
    #[error("{failed} of {total} sequence steps failed")]
    SequenceIncomplete {
        /// Number of failed steps.
        failed: usize,
        /// Number of steps in the sequence.
        total: usize,
    },
}
