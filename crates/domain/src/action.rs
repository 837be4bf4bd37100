//! Action tree: the side effects performed when a rule fires.
//!
//! Like conditions, actions are JSON documents tagged by `type` at every
//! node and decode into [`ActionTree::Unsupported`] rather than failing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::DeviceId;

/// Timeout applied to webhook calls unless the node overrides it.
pub const DEFAULT_WEBHOOK_TIMEOUT_SECONDS: u64 = 10;

/// An operation to execute when a rule fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", from = "serde_json::Value")]
pub enum ActionTree {
    /// Forward a command payload verbatim to a device.
    DeviceCommand(DeviceCommand),
    /// Emit a notification on a channel (only `log` is built in).
    Notification(Notification),
    /// Call an HTTP endpoint.
    Webhook(Webhook),
    /// Suspend the remaining actions.
    Delay(Delay),
    /// Run sub-actions in order, each against its own device.
    Sequence(Sequence),
    /// A node that could not be decoded. Executes as a no-op.
    Unsupported {
        kind: Option<String>,
        reason: String,
    },
}

impl ActionTree {
    pub fn unsupported(kind: Option<String>, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            kind,
            reason: reason.into(),
        }
    }

    /// The wire tag of this node.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::DeviceCommand(_) => "device_command",
            Self::Notification(_) => "notification",
            Self::Webhook(_) => "webhook",
            Self::Delay(_) => "delay",
            Self::Sequence(_) => "sequence",
            Self::Unsupported { kind, .. } => kind.as_deref().unwrap_or("unknown"),
        }
    }

    /// Decode a stored JSON text. Text that is not JSON at all yields an
    /// unsupported action.
    #[must_use]
    pub fn from_json_str(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::from(value),
            Err(err) => Self::unsupported(None, format!("invalid JSON: {err}")),
        }
    }
}

impl From<Value> for ActionTree {
    fn from(value: Value) -> Self {
        let kind = match value.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => return Self::unsupported(None, "`type` must be a string"),
            None => return Self::unsupported(None, "missing `type` discriminator"),
        };
        let decoded = match kind.as_str() {
            "device_command" => serde_json::from_value(value).map(Self::DeviceCommand),
            "notification" => serde_json::from_value(value).map(Self::Notification),
            "webhook" => serde_json::from_value(value).map(Self::Webhook),
            "delay" => serde_json::from_value(value).map(Self::Delay),
            "sequence" => serde_json::from_value(value).map(Self::Sequence),
            _ => return Self::unsupported(Some(kind.clone()), "unknown action type"),
        };
        decoded.unwrap_or_else(|err| Self::unsupported(Some(kind), err.to_string()))
    }
}

impl std::fmt::Display for ActionTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeviceCommand(a) => write!(f, "device_command({})", Value::Object(a.command.clone())),
            Self::Notification(a) => write!(f, "notification({}: {})", a.notification_type, a.message),
            Self::Webhook(a) => write!(f, "webhook({} {})", a.method, a.url),
            Self::Delay(a) => write!(f, "delay({}s)", a.delay_seconds),
            Self::Sequence(a) => write!(f, "sequence({} steps)", a.actions.len()),
            Self::Unsupported { kind, reason } => write!(f, "unsupported({kind:?}: {reason})"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceCommand {
    #[serde(default)]
    pub command: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default = "default_message")]
    pub message: String,
    /// Channel name; `log` is the only built-in channel.
    #[serde(default = "default_notification_type")]
    pub notification_type: String,
}

impl Notification {
    pub const LOG: &'static str = "log";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    pub url: String,
    #[serde(default)]
    pub method: WebhookMethod,
    /// JSON body for `POST`, query parameters for `GET`.
    #[serde(default = "empty_object")]
    pub payload: Value,
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// HTTP method of a webhook. Only `GET` and `POST` are supported; any other
/// method makes the node unsupported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WebhookMethod {
    Get,
    #[default]
    Post,
}

impl TryFrom<String> for WebhookMethod {
    type Error = UnsupportedMethod;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.eq_ignore_ascii_case("GET") {
            Ok(Self::Get)
        } else if value.eq_ignore_ascii_case("POST") {
            Ok(Self::Post)
        } else {
            Err(UnsupportedMethod(value))
        }
    }
}

impl From<WebhookMethod> for String {
    fn from(value: WebhookMethod) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for WebhookMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
        })
    }
}

/// Rejected webhook method name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported webhook method {0:?}")]
pub struct UnsupportedMethod(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Delay {
    #[serde(default = "default_delay_seconds")]
    pub delay_seconds: f64,
}

impl Delay {
    /// How long to suspend; negative delays do not wait.
    #[must_use]
    pub fn duration(&self) -> std::time::Duration {
        crate::time::seconds(self.delay_seconds)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    #[serde(default)]
    pub actions: Vec<SequenceStep>,
}

/// A sequence step. It names its own target device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value")]
pub struct SequenceStep {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    #[serde(flatten)]
    pub action: ActionTree,
}

impl From<Value> for SequenceStep {
    fn from(value: Value) -> Self {
        let device_id = value
            .get("device_id")
            .and_then(Value::as_str)
            .map(DeviceId::from);
        Self {
            device_id,
            action: ActionTree::from(value),
        }
    }
}

fn default_message() -> String {
    "Automation rule triggered".to_string()
}

fn default_notification_type() -> String {
    Notification::LOG.to_string()
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([("Content-Type".to_string(), "application/json".to_string())])
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_WEBHOOK_TIMEOUT_SECONDS
}

fn default_delay_seconds() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_decode_original_light_command_document() {
        let action = ActionTree::from(serde_json::json!({
            "type": "device_command",
            "command": {"action": "turn_on", "brightness": 80}
        }));
        let ActionTree::DeviceCommand(cmd) = action else {
            panic!("expected device command");
        };
        assert_eq!(cmd.command["action"], "turn_on");
        assert_eq!(cmd.command["brightness"], 80);
    }

    #[test]
    fn should_apply_notification_defaults() {
        let action = ActionTree::from(serde_json::json!({"type": "notification"}));
        assert_eq!(
            action,
            ActionTree::Notification(Notification {
                message: "Automation rule triggered".to_string(),
                notification_type: "log".to_string(),
            })
        );
    }

    #[test]
    fn should_apply_webhook_defaults() {
        let action = ActionTree::from(serde_json::json!({
            "type": "webhook",
            "url": "http://hooks.local/rule"
        }));
        let ActionTree::Webhook(hook) = action else {
            panic!("expected webhook");
        };
        assert_eq!(hook.method, WebhookMethod::Post);
        assert_eq!(hook.timeout_seconds, 10);
        assert_eq!(hook.payload, serde_json::json!({}));
        assert_eq!(hook.headers["Content-Type"], "application/json");
    }

    #[test]
    fn should_parse_webhook_method_case_insensitively() {
        let action = ActionTree::from(serde_json::json!({
            "type": "webhook", "url": "http://x", "method": "get"
        }));
        assert!(matches!(action, ActionTree::Webhook(ref h) if h.method == WebhookMethod::Get));
    }

    #[test]
    fn should_decode_unsupported_webhook_method_as_unsupported_node() {
        let action = ActionTree::from(serde_json::json!({
            "type": "webhook", "url": "http://x", "method": "PUT"
        }));
        let ActionTree::Unsupported { kind, reason } = action else {
            panic!("expected unsupported");
        };
        assert_eq!(kind.as_deref(), Some("webhook"));
        assert!(reason.contains("PUT"));
    }

    #[test]
    fn should_default_delay_to_one_second() {
        let action = ActionTree::from(serde_json::json!({"type": "delay"}));
        assert_eq!(action, ActionTree::Delay(Delay { delay_seconds: 1.0 }));
    }

    #[test]
    fn should_accept_fractional_delay() {
        let action = ActionTree::from(serde_json::json!({"type": "delay", "delay_seconds": 0.5}));
        let ActionTree::Delay(delay) = action else {
            panic!("expected delay");
        };
        assert_eq!(delay.duration(), std::time::Duration::from_millis(500));
        assert_eq!(
            Delay { delay_seconds: -2.0 }.duration(),
            std::time::Duration::ZERO
        );
    }

    #[test]
    fn should_decode_sequence_steps_with_their_own_devices() {
        let action = ActionTree::from(serde_json::json!({
            "type": "sequence",
            "actions": [
                {"device_id": "light_001", "type": "device_command", "command": {"action": "turn_on"}},
                {"device_id": "light_002", "type": "teleport"},
                {"type": "delay", "delay_seconds": 2}
            ]
        }));
        let ActionTree::Sequence(seq) = action else {
            panic!("expected sequence");
        };
        assert_eq!(seq.actions.len(), 3);
        assert_eq!(seq.actions[0].device_id, Some(DeviceId::new("light_001")));
        assert!(matches!(seq.actions[1].action, ActionTree::Unsupported { .. }));
        assert_eq!(seq.actions[2].device_id, None);
        assert_eq!(seq.actions[2].action, ActionTree::Delay(Delay { delay_seconds: 2.0 }));
    }

    #[test]
    fn should_decode_unknown_action_type_as_unsupported() {
        let action = ActionTree::from(serde_json::json!({"type": "sms_blast"}));
        assert_eq!(action.kind(), "sms_blast");
        assert!(matches!(action, ActionTree::Unsupported { .. }));
    }

    #[test]
    fn should_decode_invalid_json_text_as_unsupported() {
        assert!(matches!(
            ActionTree::from_json_str("not json"),
            ActionTree::Unsupported { kind: None, .. }
        ));
    }

    #[test]
    fn should_serialize_sequence_with_flattened_steps() {
        let action = ActionTree::Sequence(Sequence {
            actions: vec![SequenceStep {
                device_id: Some(DeviceId::new("light_001")),
                action: ActionTree::Delay(Delay { delay_seconds: 3.0 }),
            }],
        });
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "sequence");
        assert_eq!(json["actions"][0]["type"], "delay");
        assert_eq!(json["actions"][0]["device_id"], "light_001");
        assert_eq!(json["actions"][0]["delay_seconds"], 3.0);

        let parsed: ActionTree = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, action);
    }

    #[test]
    fn should_display_actions_compactly() {
        assert_eq!(ActionTree::Delay(Delay { delay_seconds: 5.0 }).to_string(), "delay(5s)");
    }
}
