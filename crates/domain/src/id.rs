//! Typed identifiers.
//!
//! Rules and owners use UUID-backed newtypes. Devices are addressed by the
//! free-form string ids the external fleet registry assigns (`light_001`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[doc = $doc:expr])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl Default for $name {
            fn default() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl $name {
            /// Generate a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self::default()
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Access the inner UUID.
            #[must_use]
            pub fn as_uuid(self) -> uuid::Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(
    /// Unique identifier for an [`AutomationRule`](crate::rule::AutomationRule).
    RuleId
);

define_id!(
    /// Reference to the user owning a rule.
    OwnerId
);

/// External device identifier. An empty id means "no device".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap a device id string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` when no device is addressed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// `None` for an empty id, so callers can treat "no device" explicitly.
    #[must_use]
    pub fn as_target(&self) -> Option<&Self> {
        (!self.is_empty()).then_some(self)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DeviceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_generate_unique_ids_when_called_twice() {
        let a = RuleId::new();
        let b = RuleId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn should_roundtrip_through_display_and_from_str() {
        let id = RuleId::new();
        let parsed: RuleId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn should_return_error_when_parsing_invalid_uuid() {
        assert!(OwnerId::from_str("not-a-uuid").is_err());
    }

    #[test]
    fn should_serialize_device_id_as_plain_string() {
        let id = DeviceId::new("light_001");
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("light_001"));
    }

    #[test]
    fn should_treat_blank_device_id_as_no_target() {
        assert!(DeviceId::new("").as_target().is_none());
        assert!(DeviceId::new("  ").as_target().is_none());
        assert_eq!(
            DeviceId::new("temp_001").as_target(),
            Some(&DeviceId::new("temp_001"))
        );
    }
}
