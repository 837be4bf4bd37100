//! Condition tree: the declarative trigger of a rule.
//!
//! Conditions travel as nested JSON documents with a mandatory `type`
//! discriminator at every node. Decoding never fails: a node with an unknown
//! or missing tag, or with malformed fields, becomes
//! [`ConditionTree::Unsupported`] while its siblings decode normally.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ConfigurationError;
use crate::id::DeviceId;
use crate::time::{self, Timestamp};

const DEFAULT_THRESHOLD_WINDOW_MINUTES: f64 = 5.0;
const DEFAULT_CHANGE_WINDOW_MINUTES: f64 = 10.0;
const DEFAULT_INTERVAL_MINUTES: u32 = 60;

/// Root of a rule's trigger: the condition tree plus its rate limit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value")]
pub struct TriggerCondition {
    /// Minimum number of seconds between two firings of the rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_interval_seconds: Option<f64>,
    #[serde(flatten)]
    pub condition: ConditionTree,
}

impl TriggerCondition {
    /// Rate limit applied when the root carries no `min_interval_seconds`.
    pub const DEFAULT_MIN_INTERVAL_SECONDS: u64 = 30;

    #[must_use]
    pub fn new(condition: ConditionTree) -> Self {
        Self {
            min_interval_seconds: None,
            condition,
        }
    }

    #[must_use]
    pub fn with_min_interval(mut self, seconds: f64) -> Self {
        self.min_interval_seconds = Some(seconds);
        self
    }

    /// Effective rate limit, falling back to `default_seconds`.
    #[must_use]
    pub fn min_interval(&self, default_seconds: u64) -> std::time::Duration {
        self.min_interval_seconds
            .map_or(std::time::Duration::from_secs(default_seconds), time::seconds)
    }

    /// Decode a stored JSON text. Text that is not JSON at all yields an
    /// unsupported condition.
    #[must_use]
    pub fn from_json_str(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::from(value),
            Err(err) => Self::new(ConditionTree::unsupported(
                None,
                format!("invalid JSON: {err}"),
            )),
        }
    }
}

impl From<Value> for TriggerCondition {
    fn from(value: Value) -> Self {
        // negative or non-numeric intervals fall back to the default
        let min_interval_seconds = value
            .get("min_interval_seconds")
            .and_then(Value::as_f64)
            .filter(|seconds| *seconds >= 0.0);
        Self {
            min_interval_seconds,
            condition: ConditionTree::from(value),
        }
    }
}

/// A boolean expression evaluated against telemetry and device state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", from = "serde_json::Value")]
pub enum ConditionTree {
    /// Latest sample compared against a fixed threshold.
    ValueThreshold(ValueThreshold),
    /// Delta between the two latest samples compared against a minimum change.
    ValueChange(ValueChange),
    /// Wall-clock based predicate.
    TimeBased(TimeCondition),
    /// Current device status equals an expected value.
    DeviceStatus(DeviceStatus),
    /// Boolean combination of child conditions.
    Composite(Composite),
    /// A node that could not be decoded. Always evaluates to false.
    Unsupported {
        kind: Option<String>,
        reason: String,
    },
}

impl ConditionTree {
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
            Self::ValueThreshold(_) => "value_threshold",
            Self::ValueChange(_) => "value_change",
            Self::TimeBased(_) => "time_based",
            Self::DeviceStatus(_) => "device_status",
            Self::Composite(_) => "composite",
            Self::Unsupported { kind, .. } => kind.as_deref().unwrap_or("unknown"),
        }
    }
}

impl From<Value> for ConditionTree {
    fn from(value: Value) -> Self {
        let kind = match value.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => return Self::unsupported(None, "`type` must be a string"),
            None => return Self::unsupported(None, "missing `type` discriminator"),
        };
        let decoded = match kind.as_str() {
            "value_threshold" => serde_json::from_value(value).map(Self::ValueThreshold),
            "value_change" => serde_json::from_value(value).map(Self::ValueChange),
            "time_based" => serde_json::from_value(value).map(Self::TimeBased),
            "device_status" => serde_json::from_value(value).map(Self::DeviceStatus),
            "composite" => serde_json::from_value(value).map(Self::Composite),
            _ => return Self::unsupported(Some(kind.clone()), "unknown condition type"),
        };
        decoded.unwrap_or_else(|err| Self::unsupported(Some(kind), err.to_string()))
    }
}

impl std::fmt::Display for ConditionTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ValueThreshold(c) => write!(
                f,
                "value_threshold({} {} {} in {}m)",
                c.data_type, c.operator, c.threshold, c.time_window_minutes
            ),
            Self::ValueChange(c) => write!(
                f,
                "value_change({} {:?} >= {} in {}m)",
                c.data_type, c.change_type, c.min_change, c.time_window_minutes
            ),
            Self::TimeBased(c) => write!(f, "time_based({c:?})"),
            Self::DeviceStatus(c) => write!(f, "device_status({})", c.expected_status),
            Self::Composite(c) => write!(f, "composite({:?}, {} children)", c.operator, c.conditions.len()),
            Self::Unsupported { kind, reason } => write!(f, "unsupported({kind:?}: {reason})"),
        }
    }
}

/// Comparison used by [`ValueThreshold`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOperator {
    Gt,
    Lt,
    Eq,
    Gte,
    Lte,
}

impl ComparisonOperator {
    /// Compare `value` against `threshold`.
    ///
    /// `Eq` is exact: no epsilon is applied, which suits discrete readings
    /// (motion, switch state) but is fragile for continuous sensors.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn compare(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Eq => value == threshold,
            Self::Gte => value >= threshold,
            Self::Lte => value <= threshold,
        }
    }
}

impl std::fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Eq => "eq",
            Self::Gte => "gte",
            Self::Lte => "lte",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueThreshold {
    pub data_type: String,
    pub operator: ComparisonOperator,
    pub threshold: f64,
    #[serde(
        default = "default_threshold_window",
        alias = "window_minutes"
    )]
    pub time_window_minutes: f64,
}

/// Direction of change required by [`ValueChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Increase,
    Decrease,
    Any,
}

impl ChangeType {
    /// Whether `delta = newest - previous` satisfies this change type.
    #[must_use]
    pub fn matches(self, delta: f64, min_change: f64) -> bool {
        match self {
            Self::Increase => delta >= min_change,
            Self::Decrease => delta <= -min_change,
            Self::Any => delta.abs() >= min_change,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueChange {
    pub data_type: String,
    pub change_type: ChangeType,
    #[serde(default)]
    pub min_change: f64,
    #[serde(default = "default_change_window", alias = "window_minutes")]
    pub time_window_minutes: f64,
}

/// Wall-clock predicates, discriminated by `time_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "time_type", rename_all = "snake_case")]
pub enum TimeCondition {
    /// Local `HH:MM` within `[start_time, end_time]`, both ends inclusive.
    /// A start later than the end wraps around midnight.
    TimeOfDay { start_time: String, end_time: String },
    /// Local weekday (Monday = 0 … Sunday = 6) is in the allow-list.
    DayOfWeek {
        #[serde(default)]
        days: Vec<u8>,
    },
    /// At least `interval_minutes` elapsed since the previous trigger.
    Interval {
        #[serde(default = "default_interval_minutes")]
        interval_minutes: u32,
        /// Explicit previous trigger; the rule's last firing is used otherwise.
        #[serde(
            default,
            deserialize_with = "lenient_timestamp",
            skip_serializing_if = "Option::is_none"
        )]
        last_trigger: Option<Timestamp>,
    },
}

impl TimeCondition {
    /// Evaluate against the local wall clock `local_now` and the UTC instant
    /// `now`. `last_fired` is the rule's previous firing, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidTimeOfDay`] when a bound is not `HH:MM`.
    pub fn is_satisfied(
        &self,
        local_now: NaiveDateTime,
        now: Timestamp,
        last_fired: Option<Timestamp>,
    ) -> Result<bool, ConfigurationError> {
        match self {
            Self::TimeOfDay {
                start_time,
                end_time,
            } => {
                let start = parse_hh_mm(start_time)?;
                let end = parse_hh_mm(end_time)?;
                let current = (local_now.hour(), local_now.minute());
                if start <= end {
                    Ok(start <= current && current <= end)
                } else {
                    Ok(current >= start || current <= end)
                }
            }
            Self::DayOfWeek { days } => {
                let today = local_now.weekday().num_days_from_monday();
                Ok(days.iter().any(|day| u32::from(*day) == today))
            }
            Self::Interval {
                interval_minutes,
                last_trigger,
            } => Ok(match last_trigger.or(last_fired) {
                None => true,
                Some(previous) => now - previous >= Duration::minutes(i64::from(*interval_minutes)),
            }),
        }
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let Some(text) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    time::parse_utc(&text)
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("invalid timestamp {text:?}")))
}

fn parse_hh_mm(value: &str) -> Result<(u32, u32), ConfigurationError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map(|time| (time.hour(), time.minute()))
        .map_err(|_| ConfigurationError::InvalidTimeOfDay(value.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    #[serde(rename = "status", alias = "expected_status")]
    pub expected_status: String,
}

/// Boolean operator of a [`Composite`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositeOperator {
    #[default]
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
}

/// `AND` / `OR` over children. An empty `AND` is true, an empty `OR` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composite {
    #[serde(default)]
    pub operator: CompositeOperator,
    #[serde(default)]
    pub conditions: Vec<CompositeChild>,
}

/// A composite child. It names its own device; nothing is inherited from
/// the parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Value")]
pub struct CompositeChild {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<DeviceId>,
    #[serde(flatten)]
    pub condition: ConditionTree,
}

impl From<Value> for CompositeChild {
    fn from(value: Value) -> Self {
        let device_id = value
            .get("device_id")
            .and_then(Value::as_str)
            .map(DeviceId::from);
        Self {
            device_id,
            condition: ConditionTree::from(value),
        }
    }
}

fn default_threshold_window() -> f64 {
    DEFAULT_THRESHOLD_WINDOW_MINUTES
}

fn default_change_window() -> f64 {
    DEFAULT_CHANGE_WINDOW_MINUTES
}

fn default_interval_minutes() -> u32 {
    DEFAULT_INTERVAL_MINUTES
}
