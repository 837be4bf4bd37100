//! In-memory port implementations shared by the unit tests of this crate.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use autorule_domain::error::AutoRuleError;
use autorule_domain::id::DeviceId;
use autorule_domain::rule::AutomationRule;
use autorule_domain::telemetry::TelemetrySample;
use autorule_domain::time::Timestamp;
use chrono::{NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::ports::{
    Clock, CommandChannel, RuleStore, TelemetryStore, WebhookClient, WebhookRequest,
    WebhookResponse,
};

fn unavailable(what: &str) -> AutoRuleError {
    AutoRuleError::transient(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        format!("{what} unavailable"),
    ))
}

// ── Rule store ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryRuleStore {
    rules: Mutex<Vec<AutomationRule>>,
    fail: Mutex<bool>,
    pub calls: AtomicUsize,
}

impl InMemoryRuleStore {
    pub fn with(rules: Vec<AutomationRule>) -> Self {
        Self {
            rules: Mutex::new(rules),
            ..Self::default()
        }
    }

    pub fn replace(&self, rules: Vec<AutomationRule>) {
        *self.rules.lock().unwrap() = rules;
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

impl RuleStore for InMemoryRuleStore {
    fn active_rules(&self) -> impl Future<Output = Result<Vec<AutomationRule>, AutoRuleError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = if *self.fail.lock().unwrap() {
            Err(unavailable("rule store"))
        } else {
            Ok(self
                .rules
                .lock()
                .unwrap()
                .iter()
                .filter(|rule| rule.is_active)
                .cloned()
                .collect())
        };
        async { result }
    }
}

// ── Telemetry store ────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryTelemetry {
    samples: Mutex<Vec<TelemetrySample>>,
    statuses: Mutex<HashMap<DeviceId, String>>,
    failing: Mutex<HashSet<DeviceId>>,
    pub queries: AtomicUsize,
}

impl InMemoryTelemetry {
    pub fn record(&self, sample: TelemetrySample) {
        self.samples.lock().unwrap().push(sample);
    }

    pub fn set_status(&self, device_id: &str, status: &str) {
        self.statuses
            .lock()
            .unwrap()
            .insert(DeviceId::new(device_id), status.to_string());
    }

    pub fn fail_for(&self, device_id: &str) {
        self.failing.lock().unwrap().insert(DeviceId::new(device_id));
    }

    fn check(&self, device_id: &DeviceId) -> Result<(), AutoRuleError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(device_id) {
            return Err(unavailable("telemetry store"));
        }
        Ok(())
    }
}

impl TelemetryStore for InMemoryTelemetry {
    fn recent_samples(
        &self,
        device_id: &DeviceId,
        data_type: &str,
        since: Timestamp,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<TelemetrySample>, AutoRuleError>> + Send {
        let result = self.check(device_id).map(|()| {
            let mut found: Vec<_> = self
                .samples
                .lock()
                .unwrap()
                .iter()
                .filter(|s| &s.device_id == device_id && s.data_type == data_type)
                .filter(|s| s.timestamp >= since)
                .cloned()
                .collect();
            found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            found.truncate(limit);
            found
        });
        async { result }
    }

    fn device_status(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Option<String>, AutoRuleError>> + Send {
        let result = self
            .check(device_id)
            .map(|()| self.statuses.lock().unwrap().get(device_id).cloned());
        async { result }
    }
}

// ── Command channel ────────────────────────────────────────────────

#[derive(Default)]
pub struct SpyCommandChannel {
    pub sent: Mutex<Vec<(DeviceId, Map<String, Value>)>>,
    rejecting: Mutex<HashSet<DeviceId>>,
    broken: Mutex<bool>,
}

impl SpyCommandChannel {
    pub fn reject(&self, device_id: &str) {
        self.rejecting.lock().unwrap().insert(DeviceId::new(device_id));
    }

    pub fn set_broken(&self, broken: bool) {
        *self.broken.lock().unwrap() = broken;
    }

    pub fn sent(&self) -> Vec<(DeviceId, Map<String, Value>)> {
        self.sent.lock().unwrap().clone()
    }
}

impl CommandChannel for SpyCommandChannel {
    fn publish_command(
        &self,
        device_id: &DeviceId,
        command: &Map<String, Value>,
    ) -> impl Future<Output = Result<bool, AutoRuleError>> + Send {
        let result = if *self.broken.lock().unwrap() {
            Err(unavailable("broker"))
        } else if self.rejecting.lock().unwrap().contains(device_id) {
            Ok(false)
        } else {
            self.sent
                .lock()
                .unwrap()
                .push((device_id.clone(), command.clone()));
            Ok(true)
        };
        async { result }
    }
}

// ── Webhook client ─────────────────────────────────────────────────

pub struct ScriptedWebhook {
    pub requests: Mutex<Vec<WebhookRequest>>,
    status: Mutex<Option<u16>>,
}

impl Default for ScriptedWebhook {
    fn default() -> Self {
        Self::answering(200)
    }
}

impl ScriptedWebhook {
    pub fn answering(status: u16) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            status: Mutex::new(Some(status)),
        }
    }

    /// Every request fails at the transport level.
    pub fn unreachable() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            status: Mutex::new(None),
        }
    }

    pub fn requests(&self) -> Vec<WebhookRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl WebhookClient for ScriptedWebhook {
    fn send(
        &self,
        request: WebhookRequest,
    ) -> impl Future<Output = Result<WebhookResponse, AutoRuleError>> + Send {
        self.requests.lock().unwrap().push(request);
        let result = match *self.status.lock().unwrap() {
            Some(status) => Ok(WebhookResponse { status }),
            None => Err(unavailable("webhook target")),
        };
        async { result }
    }
}

// ── Clock ──────────────────────────────────────────────────────────

/// A clock that only moves when told to. Local time is the UTC wall time.
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn at(now: Timestamp) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap()
    }

    fn local_now(&self) -> NaiveDateTime {
        self.now().naive_utc()
    }
}

/// Clock that follows tokio time, so paused-time tests see sleeps elapse.
pub struct TokioClock {
    origin: Timestamp,
    started: tokio::time::Instant,
}

impl TokioClock {
    pub fn at(origin: Timestamp) -> Self {
        Self {
            origin,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Timestamp {
        let elapsed = chrono::Duration::from_std(self.started.elapsed()).unwrap();
        self.origin + elapsed
    }

    fn local_now(&self) -> NaiveDateTime {
        self.now().naive_utc()
    }
}

/// 2024-05-06 (a Monday) at the given UTC time.
pub fn monday_at(hour: u32, minute: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 5, 6, hour, minute, 0).unwrap()
}
