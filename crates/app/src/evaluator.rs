//! Condition evaluator: decides whether a rule's trigger condition holds.
//!
//! Leaves read the telemetry store or the clock; composites recurse into
//! their children, each child against its **own** device id.

use std::future::Future;
use std::pin::Pin;

use autorule_domain::condition::{
    Composite, CompositeOperator, ConditionTree, DeviceStatus, TriggerCondition, ValueChange,
    ValueThreshold,
};
use autorule_domain::error::{AutoRuleError, ConfigurationError};
use autorule_domain::id::DeviceId;
use autorule_domain::time::{Timestamp, window_start};
use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::ports::TelemetryStore;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The instant a rule is evaluated at, plus its fire history.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext {
    pub now: Timestamp,
    /// Wall-clock time in the host timezone.
    pub local_now: NaiveDateTime,
    /// When the rule last fired, if it ever did.
    pub last_fired: Option<Timestamp>,
}

/// Evaluates condition trees against a [`TelemetryStore`].
pub struct ConditionEvaluator<TS> {
    telemetry: TS,
}

impl<TS> ConditionEvaluator<TS>
where
    TS: TelemetryStore + Sync,
{
    pub fn new(telemetry: TS) -> Self {
        Self { telemetry }
    }

    /// Evaluate `trigger` with `device_id` as the root device.
    ///
    /// Inside a composite, a misconfigured child counts as `false` and the
    /// siblings are still evaluated.
    ///
    /// # Errors
    ///
    /// - [`AutoRuleError::Configuration`] when the root node is unsupported,
    ///   has an invalid time bound, or needs a device that is missing.
    /// - [`AutoRuleError::TransientIo`] when the telemetry store fails, at any
    ///   depth.
    pub async fn evaluate(
        &self,
        trigger: &TriggerCondition,
        device_id: Option<&DeviceId>,
        ctx: &EvaluationContext,
    ) -> Result<bool, AutoRuleError> {
        self.evaluate_node(&trigger.condition, device_id, ctx).await
    }

    fn evaluate_boxed<'a>(
        &'a self,
        node: &'a ConditionTree,
        device_id: Option<&'a DeviceId>,
        ctx: &'a EvaluationContext,
    ) -> BoxFuture<'a, Result<bool, AutoRuleError>> {
        Box::pin(self.evaluate_node(node, device_id, ctx))
    }

    async fn evaluate_node(
        &self,
        node: &ConditionTree,
        device_id: Option<&DeviceId>,
        ctx: &EvaluationContext,
    ) -> Result<bool, AutoRuleError> {
        match node {
            ConditionTree::ValueThreshold(threshold) => {
                let device = require_device(device_id, "value_threshold")?;
                self.value_threshold(threshold, device, ctx).await
            }
            ConditionTree::ValueChange(change) => {
                let device = require_device(device_id, "value_change")?;
                self.value_change(change, device, ctx).await
            }
            ConditionTree::TimeBased(time) => {
                Ok(time.is_satisfied(ctx.local_now, ctx.now, ctx.last_fired)?)
            }
            ConditionTree::DeviceStatus(status) => {
                let device = require_device(device_id, "device_status")?;
                self.device_status(status, device).await
            }
            ConditionTree::Composite(composite) => self.composite(composite, ctx).await,
            ConditionTree::Unsupported { kind, reason } => {
                Err(ConfigurationError::UnsupportedCondition {
                    kind: kind.clone(),
                    reason: reason.clone(),
                }
                .into())
            }
        }
    }

    async fn value_threshold(
        &self,
        condition: &ValueThreshold,
        device: &DeviceId,
        ctx: &EvaluationContext,
    ) -> Result<bool, AutoRuleError> {
        let since = window_start(ctx.now, condition.time_window_minutes);
        let Some(sample) = self
            .telemetry
            .latest_sample(device, &condition.data_type, since)
            .await?
        else {
            debug!(device_id = %device, data_type = %condition.data_type, "no sample in window");
            return Ok(false);
        };
        Ok(condition.operator.compare(sample.value, condition.threshold))
    }

    async fn value_change(
        &self,
        condition: &ValueChange,
        device: &DeviceId,
        ctx: &EvaluationContext,
    ) -> Result<bool, AutoRuleError> {
        let since = window_start(ctx.now, condition.time_window_minutes);
        let samples = self
            .telemetry
            .recent_samples(device, &condition.data_type, since, 2)
            .await?;
        let [latest, previous] = samples.as_slice() else {
            debug!(
                device_id = %device,
                data_type = %condition.data_type,
                found = samples.len(),
                "not enough samples to compute a change"
            );
            return Ok(false);
        };
        let delta = latest.value - previous.value;
        Ok(condition.change_type.matches(delta, condition.min_change))
    }

    async fn device_status(
        &self,
        condition: &DeviceStatus,
        device: &DeviceId,
    ) -> Result<bool, AutoRuleError> {
        let status = self.telemetry.device_status(device).await?;
        Ok(status.as_deref() == Some(condition.expected_status.as_str()))
    }

    async fn composite(
        &self,
        composite: &Composite,
        ctx: &EvaluationContext,
    ) -> Result<bool, AutoRuleError> {
        for child in &composite.conditions {
            let device = child.device_id.as_ref().and_then(DeviceId::as_target);
            let holds = match self.evaluate_boxed(&child.condition, device, ctx).await {
                Ok(holds) => holds,
                Err(AutoRuleError::Configuration(err)) => {
                    warn!(
                        child = child.condition.kind(),
                        error = %err,
                        "composite child misconfigured, treating as false"
                    );
                    false
                }
                Err(err) => return Err(err),
            };
            match (composite.operator, holds) {
                (CompositeOperator::And, false) => return Ok(false),
                (CompositeOperator::Or, true) => return Ok(true),
                _ => {}
            }
        }
        Ok(composite.operator == CompositeOperator::And)
    }
}

fn require_device<'a>(
    device_id: Option<&'a DeviceId>,
    node: &'static str,
) -> Result<&'a DeviceId, ConfigurationError> {
    device_id.ok_or(ConfigurationError::MissingDevice { node })
}
