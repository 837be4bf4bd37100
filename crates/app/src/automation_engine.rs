//! Rule engine: the periodic loop that evaluates rules and fires actions.
//!
//! Every tick the engine loads the active rules, skips those still inside
//! their rate-limit window, evaluates the rest and executes the action of
//! each rule whose condition holds. Rules are processed sequentially; a
//! failing rule never prevents the following ones from being processed.

use std::collections::HashSet;
use std::time::Duration;

use autorule_domain::condition::TriggerCondition;
use autorule_domain::error::AutoRuleError;
use autorule_domain::id::RuleId;
use autorule_domain::rule::AutomationRule;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::evaluator::{ConditionEvaluator, EvaluationContext};
use crate::executor::ActionExecutor;
use crate::fire_state::FireStateTracker;
use crate::ports::{Clock, CommandChannel, RuleStore, SystemClock, TelemetryStore, WebhookClient};

/// Engine tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Pause between the end of a tick and the start of the next one.
    pub tick_interval: Duration,
    /// Rate limit for rules whose trigger carries no `min_interval_seconds`.
    pub default_min_interval_seconds: u64,
    /// Forget the fire state of rules that are no longer active.
    pub evict_stale_fire_state: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            default_min_interval_seconds: TriggerCondition::DEFAULT_MIN_INTERVAL_SECONDS,
            evict_stale_fire_state: true,
        }
    }
}

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Active rules loaded from the store.
    pub rules: usize,
    /// Rules skipped because they fired too recently.
    pub rate_limited: usize,
    /// Rules whose condition was evaluated.
    pub evaluated: usize,
    /// Rules whose condition held, in processing order.
    pub fired: Vec<RuleId>,
    /// Fired rules whose action did not fully succeed.
    pub action_failures: usize,
    /// Rules whose evaluation failed on a collaborator.
    pub failed: usize,
    /// Fire-state entries dropped for rules no longer active.
    pub evicted: usize,
}

enum RuleOutcome {
    RateLimited,
    NotMet,
    Failed,
    Fired { action_ok: bool },
}

/// Periodic rule engine.
pub struct RuleEngine<RS, TS, CC, WC, C = SystemClock> {
    rules: RS,
    evaluator: ConditionEvaluator<TS>,
    executor: ActionExecutor<CC, WC>,
    fire_state: FireStateTracker,
    clock: C,
    config: EngineConfig,
}

impl<RS, TS, CC, WC> RuleEngine<RS, TS, CC, WC, SystemClock>
where
    RS: RuleStore + Sync,
    TS: TelemetryStore + Sync,
    CC: CommandChannel + Sync,
    WC: WebhookClient + Sync,
{
    /// Create an engine driven by the system clock.
    pub fn new(rules: RS, telemetry: TS, commands: CC, webhooks: WC, config: EngineConfig) -> Self {
        Self::with_clock(rules, telemetry, commands, webhooks, SystemClock, config)
    }
}

impl<RS, TS, CC, WC, C> RuleEngine<RS, TS, CC, WC, C>
where
    RS: RuleStore + Sync,
    TS: TelemetryStore + Sync,
    CC: CommandChannel + Sync,
    WC: WebhookClient + Sync,
    C: Clock,
{
    pub fn with_clock(
        rules: RS,
        telemetry: TS,
        commands: CC,
        webhooks: WC,
        clock: C,
        config: EngineConfig,
    ) -> Self {
        Self {
            rules,
            evaluator: ConditionEvaluator::new(telemetry),
            executor: ActionExecutor::new(commands, webhooks),
            fire_state: FireStateTracker::new(),
            clock,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn fire_state(&self) -> &FireStateTracker {
        &self.fire_state
    }

    /// Run a single pass over the active rules.
    ///
    /// # Errors
    ///
    /// Returns the rule store error when the rules cannot be loaded. Nothing
    /// is evaluated in that case.
    pub async fn tick(&mut self) -> Result<TickReport, AutoRuleError> {
        let rules = self.rules.active_rules().await?;
        let mut report = TickReport {
            rules: rules.len(),
            ..TickReport::default()
        };

        if self.config.evict_stale_fire_state {
            let active: HashSet<RuleId> = rules
                .iter()
                .filter(|rule| rule.is_active)
                .map(|rule| rule.id)
                .collect();
            report.evicted = self.fire_state.retain_rules(&active);
        }

        for rule in &rules {
            if !rule.is_active {
                continue;
            }
            match self.process_rule(rule).await {
                RuleOutcome::RateLimited => report.rate_limited += 1,
                RuleOutcome::NotMet => report.evaluated += 1,
                RuleOutcome::Failed => {
                    report.evaluated += 1;
                    report.failed += 1;
                }
                RuleOutcome::Fired { action_ok } => {
                    report.evaluated += 1;
                    report.fired.push(rule.id);
                    if !action_ok {
                        report.action_failures += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    #[tracing::instrument(skip_all, fields(rule_id = %rule.id, rule = %rule.name))]
    async fn process_rule(&mut self, rule: &AutomationRule) -> RuleOutcome {
        let now = self.clock.now();
        let min_interval = rule
            .trigger_condition
            .min_interval(self.config.default_min_interval_seconds);
        if !self.fire_state.is_due(rule.id, min_interval, now) {
            trace!("rate limited");
            return RuleOutcome::RateLimited;
        }

        let ctx = EvaluationContext {
            now,
            local_now: self.clock.local_now(),
            last_fired: self.fire_state.last_fired(rule.id),
        };
        let holds = match self
            .evaluator
            .evaluate(&rule.trigger_condition, rule.trigger_device_id.as_target(), &ctx)
            .await
        {
            Ok(holds) => holds,
            Err(err) if err.is_configuration() => {
                warn!(error = %err, "condition misconfigured, treating as false");
                return RuleOutcome::NotMet;
            }
            Err(err) => {
                error!(error = %err, "condition evaluation failed");
                return RuleOutcome::Failed;
            }
        };
        if !holds {
            return RuleOutcome::NotMet;
        }

        info!(action = %rule.action_command, "rule triggered");
        let result = self
            .executor
            .execute(&rule.action_command, rule.action_device_id.as_target())
            .await;
        // a delay inside the action pushes the next due time back with it
        self.fire_state.record_fire(rule.id, self.clock.now());

        match result {
            Ok(()) => RuleOutcome::Fired { action_ok: true },
            Err(err) if err.is_configuration() => {
                warn!(error = %err, "action misconfigured");
                RuleOutcome::Fired { action_ok: false }
            }
            Err(err) => {
                error!(error = %err, "action failed");
                RuleOutcome::Fired { action_ok: false }
            }
        }
    }

    /// Tick until `stop` turns true (or its sender is dropped).
    ///
    /// The stop signal is only observed between ticks; a tick in progress,
    /// including any `delay` action, always runs to completion.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        info!(tick_interval = ?self.config.tick_interval, "rule engine started");
        loop {
            if *stop.borrow() {
                break;
            }
            match self.tick().await {
                Ok(report) => debug!(
                    rules = report.rules,
                    rate_limited = report.rate_limited,
                    evaluated = report.evaluated,
                    fired = report.fired.len(),
                    failed = report.failed,
                    "tick complete"
                ),
                Err(err) => error!(error = %err, "failed to load active rules, skipping tick"),
            }
            tokio::select! {
                () = tokio::time::sleep(self.config.tick_interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("rule engine stopped");
    }

    /// Start the loop on the tokio runtime.
    pub fn spawn(self) -> EngineHandle
    where
        RS: Send + 'static,
        TS: Send + 'static,
        CC: Send + 'static,
        WC: Send + 'static,
        C: 'static,
    {
        let (stop, receiver) = watch::channel(false);
        let task = tokio::spawn(self.run(receiver));
        EngineHandle { stop, task }
    }
}

/// Control handle of a spawned [`RuleEngine`].
#[derive(Debug)]
pub struct EngineHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl EngineHandle {
    /// Ask the loop to exit after the current tick.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the loop and wait for it to exit.
    ///
    /// # Errors
    ///
    /// Returns the join error if the engine task panicked.
    pub async fn shutdown(self) -> Result<(), tokio::task::JoinError> {
        self.stop();
        self.task.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{
        InMemoryRuleStore, InMemoryTelemetry, ManualClock, ScriptedWebhook, SpyCommandChannel,
        TokioClock, monday_at,
    };
    use autorule_domain::action::ActionTree;
    use autorule_domain::telemetry::TelemetrySample;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    type TestEngine = RuleEngine<
        Arc<InMemoryRuleStore>,
        Arc<InMemoryTelemetry>,
        Arc<SpyCommandChannel>,
        Arc<ScriptedWebhook>,
        Arc<ManualClock>,
    >;

    struct Harness {
        rules: Arc<InMemoryRuleStore>,
        telemetry: Arc<InMemoryTelemetry>,
        commands: Arc<SpyCommandChannel>,
        clock: Arc<ManualClock>,
        engine: TestEngine,
    }

    fn harness(rules: Vec<AutomationRule>) -> Harness {
        let rules = Arc::new(InMemoryRuleStore::with(rules));
        let telemetry = Arc::new(InMemoryTelemetry::default());
        let commands = Arc::new(SpyCommandChannel::default());
        let clock = Arc::new(ManualClock::at(monday_at(12, 0)));
        let engine = RuleEngine::with_clock(
            Arc::clone(&rules),
            Arc::clone(&telemetry),
            Arc::clone(&commands),
            Arc::new(ScriptedWebhook::default()),
            Arc::clone(&clock),
            EngineConfig::default(),
        );
        Harness {
            rules,
            telemetry,
            commands,
            clock,
            engine,
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn motion_lights() -> AutomationRule {
        AutomationRule::builder()
            .name("Motion Activated Lights")
            .trigger_device("motion_001")
            .trigger(
                serde_json::from_value(json!({
                    "type": "value_threshold", "data_type": "motion",
                    "operator": "eq", "threshold": 1, "time_window_minutes": 1
                }))
                .unwrap(),
            )
            .action_device("light_001")
            .action(
                serde_json::from_value(json!({
                    "type": "device_command",
                    "command": {"action": "turn_on", "brightness": 80}
                }))
                .unwrap(),
            )
            .build()
            .unwrap()
    }

    fn status_rule(name: &str, device: &str, action_device: &str) -> AutomationRule {
        AutomationRule::builder()
            .name(name)
            .trigger_device(device)
            .trigger(serde_json::from_value(json!({"type": "device_status", "status": "open"})).unwrap())
            .action_device(action_device)
            .action(
                serde_json::from_value(json!({"type": "device_command", "command": {"action": "ping"}}))
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    fn motion_at(h: &Harness) {
        h.telemetry.record(TelemetrySample::new(
            "motion_001",
            "motion",
            1.0,
            h.clock.now() - chrono::Duration::seconds(10),
        ));
    }

    fn seconds(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    // ── Firing and rate limiting ───────────────────────────────────

    #[tokio::test]
    async fn should_fire_motion_rule_once_within_rate_limit() {
        let rule = motion_lights();
        let mut h = harness(vec![rule.clone()]);
        motion_at(&h);

        let report = h.engine.tick().await.unwrap();
        assert_eq!(report.fired, vec![rule.id]);
        assert_eq!(h.commands.sent().len(), 1);
        assert_eq!(h.commands.sent()[0].0.as_str(), "light_001");

        h.clock.advance(seconds(5));
        motion_at(&h);
        let report = h.engine.tick().await.unwrap();
        assert!(report.fired.is_empty());
        assert_eq!(report.rate_limited, 1);
        assert_eq!(h.commands.sent().len(), 1);
    }

    #[tokio::test]
    async fn should_fire_again_once_min_interval_elapsed() {
        let mut h = harness(vec![motion_lights()]);
        motion_at(&h);
        h.engine.tick().await.unwrap();

        h.clock.advance(seconds(30));
        motion_at(&h);
        let report = h.engine.tick().await.unwrap();

        assert_eq!(report.fired.len(), 1);
        assert_eq!(h.commands.sent().len(), 2);
    }

    #[tokio::test]
    async fn should_honor_min_interval_from_trigger() {
        let mut rule = motion_lights();
        rule.trigger_condition.min_interval_seconds = Some(0.0);
        let mut h = harness(vec![rule]);
        motion_at(&h);

        h.engine.tick().await.unwrap();
        let report = h.engine.tick().await.unwrap();

        assert_eq!(report.fired.len(), 1);
        assert_eq!(h.commands.sent().len(), 2);
    }

    #[tokio::test]
    async fn should_not_evaluate_rate_limited_rule() {
        let mut h = harness(vec![motion_lights()]);
        motion_at(&h);
        h.engine.tick().await.unwrap();
        let queries = h.telemetry.queries.load(Ordering::SeqCst);

        h.clock.advance(seconds(1));
        h.engine.tick().await.unwrap();

        assert_eq!(h.telemetry.queries.load(Ordering::SeqCst), queries);
    }

    #[tokio::test]
    async fn should_record_fire_even_when_action_fails() {
        let mut h = harness(vec![motion_lights()]);
        h.commands.reject("light_001");
        motion_at(&h);

        let report = h.engine.tick().await.unwrap();
        assert_eq!(report.fired.len(), 1);
        assert_eq!(report.action_failures, 1);

        h.clock.advance(seconds(1));
        let report = h.engine.tick().await.unwrap();
        assert_eq!(report.rate_limited, 1);
    }

    #[tokio::test]
    async fn should_not_record_fire_when_condition_false() {
        let rule = motion_lights();
        let mut h = harness(vec![rule.clone()]);

        let report = h.engine.tick().await.unwrap();

        assert_eq!(report.evaluated, 1);
        assert!(report.fired.is_empty());
        assert!(h.engine.fire_state().last_fired(rule.id).is_none());
    }

    // ── Isolation ──────────────────────────────────────────────────

    #[tokio::test]
    async fn should_skip_inactive_rules() {
        let mut rule = motion_lights();
        rule.is_active = false;
        let mut h = harness(vec![]);
        h.rules.replace(vec![rule]);
        motion_at(&h);

        let report = h.engine.tick().await.unwrap();

        assert_eq!(report.rules, 0);
        assert!(h.commands.sent().is_empty());
    }

    #[tokio::test]
    async fn should_process_remaining_rules_after_a_failing_one() {
        let broken = status_rule("Broken", "door_001", "siren_001");
        let healthy = status_rule("Healthy", "door_002", "siren_002");
        let mut h = harness(vec![broken, healthy.clone()]);
        h.telemetry.fail_for("door_001");
        h.telemetry.set_status("door_002", "open");

        let report = h.engine.tick().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.fired, vec![healthy.id]);
        assert_eq!(h.commands.sent()[0].0.as_str(), "siren_002");
    }

    #[tokio::test]
    async fn should_treat_unsupported_condition_as_not_met() {
        let mut rule = motion_lights();
        rule.trigger_condition = serde_json::from_value(json!({"type": "geofence"})).unwrap();
        let mut h = harness(vec![rule]);

        let report = h.engine.tick().await.unwrap();

        assert_eq!(report.evaluated, 1);
        assert_eq!(report.failed, 0);
        assert!(report.fired.is_empty());
    }

    #[tokio::test]
    async fn should_skip_tick_when_rule_store_fails() {
        let mut h = harness(vec![motion_lights()]);
        h.rules.set_failing(true);
        motion_at(&h);

        assert!(h.engine.tick().await.is_err());
        assert!(h.commands.sent().is_empty());

        h.rules.set_failing(false);
        let report = h.engine.tick().await.unwrap();
        assert_eq!(report.fired.len(), 1);
    }

    #[tokio::test]
    async fn should_evict_fire_state_of_deactivated_rules() {
        let rule = motion_lights();
        let mut h = harness(vec![rule.clone()]);
        motion_at(&h);
        h.engine.tick().await.unwrap();
        assert_eq!(h.engine.fire_state().len(), 1);

        h.rules.replace(vec![]);
        let report = h.engine.tick().await.unwrap();

        assert_eq!(report.evicted, 1);
        assert!(h.engine.fire_state().is_empty());
    }

    // ── Time-based and delays ──────────────────────────────────────

    #[tokio::test]
    async fn should_fire_interval_rule_once_per_interval() {
        let rule = AutomationRule::builder()
            .name("Hourly report")
            .trigger(
                serde_json::from_value(json!({
                    "type": "time_based", "time_type": "interval", "interval_minutes": 60
                }))
                .unwrap(),
            )
            .action(ActionTree::from(json!({"type": "notification", "message": "tick"})))
            .build()
            .unwrap();
        let mut h = harness(vec![rule]);

        assert_eq!(h.engine.tick().await.unwrap().fired.len(), 1);
        h.clock.advance(chrono::Duration::minutes(30));
        assert!(h.engine.tick().await.unwrap().fired.is_empty());
        h.clock.advance(chrono::Duration::minutes(30));
        assert_eq!(h.engine.tick().await.unwrap().fired.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_block_tick_until_delay_completes() {
        let mut delayed = status_rule("Delayed", "door_001", "siren_001");
        delayed.action_command = ActionTree::from(json!({
            "type": "sequence",
            "actions": [
                {"type": "delay", "delay_seconds": 10},
                {"type": "device_command", "device_id": "siren_001", "command": {"action": "on"}}
            ]
        }));
        let next = status_rule("Next", "door_002", "siren_002");
        let mut h = harness(vec![delayed, next]);
        h.telemetry.set_status("door_001", "open");
        h.telemetry.set_status("door_002", "open");

        let started = tokio::time::Instant::now();
        let report = h.engine.tick().await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(10));
        assert_eq!(report.fired.len(), 2);
        let targets: Vec<_> = h.commands.sent().into_iter().map(|(d, _)| d.to_string()).collect();
        assert_eq!(targets, vec!["siren_001", "siren_002"]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_rate_limit_from_end_of_long_delay() {
        let mut delayed = status_rule("Delayed", "door_001", "siren_001");
        delayed.trigger_condition = serde_json::from_value(json!({
            "type": "device_status", "status": "open", "min_interval_seconds": 30
        }))
        .unwrap();
        delayed.action_command = ActionTree::from(json!({
            "type": "sequence",
            "actions": [
                {"type": "delay", "delay_seconds": 40},
                {"type": "device_command", "device_id": "siren_001", "command": {"action": "on"}}
            ]
        }));
        let telemetry = Arc::new(InMemoryTelemetry::default());
        telemetry.set_status("door_001", "open");
        let commands = Arc::new(SpyCommandChannel::default());
        let mut engine = RuleEngine::with_clock(
            Arc::new(InMemoryRuleStore::with(vec![delayed])),
            Arc::clone(&telemetry),
            Arc::clone(&commands),
            Arc::new(ScriptedWebhook::default()),
            TokioClock::at(monday_at(12, 0)),
            EngineConfig::default(),
        );

        let first = engine.tick().await.unwrap();
        let second = engine.tick().await.unwrap();

        assert_eq!(first.fired.len(), 1);
        assert_eq!(second.rate_limited, 1);
        assert!(second.fired.is_empty());
        assert_eq!(commands.sent().len(), 1);
    }

    // ── Loop ───────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn should_tick_periodically_until_stopped() {
        let h = harness(vec![motion_lights()]);
        let rules = Arc::clone(&h.rules);
        let handle = h.engine.spawn();
        assert!(handle.is_running());

        tokio::time::sleep(Duration::from_secs(12)).await;
        handle.shutdown().await.unwrap();

        assert!(rules.calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_looping_after_rule_store_failure() {
        let h = harness(vec![motion_lights()]);
        h.rules.set_failing(true);
        let rules = Arc::clone(&h.rules);
        let handle = h.engine.spawn();

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert!(handle.is_running());
        handle.shutdown().await.unwrap();

        assert!(rules.calls.load(Ordering::SeqCst) >= 2);
    }
}
