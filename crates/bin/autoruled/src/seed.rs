//! Demo rules inserted into an empty store when `[demo].seed_sample_rules`
//! is enabled.

use autorule_domain::action::ActionTree;
use autorule_domain::condition::TriggerCondition;
use autorule_domain::error::AutoRuleError;
use autorule_domain::id::OwnerId;
use autorule_domain::rule::AutomationRule;
use serde_json::json;

/// The three sample rules, owned by `owner`:
///
/// 1. motion on `motion_001` turns `light_001` on;
/// 2. temperature above 25 on `temp_001` logs a notification;
/// 3. between 18:00 and 18:01 both living-room lights are turned on.
///
/// # Errors
///
/// Never fails in practice; the builder validation is propagated as-is.
pub fn sample_rules(owner: OwnerId) -> Result<Vec<AutomationRule>, AutoRuleError> {
    let motion_lights = AutomationRule::builder()
        .name("Motion Activated Lights")
        .description("Turn on living room light when motion is detected in hallway")
        .trigger_device("motion_001")
        .trigger(TriggerCondition::from(json!({
            "type": "value_threshold",
            "data_type": "motion",
            "operator": "eq",
            "threshold": 1,
            "time_window_minutes": 1,
            "min_interval_seconds": 30
        })))
        .action_device("light_001")
        .action(ActionTree::from(json!({
            "type": "device_command",
            "command": {"action": "turn_on", "brightness": 80}
        })))
        .owner(owner)
        .build()?;

    let temperature_alert = AutomationRule::builder()
        .name("High Temperature Alert")
        .description("Send notification when temperature exceeds 25°C")
        .trigger_device("temp_001")
        .trigger(TriggerCondition::from(json!({
            "type": "value_threshold",
            "data_type": "temperature",
            "operator": "gt",
            "threshold": 25.0,
            "time_window_minutes": 5,
            "min_interval_seconds": 300
        })))
        .action(ActionTree::from(json!({
            "type": "notification",
            "message": "High temperature detected in Living Room",
            "notification_type": "log"
        })))
        .owner(owner)
        .build()?;

    let evening_lights = AutomationRule::builder()
        .name("Evening Lights")
        .description("Turn on all lights at sunset")
        .trigger(TriggerCondition::from(json!({
            "type": "time_based",
            "time_type": "time_of_day",
            "start_time": "18:00",
            "end_time": "18:01"
        })))
        .action_device("light_001")
        .action(ActionTree::from(json!({
            "type": "sequence",
            "actions": [
                {"device_id": "light_001", "type": "device_command", "command": {"action": "turn_on", "brightness": 60}},
                {"device_id": "light_002", "type": "device_command", "command": {"action": "turn_on", "brightness": 60}}
            ]
        })))
        .owner(owner)
        .build()?;

    Ok(vec![motion_lights, temperature_alert, evening_lights])
}
