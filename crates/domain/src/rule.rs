//! Automation rule: a trigger condition paired with an action tree.
//!
//! Rules are created and edited by an external API. The engine only reads
//! them, and never evaluates a rule whose `is_active` flag is false.

use serde::{Deserialize, Serialize};

use crate::action::ActionTree;
use crate::condition::{ConditionTree, TriggerCondition};
use crate::error::{AutoRuleError, ValidationError};
use crate::id::{DeviceId, OwnerId, RuleId};
use crate::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: RuleId,
    pub name: String,
    pub description: Option<String>,
    /// Device the root condition is evaluated against.
    pub trigger_device_id: DeviceId,
    pub trigger_condition: TriggerCondition,
    /// Device the root action targets.
    pub action_device_id: DeviceId,
    pub action_command: ActionTree,
    pub is_active: bool,
    pub owner_id: OwnerId,
    pub created_at: Timestamp,
}

impl AutomationRule {
    /// Create a builder for constructing an [`AutomationRule`].
    #[must_use]
    pub fn builder() -> AutomationRuleBuilder {
        AutomationRuleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AutoRuleError::Validation`] when `name` is empty
    /// ([`ValidationError::EmptyName`]).
    pub fn validate(&self) -> Result<(), AutoRuleError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`AutomationRule`].
#[derive(Debug, Default)]
pub struct AutomationRuleBuilder {
    id: Option<RuleId>,
    name: Option<String>,
    description: Option<String>,
    trigger_device_id: DeviceId,
    trigger_condition: Option<TriggerCondition>,
    action_device_id: DeviceId,
    action_command: Option<ActionTree>,
    is_active: Option<bool>,
    owner_id: Option<OwnerId>,
    created_at: Option<Timestamp>,
}

impl AutomationRuleBuilder {
    #[must_use]
    pub fn id(mut self, id: RuleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn trigger_device(mut self, device_id: impl Into<DeviceId>) -> Self {
        self.trigger_device_id = device_id.into();
        self
    }

    #[must_use]
    pub fn trigger(mut self, trigger: TriggerCondition) -> Self {
        self.trigger_condition = Some(trigger);
        self
    }

    #[must_use]
    pub fn action_device(mut self, device_id: impl Into<DeviceId>) -> Self {
        self.action_device_id = device_id.into();
        self
    }

    #[must_use]
    pub fn action(mut self, action: ActionTree) -> Self {
        self.action_command = Some(action);
        self
    }

    #[must_use]
    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    #[must_use]
    pub fn owner(mut self, owner_id: OwnerId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    #[must_use]
    pub fn created_at(mut self, ts: Timestamp) -> Self {
        self.created_at = Some(ts);
        self
    }

    /// Consume the builder, validate, and return an [`AutomationRule`].
    ///
    /// Missing trees default to unsupported nodes, which never fire.
    ///
    /// # Errors
    ///
    /// Returns [`AutoRuleError::Validation`] if the name is missing or empty.
    pub fn build(self) -> Result<AutomationRule, AutoRuleError> {
        let rule = AutomationRule {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            description: self.description,
            trigger_device_id: self.trigger_device_id,
            trigger_condition: self.trigger_condition.unwrap_or_else(|| {
                TriggerCondition::new(ConditionTree::unsupported(None, "no trigger condition"))
            }),
            action_device_id: self.action_device_id,
            action_command: self
                .action_command
                .unwrap_or_else(|| ActionTree::unsupported(None, "no action")),
            is_active: self.is_active.unwrap_or(true),
            owner_id: self.owner_id.unwrap_or_default(),
            created_at: self.created_at.unwrap_or_else(crate::time::now),
        };
        rule.validate()?;
        Ok(rule)
    }
}
