use std::sync::Arc;

use autorule_app::ports::RuleStore;
use autorule_domain::error::AutoRuleError;
use autorule_domain::id::RuleId;
use autorule_domain::rule::AutomationRule;
use tokio::sync::RwLock;

/// Rules kept in insertion order.
#[derive(Clone, Default)]
pub struct VirtualRuleStore {
    rules: Arc<RwLock<Vec<AutomationRule>>>,
}

impl VirtualRuleStore {
    /// Add a rule after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`AutoRuleError::Validation`] for an invalid rule.
    pub async fn insert(&self, rule: AutomationRule) -> Result<(), AutoRuleError> {
        rule.validate()?;
        self.rules.write().await.push(rule);
        Ok(())
    }

    /// Toggle a rule. Returns `false` when no rule has this id.
    pub async fn set_active(&self, id: RuleId, is_active: bool) -> bool {
        let mut rules = self.rules.write().await;
        match rules.iter_mut().find(|rule| rule.id == id) {
            Some(rule) => {
                rule.is_active = is_active;
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.rules.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rules.read().await.is_empty()
    }
}

impl RuleStore for VirtualRuleStore {
    async fn active_rules(&self) -> Result<Vec<AutomationRule>, AutoRuleError> {
        Ok(self
            .rules
            .read()
            .await
            .iter()
            .filter(|rule| rule.is_active)
            .cloned()
            .collect())
    }
}
