//! Rule store port: read access to automation rules.

use std::future::Future;
use std::sync::Arc;

use autorule_domain::error::AutoRuleError;
use autorule_domain::rule::AutomationRule;

/// Source of the rules the engine evaluates.
///
/// Rules are authored elsewhere; the engine only ever reads them.
pub trait RuleStore {
    /// Get every rule whose `is_active` flag is set.
    fn active_rules(&self) -> impl Future<Output = Result<Vec<AutomationRule>, AutoRuleError>> + Send;
}

impl<T: RuleStore + Send + Sync> RuleStore for Arc<T> {
    fn active_rules(&self) -> impl Future<Output = Result<Vec<AutomationRule>, AutoRuleError>> + Send {
        (**self).active_rules()
    }
}
