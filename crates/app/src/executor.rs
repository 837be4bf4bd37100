//! Action executor: performs the side effects of a fired rule.

use std::future::Future;
use std::pin::Pin;

use autorule_domain::action::{ActionTree, DeviceCommand, Notification, Sequence, Webhook};
use autorule_domain::error::{AutoRuleError, ConfigurationError, DeliveryError};
use autorule_domain::id::DeviceId;
use tracing::{debug, error, info, warn};

use crate::ports::{CommandChannel, WebhookClient, WebhookRequest};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Dispatches action trees to the command channel and the webhook client.
pub struct ActionExecutor<CC, WC> {
    commands: CC,
    webhooks: WC,
}

impl<CC, WC> ActionExecutor<CC, WC>
where
    CC: CommandChannel + Sync,
    WC: WebhookClient + Sync,
{
    pub fn new(commands: CC, webhooks: WC) -> Self {
        Self { commands, webhooks }
    }

    /// Execute `action` with `device_id` as the root target.
    ///
    /// A `delay` node suspends the caller for its whole duration.
    ///
    /// # Errors
    ///
    /// - [`AutoRuleError::Configuration`] for unsupported nodes, unknown
    ///   notification channels, or a device command without a target.
    /// - [`AutoRuleError::Delivery`] when a command is refused, a webhook
    ///   answers non-2xx, or some steps of a sequence failed.
    /// - [`AutoRuleError::TransientIo`] when a collaborator fails.
    pub async fn execute(
        &self,
        action: &ActionTree,
        device_id: Option<&DeviceId>,
    ) -> Result<(), AutoRuleError> {
        self.execute_node(action, device_id).await
    }

    fn execute_boxed<'a>(
        &'a self,
        action: &'a ActionTree,
        device_id: Option<&'a DeviceId>,
    ) -> BoxFuture<'a, Result<(), AutoRuleError>> {
        Box::pin(self.execute_node(action, device_id))
    }

    async fn execute_node(
        &self,
        action: &ActionTree,
        device_id: Option<&DeviceId>,
    ) -> Result<(), AutoRuleError> {
        match action {
            ActionTree::DeviceCommand(command) => {
                let device = device_id.ok_or(ConfigurationError::MissingDevice {
                    node: "device_command",
                })?;
                self.device_command(command, device).await
            }
            ActionTree::Notification(notification) => notify(notification),
            ActionTree::Webhook(hook) => self.webhook(hook).await,
            ActionTree::Delay(delay) => {
                debug!(seconds = delay.delay_seconds, "delaying");
                tokio::time::sleep(delay.duration()).await;
                Ok(())
            }
            ActionTree::Sequence(sequence) => self.sequence(sequence).await,
            ActionTree::Unsupported { kind, reason } => Err(ConfigurationError::UnsupportedAction {
                kind: kind.clone(),
                reason: reason.clone(),
            }
            .into()),
        }
    }

    async fn device_command(
        &self,
        command: &DeviceCommand,
        device: &DeviceId,
    ) -> Result<(), AutoRuleError> {
        if self
            .commands
            .publish_command(device, &command.command)
            .await?
        {
            info!(device_id = %device, command = ?command.command, "command sent");
            Ok(())
        } else {
            Err(DeliveryError::CommandNotPublished {
                device_id: device.to_string(),
            }
            .into())
        }
    }

    async fn webhook(&self, hook: &Webhook) -> Result<(), AutoRuleError> {
        let response = self.webhooks.send(WebhookRequest::from(hook)).await?;
        if !response.is_success() {
            return Err(DeliveryError::WebhookStatus {
                url: hook.url.clone(),
                status: response.status,
            }
            .into());
        }
        info!(url = %hook.url, method = %hook.method, status = response.status, "webhook executed");
        Ok(())
    }

    /// Best effort: every step runs even when an earlier one failed.
    async fn sequence(&self, sequence: &Sequence) -> Result<(), AutoRuleError> {
        let total = sequence.actions.len();
        let mut failed = 0;
        for (index, step) in sequence.actions.iter().enumerate() {
            let device = step.device_id.as_ref().and_then(DeviceId::as_target);
            if let Err(err) = self.execute_boxed(&step.action, device).await {
                failed += 1;
                if err.is_configuration() {
                    warn!(step = index, action = step.action.kind(), error = %err, "sequence step skipped");
                } else {
                    error!(step = index, action = step.action.kind(), error = %err, "sequence step failed");
                }
            }
        }
        if failed == 0 {
            Ok(())
        } else {
            Err(DeliveryError::SequenceIncomplete { failed, total }.into())
        }
    }
}

fn notify(notification: &Notification) -> Result<(), AutoRuleError> {
    if notification.notification_type != Notification::LOG {
        return Err(
            ConfigurationError::UnsupportedNotification(notification.notification_type.clone())
                .into(),
        );
    }
    info!(message = %notification.message, "automation notification");
    Ok(())
}
