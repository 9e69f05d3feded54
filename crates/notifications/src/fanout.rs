//! Fan-out of one new-order notification to every configured channel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::chat::{ChatMessage, ChatSender};
use crate::email::{EmailMessage, EmailSender};
use crate::error::{Channel, NotificationError, Result};
use crate::summary::OrderSummary;
use crate::templates::OrderTemplates;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// Recipients and limits for the fan-out.
#[derive(Debug, Clone)]
pub struct FanoutConfig {
    /// Recipient of order emails. `None` disables email.
    pub admin_email: Option<String>,
    /// Recipient of chat messages. `None` disables chat.
    pub chat_recipient: Option<String>,
    /// Budget for each outbound call.
    pub timeout: Duration,
    /// Maximum notifications being delivered at once.
    pub max_in_flight: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            admin_email: None,
            chat_recipient: None,
            timeout: DEFAULT_TIMEOUT,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

/// What happened on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Sent,
    /// No transport or recipient is configured.
    Skipped,
    Failed(String),
}

impl ChannelOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ChannelOutcome::Failed(_))
    }
}

/// Per-channel result of one fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub email: ChannelOutcome,
    pub chat: ChannelOutcome,
}

impl FanoutReport {
    /// Returns true if no channel failed.
    pub fn is_clean(&self) -> bool {
        !self.email.is_failed() && !self.chat.is_failed()
    }
}

/// Notifies the administrator of new orders by email and chat.
///
/// Channels run concurrently and independently; a failure or timeout on
/// one is logged and counted, never propagated.
#[derive(Clone)]
pub struct NotificationFanout {
    email: Option<Arc<dyn EmailSender>>,
    chat: Option<Arc<dyn ChatSender>>,
    config: FanoutConfig,
    templates: Arc<OrderTemplates>,
    permits: Arc<Semaphore>,
}

impl NotificationFanout {
    pub fn new(config: FanoutConfig) -> Result<Self> {
        let permits = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
        Ok(Self {
            email: None,
            chat: None,
            config,
            templates: Arc::new(OrderTemplates::new()?),
            permits,
        })
    }

    pub fn with_email(mut self, sender: Arc<dyn EmailSender>) -> Self {
        self.email = Some(sender);
        self
    }

    pub fn with_chat(mut self, sender: Arc<dyn ChatSender>) -> Self {
        self.chat = Some(sender);
        self
    }

    /// Sends the new-order notification on every channel and waits for both.
    #[tracing::instrument(skip(self, summary), fields(order_id = %summary.order_id))]
    pub async fn notify_new_order(&self, summary: &OrderSummary) -> FanoutReport {
        let timeout = self.config.timeout;

        let email = async {
            match (&self.email, &self.config.admin_email) {
                (Some(sender), Some(to)) => {
                    deliver(Channel::Email, timeout, async {
                        let rendered = self.templates.render_email(summary)?;
                        sender.send(&EmailMessage::new(to.clone(), rendered)).await
                    })
                    .await
                }
                _ => ChannelOutcome::Skipped,
            }
        };

        let chat = async {
            match (&self.chat, &self.config.chat_recipient) {
                (Some(sender), Some(chat_id)) => {
                    deliver(Channel::Chat, timeout, async {
                        let message = ChatMessage {
                            chat_id: chat_id.clone(),
                            text: self.templates.render_chat(summary)?,
                        };
                        sender.send(&message).await
                    })
                    .await
                }
                _ => ChannelOutcome::Skipped,
            }
        };

        let (email, chat) = futures_util::future::join(email, chat).await;
        FanoutReport { email, chat }
    }

    /// Runs [`notify_new_order`](Self::notify_new_order) on a background task.
    ///
    /// Each task holds one of `max_in_flight` permits from spawn to finish.
    /// When every permit is taken the notification is dropped and `None` is
    /// returned, so a burst of orders never piles up unbounded tasks.
    pub fn dispatch(&self, summary: OrderSummary) -> Option<JoinHandle<FanoutReport>> {
        let Ok(permit) = self.permits.clone().try_acquire_owned() else {
            tracing::warn!(
                order_id = %summary.order_id,
                max_in_flight = self.config.max_in_flight,
                "notification pool saturated, dropping new-order notification"
            );
            metrics::counter!("notifications_dropped_total").increment(1);
            return None;
        };

        let fanout = self.clone();
        Some(tokio::spawn(async move {
            let report = fanout.notify_new_order(&summary).await;
            drop(permit);
            report
        }))
    }
}

async fn deliver<F>(channel: Channel, timeout: Duration, send: F) -> ChannelOutcome
where
    F: Future<Output = Result<()>>,
{
    let result = match tokio::time::timeout(timeout, send).await {
        Ok(result) => result,
        Err(_) => Err(NotificationError::Timeout { channel, timeout }),
    };

    match result {
        Ok(()) => {
            metrics::counter!("notifications_sent_total", "channel" => channel.as_str())
                .increment(1);
            ChannelOutcome::Sent
        }
        Err(e) => {
            tracing::warn!(%channel, error = %e, "notification failed");
            metrics::counter!("notifications_failed_total", "channel" => channel.as_str())
                .increment(1);
            ChannelOutcome::Failed(e.to_string())
        }
    }
}
