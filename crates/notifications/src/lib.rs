//! Administrator notifications for newly placed orders.
//!
//! [`NotificationFanout`] renders an [`OrderSummary`] through Handlebars
//! templates into an email and a chat message, then delivers both
//! concurrently under a per-call timeout.

pub mod chat;
pub mod email;
pub mod error;
pub mod fanout;
pub mod summary;
pub mod templates;

pub use chat::{BotApiChatSender, ChatConfig, ChatMessage, ChatSender, InMemoryChatSender};
pub use email::{EmailMessage, EmailSender, InMemoryEmailSender, SmtpConfig, SmtpEmailSender};
pub use error::{Channel, NotificationError, Result};
pub use fanout::{ChannelOutcome, FanoutConfig, FanoutReport, NotificationFanout};
pub use summary::{OrderSummary, SummaryLine};
pub use templates::{OrderTemplates, RenderedEmail};
