use std::time::Duration;

use thiserror::Error;

/// An outbound notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Email,
    Chat,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Chat => "chat",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while delivering a notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// A sender or recipient address could not be parsed.
    #[error("Invalid address {address}: {reason}")]
    Address { address: String, reason: String },

    /// The email could not be assembled.
    #[error("Failed to build email: {0}")]
    Message(#[from] lettre::error::Error),

    /// The SMTP transport failed.
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// The chat API could not be reached.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The chat API answered but refused the message.
    #[error("Chat API rejected message: {0}")]
    Rejected(String),

    /// A message template failed to compile.
    #[error("Invalid template: {0}")]
    Template(#[from] handlebars::TemplateError),

    /// A message template failed to render.
    #[error("Failed to render template: {0}")]
    Render(#[from] handlebars::RenderError),

    /// The call did not finish in time.
    #[error("{channel} notification timed out after {timeout:?}")]
    Timeout { channel: Channel, timeout: Duration },

    /// Any other transport failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, NotificationError>;
