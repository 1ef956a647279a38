//! Fire-and-forget notifications sent from a plugin to the host.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Method name carrying [`ProgressNotification`]s.
pub const PROGRESS_METHOD: &str = "notifications/progress";

/// Method name carrying [`LogNotification`]s.
pub const MESSAGE_METHOD: &str = "notifications/message";

/// Opaque identifier of one progress session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressToken(String);

impl ProgressToken {
    /// Wraps an existing token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProgressToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Phase of a progress session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    Begin,
    Report,
    End,
}

/// One progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressNotification {
    /// Session the event belongs to.
    pub progress_token: ProgressToken,

    /// Phase of the session.
    pub kind: ProgressKind,

    /// Completion in percent, 0 to 100.
    pub percentage: f64,

    /// Status line.
    #[serde(default)]
    pub message: String,

    /// Id of the call that emitted the event, stamped by the transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
}

/// Severity of a [`LogNotification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// A log line emitted by a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogNotification {
    /// Severity.
    pub level: LogLevel,

    /// Log text.
    pub message: String,

    /// Name of the emitting logger, usually the plugin name.
    #[serde(default)]
    pub logger: String,

    /// Optional structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Any notification a plugin can push during a call.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Progress(ProgressNotification),
    Log(LogNotification),
}

impl Notification {
    /// Returns the JSON-RPC method name this notification travels under.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Progress(_) => PROGRESS_METHOD,
            Self::Log(_) => MESSAGE_METHOD,
        }
    }

    /// Serializes the notification payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn params(&self) -> serde_json::Result<Value> {
        match self {
            Self::Progress(progress) => serde_json::to_value(progress),
            Self::Log(log) => serde_json::to_value(log),
        }
    }
}

/// Non-blocking destination for notifications.
///
/// Implementations must never wait on the host: a slow or gone host drops
/// notifications rather than stalling the call that emits them.
pub trait NotificationSink: Send + Sync {
    /// Queues a notification for delivery.
    fn notify(&self, notification: Notification);
}

/// A sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _notification: Notification) {}
}
