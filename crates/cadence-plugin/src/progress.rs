//! Progress reporting and streamed logging from inside a call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tracing::trace;

use crate::notification::{
    LogLevel, LogNotification, Notification, NotificationSink, ProgressKind,
    ProgressNotification, ProgressToken,
};

/// Counter shared by every reporter in the process so tokens never repeat.
static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Mints a token from a monotonic counter and the wall clock.
///
/// The timestamp keeps tokens from colliding across process restarts.
fn mint_token() -> ProgressToken {
    let sequence = TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    ProgressToken::new(format!("progress-{nanos}-{sequence}"))
}

#[derive(Debug, Clone, Copy)]
struct SessionState {
    total: u64,
    current: u64,
    started: Instant,
}

#[allow(clippy::cast_precision_loss)]
fn percentage(current: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    current as f64 / total as f64 * 100.0
}

/// Emits `begin`/`report`/`end` progress events for long-running work.
///
/// Cloning shares the session table, so a plugin can hand the reporter to
/// spawned tasks.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Arc<dyn NotificationSink>,
    sessions: Arc<Mutex<HashMap<ProgressToken, SessionState>>>,
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("active_sessions", &self.active_sessions())
            .finish_non_exhaustive()
    }
}

impl ProgressReporter {
    /// Creates a reporter writing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<ProgressToken, SessionState>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, token: ProgressToken, kind: ProgressKind, percentage: f64, message: &str) {
        self.sink.notify(Notification::Progress(ProgressNotification {
            progress_token: token,
            kind,
            percentage,
            message: message.to_string(),
            request_id: None,
        }));
    }

    /// Opens a session of `total` steps and emits a `begin` event at 0 %.
    pub fn start(&self, total: u64, message: &str) -> ProgressToken {
        let token = mint_token();
        self.sessions().insert(
            token.clone(),
            SessionState {
                total,
                current: 0,
                started: Instant::now(),
            },
        );
        self.emit(token.clone(), ProgressKind::Begin, 0.0, message);
        token
    }

    /// Records `current` completed steps and emits a `report` event.
    ///
    /// Unknown or completed tokens are ignored.
    pub fn update(&self, token: &ProgressToken, current: u64, message: &str) {
        let pct = {
            let mut sessions = self.sessions();
            let Some(state) = sessions.get_mut(token) else {
                trace!(%token, "progress update for unknown token ignored");
                return;
            };
            state.current = current;
            percentage(state.current, state.total)
        };
        self.emit(token.clone(), ProgressKind::Report, pct, message);
    }

    /// Closes a session and emits an `end` event at 100 %.
    ///
    /// Unknown or already completed tokens are ignored.
    pub fn complete(&self, token: &ProgressToken, message: &str) {
        let Some(state) = self.sessions().remove(token) else {
            trace!(%token, "progress completion for unknown token ignored");
            return;
        };
        trace!(
            %token,
            steps = state.current,
            elapsed_ms = u64::try_from(state.started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "progress session completed"
        );
        self.emit(token.clone(), ProgressKind::End, 100.0, message);
    }

    /// Returns the number of sessions between `start` and `complete`.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.sessions().len()
    }

    /// Returns true while `token` is between `start` and `complete`.
    #[must_use]
    pub fn is_active(&self, token: &ProgressToken) -> bool {
        self.sessions().contains_key(token)
    }
}

/// Streams log lines to the host. Carries no session state.
#[derive(Clone)]
pub struct StreamLogger {
    sink: Arc<dyn NotificationSink>,
    logger: String,
}

impl std::fmt::Debug for StreamLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamLogger")
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}

impl StreamLogger {
    /// Creates a logger named `logger` writing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn NotificationSink>, logger: impl Into<String>) -> Self {
        Self {
            sink,
            logger: logger.into(),
        }
    }

    /// Emits a log line with optional structured data.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, data: Option<Value>) {
        self.sink.notify(Notification::Log(LogNotification {
            level,
            message: message.into(),
            logger: self.logger.clone(),
            data,
        }));
    }

    /// Emits a debug line.
    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message, None);
    }

    /// Emits an info line.
    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message, None);
    }

    /// Emits a warning line.
    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message, None);
    }

    /// Emits an error line.
    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message, None);
    }
}
