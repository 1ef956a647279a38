//! The plugin contract.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::notification::{NotificationSink, NullSink};
use crate::{
    ConfigMap, ExecuteRequest, ExecuteResponse, Info, PluginResult, ProgressReporter,
    StreamLogger, ValidateResponse,
};

/// Per-call state handed to [`Plugin::execute`] and [`Plugin::validate`].
///
/// Cancellation is cooperative: the host may cancel a call, and the plugin
/// decides where to check [`CallContext::is_cancelled`] (typically between
/// external commands).
#[derive(Debug, Clone)]
pub struct CallContext {
    cancellation: CancellationToken,
    progress: ProgressReporter,
    logger: StreamLogger,
}

impl CallContext {
    /// Creates a context whose notifications go to `sink`.
    #[must_use]
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        cancellation: CancellationToken,
        logger_name: impl Into<String>,
    ) -> Self {
        Self {
            cancellation,
            progress: ProgressReporter::new(sink.clone()),
            logger: StreamLogger::new(sink, logger_name),
        }
    }

    /// Creates a context that is never cancelled and drops notifications.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(Arc::new(NullSink), CancellationToken::new(), "")
    }

    /// Returns the cancellation token of this call.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns true once the host cancelled this call.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns the progress reporter of this call.
    #[must_use]
    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    /// Returns the streaming logger of this call.
    #[must_use]
    pub fn logger(&self) -> &StreamLogger {
        &self.logger
    }
}

/// Contract implemented by every out-of-process plugin.
///
/// Errors returned from `execute`/`validate` reach the host as RPC errors.
/// A domain failure (the registry rejected the upload) should instead be an
/// [`ExecuteResponse::failure`].
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Describes the plugin and the hooks it supports.
    fn get_info(&self) -> Info;

    /// Runs one lifecycle hook.
    ///
    /// # Errors
    ///
    /// Returns an error only when the call itself could not be carried out.
    async fn execute(
        &self,
        ctx: &CallContext,
        request: ExecuteRequest,
    ) -> PluginResult<ExecuteResponse>;

    /// Checks a configuration map.
    ///
    /// The default accepts everything.
    ///
    /// # Errors
    ///
    /// Returns an error only when validation itself could not be carried out.
    async fn validate(
        &self,
        _ctx: &CallContext,
        _config: &ConfigMap,
    ) -> PluginResult<ValidateResponse> {
        Ok(ValidateResponse::valid())
    }
}
