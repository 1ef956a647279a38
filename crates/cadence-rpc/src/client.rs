//! Host-side RPC client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use cadence_plugin::{
    ConfigMap, ExecuteRequest, ExecuteResponse, Info, LogNotification, MESSAGE_METHOD,
    PROGRESS_METHOD, ProgressNotification, ValidateResponse,
};
use futures::StreamExt;
use serde_json::{Value, json};
use tokio::net::UnixStream;
use tokio::net::unix::OwnedReadHalf;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::codec::LinesCodecError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::convert::{
    config_to_wire, execute_request_to_wire, execute_response_from_wire, info_from_wire,
    validate_response_from_wire,
};
use crate::error::{RpcError, RpcResult};
use crate::handshake::{HandshakeConfig, ReattachConfig};
use crate::protocol::{
    self, METHOD_CANCEL, METHOD_EXECUTE, METHOD_GET_INFO, METHOD_VALIDATE, Message, Request,
    Response,
};
use crate::streaming::{LogHandler, ProgressCallback, ProgressRegistry, forward_to_tracing};
use crate::transport::{LineSender, MAX_LINE_LENGTH, line_reader, send, spawn_writer};
use crate::wire::{WireExecuteResponse, WireInfo, WireValidateRequest, WireValidateResponse};

/// How long [`PluginClient::get_info`] waits before giving up.
pub const DEFAULT_GET_INFO_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Name used in log lines.
    pub name: String,
    /// Deadline for [`PluginClient::get_info`].
    pub get_info_timeout: Duration,
    /// Cookie and protocol version the plugin's descriptor must match.
    pub handshake: HandshakeConfig,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            name: "plugin".to_string(),
            get_info_timeout: DEFAULT_GET_INFO_TIMEOUT,
            handshake: HandshakeConfig::DEFAULT,
        }
    }
}

impl ClientOptions {
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_get_info_timeout(mut self, timeout: Duration) -> Self {
        self.get_info_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_handshake(mut self, handshake: HandshakeConfig) -> Self {
        self.handshake = handshake;
        self
    }
}

/// Per-call options.
#[derive(Clone, Default)]
pub struct CallOptions {
    cancellation: Option<CancellationToken>,
    progress: Option<ProgressCallback>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOptions")
            .field("cancellable", &self.cancellation.is_some())
            .field("progress", &self.progress.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CallOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Abandons the call, and asks the plugin to stop, once `token` fires.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Receives every progress session the call starts.
    #[must_use]
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProgressNotification) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Fails the call with [`RpcError::Timeout`] after `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

struct Shared {
    name: String,
    pending: Mutex<HashMap<u64, oneshot::Sender<Response>>>,
    progress: ProgressRegistry,
    log_handler: RwLock<LogHandler>,
    closed: AtomicBool,
}

impl Shared {
    fn pending(&self) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Response>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle_line(&self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        match Message::parse(line) {
            Ok(Message::Response(response)) => {
                let Some(id) = response.id else {
                    warn!(plugin = %self.name, error = ?response.error, "plugin reported an error without request id");
                    return;
                };
                match self.pending().remove(&id) {
                    Some(waiter) => {
                        let _ = waiter.send(response);
                    }
                    None => trace!(id, "response for abandoned request"),
                }
            }
            Ok(Message::Notification(notification)) => self.handle_notification(notification),
            Ok(Message::Request(request)) => {
                debug!(plugin = %self.name, method = %request.method, "ignoring request from plugin");
            }
            Err(e) => warn!(plugin = %self.name, error = %e, "unparseable message from plugin"),
        }
    }

    fn handle_notification(&self, notification: protocol::Notification) {
        match notification.method.as_str() {
            PROGRESS_METHOD => {
                match serde_json::from_value::<ProgressNotification>(notification.params) {
                    Ok(progress) => {
                        self.progress.dispatch(&progress);
                    }
                    Err(e) => debug!(plugin = %self.name, error = %e, "malformed progress notification"),
                }
            }
            MESSAGE_METHOD => match serde_json::from_value::<LogNotification>(notification.params) {
                Ok(log) => {
                    let handler = self
                        .log_handler
                        .read()
                        .unwrap_or_else(PoisonError::into_inner)
                        .clone();
                    handler(&log);
                }
                Err(e) => debug!(plugin = %self.name, error = %e, "malformed log notification"),
            },
            other => trace!(method = other, "ignoring notification"),
        }
    }

    /// Adds a waiter for `id` unless the connection is already closed.
    ///
    /// `closed` is read under the `pending` lock, so a waiter can never be
    /// inserted after [`Shared::shut_down`] cleared the table.
    fn register(&self, id: u64, waiter: oneshot::Sender<Response>) -> RpcResult<()> {
        let mut pending = self.pending();
        if self.closed.load(Ordering::SeqCst) {
            return Err(RpcError::ConnectionClosed);
        }
        pending.insert(id, waiter);
        Ok(())
    }

    /// Fails every waiting call with [`RpcError::ConnectionClosed`].
    fn shut_down(&self) {
        let mut pending = self.pending();
        self.closed.store(true, Ordering::SeqCst);
        pending.clear();
    }
}

/// Removes a call's bookkeeping however the call ends.
struct CallGuard<'a> {
    shared: &'a Shared,
    id: u64,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.shared.pending().remove(&self.id);
        self.shared.progress.unregister_request(self.id);
    }
}

async fn read_loop(shared: Arc<Shared>, read: OwnedReadHalf) {
    let mut lines = line_reader(read);
    while let Some(item) = lines.next().await {
        match item {
            Ok(line) => shared.handle_line(&line),
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!(plugin = %shared.name, limit = MAX_LINE_LENGTH, "plugin sent an overlong line");
                break;
            }
            Err(LinesCodecError::Io(e)) => {
                debug!(plugin = %shared.name, error = %e, "read failed");
                break;
            }
        }
    }
    debug!(plugin = %shared.name, "plugin connection closed");
    shared.shut_down();
}

/// A connection to one plugin.
///
/// Calls may be issued concurrently from several tasks; responses are
/// matched to calls by request id and notifications are routed as they
/// arrive, including while a call is in flight.
pub struct PluginClient {
    shared: Arc<Shared>,
    tx: LineSender,
    next_id: AtomicU64,
    get_info_timeout: Duration,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl std::fmt::Debug for PluginClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginClient")
            .field("name", &self.shared.name)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl PluginClient {
    /// Connects to a plugin after checking its descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Handshake`] if the descriptor is incompatible and
    /// [`RpcError::Io`] if the socket cannot be reached.
    pub async fn connect(reattach: &ReattachConfig, options: ClientOptions) -> RpcResult<Self> {
        options.handshake.verify(reattach)?;
        let stream = UnixStream::connect(&reattach.address).await?;
        Ok(Self::from_stream(stream, options))
    }

    /// Wraps an already connected stream.
    #[must_use]
    pub fn from_stream(stream: UnixStream, options: ClientOptions) -> Self {
        let (read, write) = stream.into_split();
        let (tx, writer) = spawn_writer(write);
        let shared = Arc::new(Shared {
            log_handler: RwLock::new(forward_to_tracing(options.name.clone())),
            name: options.name,
            pending: Mutex::new(HashMap::new()),
            progress: ProgressRegistry::new(),
            closed: AtomicBool::new(false),
        });
        let reader = tokio::spawn(read_loop(shared.clone(), read));
        Self {
            shared,
            tx,
            next_id: AtomicU64::new(0),
            get_info_timeout: options.get_info_timeout,
            reader,
            writer,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Token-keyed progress routing for this connection.
    #[must_use]
    pub fn progress(&self) -> &ProgressRegistry {
        &self.shared.progress
    }

    /// Replaces the handler receiving plugin log lines.
    ///
    /// The default forwards them to `tracing`.
    pub fn set_log_handler(&self, handler: LogHandler) {
        *self
            .shared
            .log_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = handler;
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Closes the connection. Calls in flight fail with
    /// [`RpcError::ConnectionClosed`].
    pub fn close(&self) {
        self.writer.abort();
        self.reader.abort();
        self.shared.shut_down();
    }

    fn cancel_remote(&self, id: u64) {
        debug!(plugin = %self.shared.name, id, "cancelling remote call");
        send(
            &self.tx,
            &protocol::Notification::new(METHOD_CANCEL, json!({ "id": id })),
        );
    }

    async fn call(&self, method: &str, params: Value, options: &CallOptions) -> RpcResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (waiter, response) = oneshot::channel();
        self.shared.register(id, waiter)?;
        let _guard = CallGuard {
            shared: &self.shared,
            id,
        };
        if let Some(progress) = &options.progress {
            self.shared.progress.register_request(id, progress.clone());
        }

        trace!(plugin = %self.shared.name, id, method, "sending request");
        if !send(&self.tx, &Request::new(id, method, params)) {
            return Err(RpcError::ConnectionClosed);
        }

        let cancellation = options.cancellation.clone().unwrap_or_default();
        let timeout = options.timeout;
        let deadline = async {
            match timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };

        let response = tokio::select! {
            response = response => response.map_err(|_| RpcError::ConnectionClosed)?,
            () = cancellation.cancelled() => {
                self.cancel_remote(id);
                return Err(RpcError::Cancelled);
            }
            () = deadline => {
                self.cancel_remote(id);
                return Err(RpcError::Timeout(timeout.unwrap_or_default()));
            }
        };

        match response.error {
            Some(error) => Err(RpcError::Remote {
                code: error.code,
                message: error.message,
            }),
            None => Ok(response.result.unwrap_or(Value::Null)),
        }
    }

    /// Asks the plugin to describe itself.
    ///
    /// Never fails: on timeout or any error an empty [`Info`] is returned and
    /// a warning is logged.
    pub async fn get_info(&self) -> Info {
        let options = CallOptions::new().with_timeout(self.get_info_timeout);
        let result = self
            .call(METHOD_GET_INFO, Value::Null, &options)
            .await
            .and_then(|value| serde_json::from_value::<WireInfo>(value).map_err(RpcError::from));
        match result {
            Ok(info) => info_from_wire(info),
            Err(e) => {
                warn!(plugin = %self.shared.name, error = %e, "get_info failed");
                Info::default()
            }
        }
    }

    /// Runs a hook.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures; a hook that ran and
    /// failed is an `Ok` response with `success == false`.
    pub async fn execute(&self, request: &ExecuteRequest) -> RpcResult<ExecuteResponse> {
        self.execute_with(request, &CallOptions::new()).await
    }

    /// [`PluginClient::execute`] with cancellation, progress or a timeout.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures, cancellation and timeouts.
    pub async fn execute_with(
        &self,
        request: &ExecuteRequest,
        options: &CallOptions,
    ) -> RpcResult<ExecuteResponse> {
        let params = serde_json::to_value(execute_request_to_wire(request)?)?;
        let value = self.call(METHOD_EXECUTE, params, options).await?;
        let response: WireExecuteResponse = serde_json::from_value(value)?;
        Ok(execute_response_from_wire(response))
    }

    /// Checks a configuration map.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures.
    pub async fn validate(&self, config: &ConfigMap) -> RpcResult<ValidateResponse> {
        self.validate_with(config, &CallOptions::new()).await
    }

    /// [`PluginClient::validate`] with cancellation or a timeout.
    ///
    /// # Errors
    ///
    /// Returns an error for transport failures, cancellation and timeouts.
    pub async fn validate_with(
        &self,
        config: &ConfigMap,
        options: &CallOptions,
    ) -> RpcResult<ValidateResponse> {
        self.validate_raw(config_to_wire(config)?, options).await
    }

    /// Validates configuration text exactly as given, without parsing it on
    /// the host side first.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures.
    pub async fn validate_raw(
        &self,
        config: String,
        options: &CallOptions,
    ) -> RpcResult<ValidateResponse> {
        let params = serde_json::to_value(WireValidateRequest { config })?;
        let value = self.call(METHOD_VALIDATE, params, options).await?;
        let response: WireValidateResponse = serde_json::from_value(value)?;
        Ok(validate_response_from_wire(response))
    }

    #[cfg(test)]
    fn pending_calls(&self) -> usize {
        self.shared.pending().len()
    }
}

impl Drop for PluginClient {
    fn drop(&mut self) {
        self.close();
    }
}
