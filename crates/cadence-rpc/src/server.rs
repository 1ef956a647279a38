//! Plugin-side RPC server.

use std::collections::HashMap;
use std::future::Future;
use std::io::{self, Write};
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use cadence_plugin::{
    CallContext, ExecuteResponse, Notification, NotificationSink, Plugin, PluginError,
    ValidateResponse, ValidationError,
};
use futures::StreamExt;
use serde_json::Value;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::codec::LinesCodecError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::convert::{
    config_from_wire, execute_request_from_wire, execute_response_to_wire, info_to_wire,
    validate_response_to_wire,
};
use crate::error::{HandshakeError, ServeError};
use crate::handshake::{HandshakeConfig, PROTOCOL_VERSION_ENV, ReattachConfig};
use crate::logging::init_plugin_logging;
use crate::protocol::{
    self, CancelParams, ErrorObject, INTERNAL_ERROR, INVALID_PARAMS, METHOD_CANCEL,
    METHOD_EXECUTE, METHOD_GET_INFO, METHOD_NOT_FOUND, METHOD_VALIDATE, Message, PARSE_ERROR,
    REQUEST_CANCELLED, Request, Response,
};
use crate::transport::{LineSender, MAX_LINE_LENGTH, line_reader, send, spawn_writer};
use crate::wire::{WireExecuteRequest, WireValidateRequest};

static SOCKET_COUNTER: AtomicU64 = AtomicU64::new(0);

type InFlight = Arc<Mutex<HashMap<u64, CancellationToken>>>;

type CallResult = Result<Value, ErrorObject>;

fn call_error(code: i64, message: impl Into<String>) -> ErrorObject {
    ErrorObject {
        code,
        message: message.into(),
        data: None,
    }
}

fn plugin_error(err: &PluginError) -> ErrorObject {
    let code = match err {
        PluginError::Cancelled => REQUEST_CANCELLED,
        _ => INTERNAL_ERROR,
    };
    call_error(code, err.to_string())
}

fn internal(err: &serde_json::Error) -> ErrorObject {
    call_error(INTERNAL_ERROR, err.to_string())
}

/// Returns a fresh socket path in the system temp directory.
fn socket_path() -> PathBuf {
    let sequence = SOCKET_COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!(
        "cadence-plugin-{}-{sequence}.sock",
        std::process::id()
    ))
}

/// Binds `path`, replacing a stale socket left there. Anything else at
/// `path` is left alone and reported.
fn bind(path: &Path) -> Result<UnixListener, ServeError> {
    let bind_error = |source| ServeError::Bind {
        path: path.to_path_buf(),
        source,
    };
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            debug!(socket = %path.display(), "removing stale socket");
            std::fs::remove_file(path).map_err(bind_error)?;
        }
        Ok(_) => {
            return Err(bind_error(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "path exists and is not a socket",
            )));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(bind_error(e)),
    }
    UnixListener::bind(path).map_err(bind_error)
}

/// Forwards notifications of one call onto the connection.
///
/// Progress events are stamped with the id of the call that emitted them.
struct ConnectionSink {
    tx: LineSender,
    request_id: u64,
}

impl NotificationSink for ConnectionSink {
    fn notify(&self, notification: Notification) {
        let notification = match notification {
            Notification::Progress(mut progress) => {
                progress.request_id = Some(self.request_id);
                Notification::Progress(progress)
            }
            log @ Notification::Log(_) => log,
        };
        let params = match notification.params() {
            Ok(params) => params,
            Err(e) => {
                warn!(error = %e, "failed to encode notification");
                return;
            }
        };
        if !send(&self.tx, &protocol::Notification::new(notification.method(), params)) {
            trace!("host gone, dropping notification");
        }
    }
}

/// Serves one [`Plugin`] over any number of connections.
pub struct PluginServer<P> {
    plugin: Arc<P>,
    name: String,
}

impl<P: Plugin> PluginServer<P> {
    #[must_use]
    pub fn new(plugin: P) -> Self {
        let name = plugin.get_info().name;
        Self {
            plugin: Arc::new(plugin),
            name,
        }
    }

    /// Serves a single connection until the peer closes it.
    ///
    /// Calls run concurrently, so a cancellation or a second request can be
    /// handled while an execute is in flight. Closing the connection cancels
    /// every call still running.
    pub async fn serve_connection(&self, stream: UnixStream) {
        let (read, write) = stream.into_split();
        let (tx, writer) = spawn_writer(write);
        let in_flight = InFlight::default();
        let mut calls = JoinSet::new();
        let mut lines = line_reader(read);

        while let Some(item) = lines.next().await {
            let line = match item {
                Ok(line) => line,
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    warn!(limit = MAX_LINE_LENGTH, "overlong line from host, closing connection");
                    break;
                }
                Err(LinesCodecError::Io(e)) => {
                    debug!(error = %e, "read failed, closing connection");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }

            match Message::parse(&line) {
                Ok(Message::Request(request)) => {
                    let cancellation = CancellationToken::new();
                    in_flight
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(request.id, cancellation.clone());

                    let plugin = self.plugin.clone();
                    let name = self.name.clone();
                    let tx = tx.clone();
                    let in_flight = in_flight.clone();
                    calls.spawn(async move {
                        let id = request.id;
                        let response =
                            dispatch(plugin.as_ref(), &name, request, cancellation, &tx).await;
                        in_flight
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .remove(&id);
                        send(&tx, &response);
                    });
                }
                Ok(Message::Notification(notification)) => {
                    handle_notification(&notification, &in_flight);
                }
                Ok(Message::Response(_)) => {
                    debug!("ignoring response sent to plugin");
                }
                Err(e) => {
                    send(&tx, &Response::error(None, PARSE_ERROR, e));
                }
            }

            while calls.try_join_next().is_some() {}
        }

        for token in in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
        {
            token.cancel();
        }
        calls.shutdown().await;
        drop(tx);
        let _ = writer.await;
        debug!(plugin = %self.name, "connection closed");
    }

    /// Accepts connections until `shutdown` resolves.
    async fn run<F>(self: Arc<Self>, listener: UnixListener, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let server = self.clone();
                        connections.spawn(async move { server.serve_connection(stream).await });
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
            }
        }
        connections.shutdown().await;
    }
}

fn handle_notification(notification: &protocol::Notification, in_flight: &InFlight) {
    if notification.method != METHOD_CANCEL {
        trace!(method = %notification.method, "ignoring notification");
        return;
    }
    let Ok(params) = serde_json::from_value::<CancelParams>(notification.params.clone()) else {
        debug!("malformed cancel notification");
        return;
    };
    match in_flight
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&params.id)
    {
        Some(token) => {
            debug!(id = params.id, "cancelling request");
            token.cancel();
        }
        None => trace!(id = params.id, "cancel for unknown request"),
    }
}

async fn dispatch<P: Plugin>(
    plugin: &P,
    name: &str,
    request: Request,
    cancellation: CancellationToken,
    tx: &LineSender,
) -> Response {
    let id = request.id;
    let sink = Arc::new(ConnectionSink {
        tx: tx.clone(),
        request_id: id,
    });
    let ctx = CallContext::new(sink, cancellation, name);

    let result = match request.method.as_str() {
        METHOD_GET_INFO => {
            serde_json::to_value(info_to_wire(&plugin.get_info())).map_err(|e| internal(&e))
        }
        METHOD_EXECUTE => handle_execute(plugin, &ctx, request.params).await,
        METHOD_VALIDATE => handle_validate(plugin, &ctx, request.params).await,
        other => Err(call_error(METHOD_NOT_FOUND, format!("method not found: {other}"))),
    };

    match result {
        Ok(value) => Response::success(id, value),
        Err(error) => Response::failure(Some(id), error),
    }
}

async fn handle_execute<P: Plugin>(plugin: &P, ctx: &CallContext, params: Value) -> CallResult {
    let wire: WireExecuteRequest =
        serde_json::from_value(params).map_err(|e| call_error(INVALID_PARAMS, e.to_string()))?;

    let response = match execute_request_from_wire(wire) {
        Ok(request) => {
            debug!(hook = %request.hook, dry_run = request.dry_run, "executing hook");
            plugin
                .execute(ctx, request)
                .await
                .map_err(|e| plugin_error(&e))?
        }
        Err(e) => {
            warn!(error = %e, "rejecting execute request");
            ExecuteResponse::failure(e.to_string())
        }
    };

    let wire = execute_response_to_wire(&response).map_err(|e| internal(&e))?;
    serde_json::to_value(wire).map_err(|e| internal(&e))
}

async fn handle_validate<P: Plugin>(plugin: &P, ctx: &CallContext, params: Value) -> CallResult {
    let wire: WireValidateRequest =
        serde_json::from_value(params).map_err(|e| call_error(INVALID_PARAMS, e.to_string()))?;

    let response = match config_from_wire(&wire.config) {
        Ok(config) => plugin
            .validate(ctx, &config)
            .await
            .map_err(|e| plugin_error(&e))?,
        Err(e) => ValidateResponse::invalid(ValidationError::new(
            "config",
            format!("invalid configuration JSON: {e}"),
            "parse_error",
        )),
    };

    serde_json::to_value(validate_response_to_wire(&response)).map_err(|e| internal(&e))
}

/// Serves `plugin` to the host that spawned this process. Never returns.
///
/// Checks the magic cookie, binds a socket, prints the handshake line and
/// serves the host's connection. The process exits with status 0 when the
/// host disconnects and 1 if the server cannot start.
pub fn serve<P: Plugin>(plugin: P) -> ! {
    serve_with(plugin, HandshakeConfig::DEFAULT)
}

/// [`serve`] with an explicit handshake.
pub fn serve_with<P: Plugin>(plugin: P, handshake: HandshakeConfig) -> ! {
    init_plugin_logging();
    let code = match run_plugin(plugin, handshake) {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "plugin server failed");
            1
        }
    };
    std::process::exit(code)
}

fn run_plugin<P: Plugin>(plugin: P, handshake: HandshakeConfig) -> Result<(), ServeError> {
    if !handshake.is_plugin() {
        return Err(HandshakeError::NotAPlugin.into());
    }
    handshake.check_host_version(std::env::var(PROTOCOL_VERSION_ENV).ok().as_deref())?;

    let runtime = tokio::runtime::Runtime::new().map_err(ServeError::Runtime)?;
    runtime.block_on(async move {
        let path = socket_path();
        let listener = bind(&path)?;
        let reattach = handshake.reattach(&path);

        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{reattach}")
            .and_then(|()| stdout.flush())
            .map_err(ServeError::Io)?;
        drop(stdout);

        let server = PluginServer::new(plugin);
        info!(plugin = %server.name, socket = %path.display(), "plugin serving");

        let result = match listener.accept().await {
            Ok((stream, _)) => {
                server.serve_connection(stream).await;
                Ok(())
            }
            Err(e) => Err(ServeError::Io(e)),
        };
        let _ = std::fs::remove_file(&path);
        result
    })
}

/// An in-process server for tests.
///
/// Dropping it without calling [`TestServer::close`] still stops the server.
#[derive(Debug)]
pub struct TestServer {
    reattach: ReattachConfig,
    close: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Returns the descriptor to hand to [`crate::PluginClient::connect`].
    #[must_use]
    pub fn reattach(&self) -> &ReattachConfig {
        &self.reattach
    }

    /// Stops accepting, closes open connections and removes the socket.
    pub async fn close(mut self) {
        if let Some(close) = self.close.take() {
            let _ = close.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(close) = self.close.take() {
            let _ = close.send(());
        }
    }
}

/// Starts `plugin` on a fresh socket inside the current runtime.
///
/// Returns once the socket is bound, so the descriptor is immediately usable.
///
/// # Errors
///
/// Returns [`ServeError::Bind`] if the socket cannot be bound.
pub async fn serve_test<P: Plugin>(plugin: P) -> Result<TestServer, ServeError> {
    serve_test_at(plugin, HandshakeConfig::DEFAULT, socket_path()).await
}

/// [`serve_test`] on an explicit socket path and handshake.
///
/// # Errors
///
/// Returns [`ServeError::Bind`] if the socket cannot be bound.
pub async fn serve_test_at<P: Plugin>(
    plugin: P,
    handshake: HandshakeConfig,
    path: PathBuf,
) -> Result<TestServer, ServeError> {
    let (ready_tx, ready_rx) = oneshot::channel::<Result<ReattachConfig, ServeError>>();
    let (close_tx, close_rx) = oneshot::channel::<()>();
    let server = Arc::new(PluginServer::new(plugin));

    let task = tokio::spawn(async move {
        let listener = match bind(&path) {
            Ok(listener) => listener,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };
        let _ = ready_tx.send(Ok(handshake.reattach(&path)));
        server
            .run(listener, async {
                let _ = close_rx.await;
            })
            .await;
        let _ = std::fs::remove_file(&path);
    });

    let reattach = ready_rx.await.map_err(|_| ServeError::Exited)??;
    Ok(TestServer {
        reattach,
        close: Some(close_tx),
        task: Some(task),
    })
}
