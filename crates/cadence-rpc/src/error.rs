//! Error types for the plugin transport.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a host-side RPC call.
///
/// These are transport failures. A plugin that ran and failed reports that
/// inside its response instead.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The plugin returned a JSON-RPC error object.
    #[error("plugin error {code}: {message}")]
    Remote { code: i64, message: String },

    /// The connection closed before a response arrived.
    #[error("connection to plugin closed")]
    ConnectionClosed,

    /// The call did not complete in time.
    #[error("call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The caller cancelled the call.
    #[error("call cancelled")]
    Cancelled,

    /// The peer sent something that is not a valid message.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The handshake descriptor was rejected.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
}

/// Result type for RPC calls.
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors raised while negotiating a connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    /// The handshake line does not have the expected shape.
    #[error("malformed handshake line: {0:?}")]
    Malformed(String),

    /// The plugin speaks a different core handshake version.
    #[error("unsupported core protocol version {0}")]
    CoreVersion(u32),

    /// The plugin was built against a different application protocol.
    #[error("incompatible plugin protocol version: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    /// The plugin announced a transport this host cannot use.
    #[error("unsupported network {0:?}")]
    UnsupportedNetwork(String),

    /// The plugin announced a wire protocol this host cannot speak.
    #[error("unsupported wire protocol {0:?}")]
    UnsupportedProtocol(String),

    /// The process was not started by a Cadence host.
    #[error("magic cookie missing or wrong; this binary is a plugin and is meant to be started by cadence")]
    NotAPlugin,
}

/// Errors raised while starting a plugin server.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The socket could not be bound.
    #[error("failed to bind {path}: {source}")]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The server task ended before reporting readiness.
    #[error("server task exited before it was ready")]
    Exited,

    /// Writing the handshake or accepting the host failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The async runtime could not be created.
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] io::Error),

    /// The host and plugin disagree on the handshake.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
}

/// Errors raised while launching a plugin process.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The binary could not be started.
    #[error("failed to spawn plugin {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The plugin exited or closed stdout before printing its handshake.
    #[error("plugin {0} exited before completing the handshake")]
    NoHandshake(String),

    /// The plugin did not print its handshake in time.
    #[error("plugin {name} did not complete the handshake within {timeout:?}")]
    StartupTimeout {
        name: String,
        timeout: std::time::Duration,
    },

    /// The handshake line was rejected.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// The RPC connection could not be established.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Process I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
