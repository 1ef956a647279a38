//! Out-of-process plugin host and RPC protocol for Cadence.
//!
//! Plugins run as separate OS processes. The host spawns a plugin binary with
//! a magic cookie in its environment; the plugin binds a Unix domain socket
//! and announces it on stdout with a one-line handshake. From then on both
//! sides speak newline-delimited JSON-RPC 2.0 over that socket:
//!
//! - host → plugin requests: `plugin.getInfo`, `plugin.execute`,
//!   `plugin.validate`, plus the `$/cancelRequest` notification
//! - plugin → host notifications: `notifications/progress`,
//!   `notifications/message`, which may arrive while a request is in flight
//!
//! Lines longer than [`MAX_LINE_LENGTH`] are a transport error on either
//! side.
//!
//! Plugin binaries call [`serve`] from `main`. Hosts use
//! [`PluginProcess::spawn`] to start a plugin, or [`serve_test`] and
//! [`PluginClient::connect`] to exercise a plugin in-process.

pub mod client;
pub mod convert;
pub mod error;
pub mod handshake;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod streaming;
pub mod supervisor;
mod transport;
pub mod wire;

pub use client::{CallOptions, ClientOptions, PluginClient};
pub use error::{HandshakeError, RpcError, RpcResult, ServeError, SupervisorError};
pub use handshake::{HandshakeConfig, ReattachConfig, is_plugin};
pub use logging::init_plugin_logging;
pub use server::{PluginServer, TestServer, serve, serve_test, serve_test_at, serve_with};
pub use streaming::{LogHandler, ProgressCallback, ProgressRegistry};
pub use supervisor::{PluginProcess, SupervisorConfig};
pub use transport::MAX_LINE_LENGTH;
