//! Launching and stopping plugin processes.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tokio_util::codec::LinesCodecError;
use tracing::{debug, info, warn};

use crate::client::{ClientOptions, DEFAULT_GET_INFO_TIMEOUT, PluginClient};
use crate::error::SupervisorError;
use crate::handshake::{HandshakeConfig, PROTOCOL_VERSION_ENV, ReattachConfig};
use crate::transport::{LineReader, line_reader};

const PLUGIN_TARGET: &str = "cadence_rpc::supervisor";

pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// How plugin processes are started and stopped.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Cookie and protocol version passed to the plugin and expected back.
    pub handshake: HandshakeConfig,
    /// How long a plugin may take to print its handshake line.
    pub startup_timeout: Duration,
    /// Deadline for the plugin's `GetInfo` answer.
    pub get_info_timeout: Duration,
    /// How long a plugin may take to exit after its connection closes.
    pub shutdown_grace: Duration,
    /// Extra variables set in the plugin's environment.
    pub env: Vec<(String, String)>,
    /// Working directory of the plugin; the host's when unset.
    pub working_dir: Option<PathBuf>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            handshake: HandshakeConfig::DEFAULT,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            get_info_timeout: DEFAULT_GET_INFO_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            env: Vec::new(),
            working_dir: None,
        }
    }
}

impl SupervisorConfig {
    #[must_use]
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_get_info_timeout(mut self, timeout: Duration) -> Self {
        self.get_info_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Yields lines until EOF or a read error. Overlong lines are skipped.
async fn next_output_line<R>(name: &str, lines: &mut LineReader<R>) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    loop {
        match lines.next().await? {
            Ok(line) => return Some(line),
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                debug!(target: PLUGIN_TARGET, plugin = %name, "overlong output line discarded");
            }
            Err(LinesCodecError::Io(_)) => return None,
        }
    }
}

/// Forwards the plugin's stderr, line by line, to the host log.
async fn drain_stderr(name: String, stderr: ChildStderr) {
    let mut lines = line_reader(stderr);
    while let Some(line) = next_output_line(&name, &mut lines).await {
        debug!(target: PLUGIN_TARGET, plugin = %name, "{line}");
    }
}

/// Keeps reading stdout after the handshake so stray prints cannot fill the
/// pipe and stall the plugin.
async fn drain_stdout<R>(name: String, mut lines: LineReader<R>)
where
    R: AsyncRead + Unpin,
{
    while let Some(line) = next_output_line(&name, &mut lines).await {
        debug!(target: PLUGIN_TARGET, plugin = %name, stdout = %line, "unexpected plugin stdout");
    }
}

/// A running plugin process and its connection.
///
/// The process is killed if this value is dropped without
/// [`PluginProcess::shutdown`].
#[derive(Debug)]
pub struct PluginProcess {
    name: String,
    path: PathBuf,
    reattach: ReattachConfig,
    child: Child,
    client: PluginClient,
    shutdown_grace: Duration,
    output: Vec<JoinHandle<()>>,
}

impl PluginProcess {
    /// Starts the binary at `path`, completes the handshake and connects.
    ///
    /// # Errors
    ///
    /// Returns an error if the binary cannot be started, does not print a
    /// valid handshake within the startup timeout, announces an incompatible
    /// protocol, or cannot be connected to. The child is killed in every
    /// error case.
    pub async fn spawn(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        config: &SupervisorConfig,
    ) -> Result<Self, SupervisorError> {
        let name = name.into();
        let path = path.as_ref().to_path_buf();

        let mut command = Command::new(&path);
        command
            .env(config.handshake.magic_cookie_key, config.handshake.magic_cookie_value)
            .env(PROTOCOL_VERSION_ENV, config.handshake.protocol_version.to_string())
            .envs(config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }

        debug!(target: PLUGIN_TARGET, plugin = %name, path = %path.display(), "spawning plugin");
        let mut child = command.spawn().map_err(|source| SupervisorError::Spawn {
            path: path.clone(),
            source,
        })?;

        let mut output = Vec::with_capacity(2);
        if let Some(stderr) = child.stderr.take() {
            output.push(tokio::spawn(drain_stderr(name.clone(), stderr)));
        }
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SupervisorError::NoHandshake(name.clone()))?;
        let mut lines = line_reader(stdout);

        let line = match tokio::time::timeout(config.startup_timeout, lines.next()).await {
            Ok(Some(Ok(line))) => line,
            Ok(None | Some(Err(LinesCodecError::MaxLineLengthExceeded))) => {
                return Err(SupervisorError::NoHandshake(name));
            }
            Ok(Some(Err(LinesCodecError::Io(e)))) => return Err(SupervisorError::Io(e)),
            Err(_) => {
                warn!(target: PLUGIN_TARGET, plugin = %name, "plugin handshake timed out, killing process");
                return Err(SupervisorError::StartupTimeout {
                    name,
                    timeout: config.startup_timeout,
                });
            }
        };
        output.push(tokio::spawn(drain_stdout(name.clone(), lines)));

        let reattach: ReattachConfig = line.parse()?;
        config.handshake.verify(&reattach)?;

        let options = ClientOptions::default()
            .with_name(name.clone())
            .with_get_info_timeout(config.get_info_timeout)
            .with_handshake(config.handshake);
        let client = PluginClient::connect(&reattach, options).await?;

        info!(target: PLUGIN_TARGET, plugin = %name, pid = ?child.id(), "plugin started");
        Ok(Self {
            name,
            path,
            reattach,
            child,
            client,
            shutdown_grace: config.shutdown_grace,
            output,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn reattach(&self) -> &ReattachConfig {
        &self.reattach
    }

    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    #[must_use]
    pub fn client(&self) -> &PluginClient {
        &self.client
    }

    /// Closes the connection and waits for the plugin to exit, killing it
    /// after the shutdown grace period.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be waited on or killed.
    pub async fn shutdown(mut self) -> Result<ExitStatus, SupervisorError> {
        self.client.close();

        let status = match tokio::time::timeout(self.shutdown_grace, self.child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!(target: PLUGIN_TARGET, plugin = %self.name, "plugin did not exit, killing process");
                self.child.kill().await?;
                self.child.wait().await?
            }
        };
        for task in self.output.drain(..) {
            let _ = task.await;
        }
        debug!(target: PLUGIN_TARGET, plugin = %self.name, ?status, "plugin process exited");
        Ok(status)
    }
}
