//! Handshake between the host and a freshly spawned plugin.
//!
//! The host sets a magic cookie and its protocol version in the child's
//! environment. The plugin checks the cookie, binds a socket and prints a
//! single line on stdout:
//!
//! ```text
//! 1|1|unix|/tmp/cadence-plugin-4242-1.sock|jsonrpc
//! ```
//!
//! The fields are the core handshake version, the application protocol
//! version, the network, the address and the wire protocol. The same line is
//! the [`ReattachConfig`] a host uses to connect to an already running plugin.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::HandshakeError;

/// Version of the handshake line format itself.
pub const CORE_PROTOCOL_VERSION: u32 = 1;

/// Version of the application protocol spoken over the socket.
pub const PROTOCOL_VERSION: u32 = 1;

/// Environment variable carrying the magic cookie.
pub const MAGIC_COOKIE_KEY: &str = "CADENCE_PLUGIN";

/// Value the magic cookie must hold.
pub const MAGIC_COOKIE_VALUE: &str = "d3c8a1f07b5e4c29a6f1e08b7d2c5a93";

/// Environment variable carrying the host's application protocol version.
pub const PROTOCOL_VERSION_ENV: &str = "CADENCE_PLUGIN_PROTOCOL_VERSION";

/// Network announced in the handshake line.
pub const NETWORK_UNIX: &str = "unix";

/// Wire protocol announced in the handshake line.
pub const WIRE_PROTOCOL: &str = "jsonrpc";

/// Shared handshake parameters.
///
/// Host and plugin must agree on every field; a mismatch is a fatal
/// incompatibility detected before any call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeConfig {
    pub protocol_version: u32,
    pub magic_cookie_key: &'static str,
    pub magic_cookie_value: &'static str,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl HandshakeConfig {
    /// The handshake every Cadence host and plugin uses.
    pub const DEFAULT: Self = Self {
        protocol_version: PROTOCOL_VERSION,
        magic_cookie_key: MAGIC_COOKIE_KEY,
        magic_cookie_value: MAGIC_COOKIE_VALUE,
    };

    /// Returns true if `value` is exactly the expected cookie.
    #[must_use]
    pub fn matches_cookie(&self, value: Option<&str>) -> bool {
        value == Some(self.magic_cookie_value)
    }

    /// Returns true if the cookie found through `lookup` is exactly the
    /// expected value.
    pub fn is_plugin_with<F>(&self, lookup: F) -> bool
    where
        F: FnOnce(&str) -> Option<String>,
    {
        self.matches_cookie(lookup(self.magic_cookie_key).as_deref())
    }

    /// Returns true if this process was started by a host.
    #[must_use]
    pub fn is_plugin(&self) -> bool {
        self.is_plugin_with(|key| std::env::var(key).ok())
    }

    /// Rejects a host that announced a different application protocol.
    ///
    /// A host that did not announce a version is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::VersionMismatch`] on disagreement and
    /// [`HandshakeError::Malformed`] when the value is not a number.
    pub fn check_host_version(&self, announced: Option<&str>) -> Result<(), HandshakeError> {
        let Some(raw) = announced else {
            return Ok(());
        };
        let actual = raw
            .trim()
            .parse()
            .map_err(|_| HandshakeError::Malformed(raw.to_string()))?;
        if actual == self.protocol_version {
            Ok(())
        } else {
            Err(HandshakeError::VersionMismatch {
                expected: self.protocol_version,
                actual,
            })
        }
    }

    /// Builds the descriptor a plugin announces for `path`.
    #[must_use]
    pub fn reattach(&self, path: impl Into<PathBuf>) -> ReattachConfig {
        ReattachConfig {
            core_version: CORE_PROTOCOL_VERSION,
            protocol_version: self.protocol_version,
            network: NETWORK_UNIX.to_string(),
            address: path.into(),
            protocol: WIRE_PROTOCOL.to_string(),
        }
    }

    /// Checks a descriptor announced by a plugin.
    ///
    /// # Errors
    ///
    /// Returns the first field that this host cannot accept.
    pub fn verify(&self, reattach: &ReattachConfig) -> Result<(), HandshakeError> {
        if reattach.core_version != CORE_PROTOCOL_VERSION {
            return Err(HandshakeError::CoreVersion(reattach.core_version));
        }
        if reattach.protocol_version != self.protocol_version {
            return Err(HandshakeError::VersionMismatch {
                expected: self.protocol_version,
                actual: reattach.protocol_version,
            });
        }
        if reattach.network != NETWORK_UNIX {
            return Err(HandshakeError::UnsupportedNetwork(reattach.network.clone()));
        }
        if reattach.protocol != WIRE_PROTOCOL {
            return Err(HandshakeError::UnsupportedProtocol(reattach.protocol.clone()));
        }
        Ok(())
    }
}

/// Returns true if this process was started by a Cadence host.
///
/// Plugin binaries call this from `main` to refuse direct invocation.
#[must_use]
pub fn is_plugin() -> bool {
    HandshakeConfig::DEFAULT.is_plugin()
}

/// Everything needed to connect to a running plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReattachConfig {
    pub core_version: u32,
    pub protocol_version: u32,
    pub network: String,
    pub address: PathBuf,
    pub protocol: String,
}

impl fmt::Display for ReattachConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}",
            self.core_version,
            self.protocol_version,
            self.network,
            self.address.display(),
            self.protocol
        )
    }
}

impl FromStr for ReattachConfig {
    type Err = HandshakeError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let trimmed = line.trim();
        let malformed = || HandshakeError::Malformed(trimmed.to_string());

        let parts: Vec<&str> = trimmed.split('|').collect();
        let [core, app, network, address, protocol] = parts.as_slice() else {
            return Err(malformed());
        };
        if address.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            core_version: core.parse().map_err(|_| malformed())?,
            protocol_version: app.parse().map_err(|_| malformed())?,
            network: (*network).to_string(),
            address: PathBuf::from(address),
            protocol: (*protocol).to_string(),
        })
    }
}
