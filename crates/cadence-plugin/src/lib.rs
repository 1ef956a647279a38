//! Plugin contract for Cadence.
//!
//! This crate defines what every out-of-process plugin implements and what
//! the host sends it:
//! - [`Plugin`]: The three-method contract (`get_info`, `execute`, `validate`)
//! - [`Hook`]: The release lifecycle stages a plugin can attach to
//! - [`ExecuteRequest`] / [`ExecuteResponse`]: Running a hook
//! - [`ValidateResponse`]: Checking a configuration map
//! - [`ProgressReporter`] / [`StreamLogger`]: Fire-and-forget telemetry
//!   emitted from inside a call

mod config;
mod context;
mod error;
mod execute;
mod hook;
mod info;
mod notification;
mod progress;
mod traits;
mod validate;

pub use cadence_commit::{CategorizedChanges, ChangeCategory, ConventionalCommit};
pub use config::{ConfigAccessor, ConfigMap};
pub use context::{ReleaseContext, RepositoryInfo};
pub use error::{PluginError, PluginResult};
pub use execute::{Artifact, ExecuteRequest, ExecuteResponse};
pub use hook::{Hook, ParseHookError};
pub use info::Info;
pub use notification::{
    LogLevel, LogNotification, MESSAGE_METHOD, Notification, NotificationSink, NullSink,
    PROGRESS_METHOD, ProgressKind, ProgressNotification, ProgressToken,
};
pub use progress::{ProgressReporter, StreamLogger};
pub use traits::{CallContext, Plugin};
pub use validate::{ValidateResponse, ValidationBuilder, ValidationError};
