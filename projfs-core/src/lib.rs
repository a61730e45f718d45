//! Provider event engine for a user-space projected filesystem.
//!
//! This crate bridges a kernel projection driver's event protocol (demand, notification, and
//! permission events delivered over [`projfs_sys`]) with a provider's own callbacks, and exposes
//! the placeholder/update API a provider uses to shape the projected tree.

pub mod callbacks;
pub mod dispatcher;
pub mod error;
pub mod instance;
pub mod model;
pub mod placeholder;
mod process;
pub mod session;
pub mod writer;

pub use callbacks::ProviderCallbacks;
pub use error::{Code, ProjFsError, ProjFsResult, UpdateFailureCause};
pub use instance::VirtualizationInstance;
pub use model::{NotificationType, PlaceholderId, ProjectionState, RawEvent, Trigger, ID_LEN};
pub use session::Session;

use std::sync::OnceLock;

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a `tracing-subscriber` global default suitable for provider processes. Idempotent —
/// safe to call from multiple entry points (library init, tests) without panicking on a second
/// attempt to set the global subscriber.
pub fn init_logging() {
    LOGGING_INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}
