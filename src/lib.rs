#![doc = include_str!("../README.md")]

use std::sync::OnceLock;

mod error;
mod macros;
mod manager;
mod unique_id;

pub mod config;
pub mod inhibitor;
pub mod logging;

pub use config::Config;
pub use inhibitor::{Inhibitor, PlatformInhibitor, create_inhibitor};
pub use manager::{OperationGuard, SuspendManager};

/// Name used for the config directory and log directory.
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Gets the process-wide manager, creating it on first use.
///
/// Hosts which construct their own [`SuspendManager`]
/// and pass it around do not need this.
pub fn manager() -> &'static SuspendManager {
    static MANAGER: OnceLock<SuspendManager> = OnceLock::new();

    MANAGER.get_or_init(|| {
        tracing::debug!("Creating suspend manager, version {VERSION}");
        SuspendManager::from_config(&Config::load(APP_NAME))
    })
}
