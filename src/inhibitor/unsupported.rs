use super::Inhibitor;
use crate::config::Config;
use tracing::warn;

/// Inhibitor for targets without a known suspend inhibition API.
/// Every `inhibit` fails, so operations run unprotected.
#[derive(Debug, Default)]
pub struct UnsupportedInhibitor;

impl UnsupportedInhibitor {
    pub fn new() -> Self {
        Self
    }

    pub fn from_config(_config: &Config) -> Self {
        Self::new()
    }
}

impl Inhibitor for UnsupportedInhibitor {
    fn inhibit(&mut self, reason: &str) -> bool {
        warn!("Could not inhibit suspend ({reason}) - not supported on this platform");
        false
    }

    fn release(&mut self) -> bool {
        true
    }

    fn is_inhibited(&self) -> bool {
        false
    }
}
