use color_eyre::Result;
use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::{debug, error, warn};
use universal_config::ConfigLoader;

/// Environment variable pointing at an explicit config file.
/// When unset, the config is searched for in the app's config directory.
pub const CONFIG_ENV_VAR: &str = "SUSPEND_INHIBIT_CONFIG";

/// Desktop session service which can hold a suspend inhibition.
///
/// **Valid options**: `logind`, `gnome`, `kde`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionService {
    /// `org.freedesktop.login1.Manager` on the system bus.
    Logind,
    /// `org.gnome.SessionManager` on the session bus.
    Gnome,
    /// `org.kde.Solid.PowerManagement.PolicyAgent` on the session bus.
    Kde,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Application name shown by logind as the inhibitor's owner.
    ///
    /// **Default**: `Fedora Media Writer`
    pub app_name: String,

    /// Application identifier passed to the GNOME and KDE session managers.
    ///
    /// **Default**: `org.fedoraproject.MediaWriter`
    pub app_id: String,

    /// Flags passed to `org.gnome.SessionManager.Inhibit`.
    /// `8` inhibits suspend, `4` inhibits idle.
    ///
    /// **Default**: `8`
    pub gnome_inhibit_flags: u32,

    /// Policy passed to KDE's `AddInhibition`.
    ///
    /// **Default**: `1`
    pub kde_inhibit_policy: u32,

    /// Session services to try, highest priority first.
    /// Services missing from the list are never contacted.
    ///
    /// **Default**: `["logind", "gnome", "kde"]`
    pub session_services: Vec<SessionService>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Fedora Media Writer".to_string(),
            app_id: "org.fedoraproject.MediaWriter".to_string(),
            gnome_inhibit_flags: 8,
            kde_inhibit_policy: 1,
            session_services: vec![
                SessionService::Logind,
                SessionService::Gnome,
                SessionService::Kde,
            ],
        }
    }
}

impl Config {
    /// Loads the config for `app_name`.
    ///
    /// Uses the file named by [`CONFIG_ENV_VAR`] if set,
    /// otherwise searches the app's config directory.
    /// Any failure is logged and the default config is returned instead.
    pub fn load(app_name: &str) -> Self {
        let config = env::var(CONFIG_ENV_VAR).map_or_else(
            |_| ConfigLoader::new(app_name).find_and_load(),
            ConfigLoader::load,
        );

        match config {
            Ok(config) => {
                debug!("Loaded config file");
                config
            }
            Err(err) => {
                error!("Failed to load config: {}", err);
                warn!("Falling back to the default config");
                Self::default()
            }
        }
    }

    /// Loads the config from an explicit file.
    /// The format is picked from the file extension.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Ok(ConfigLoader::load(path)?)
    }
}
