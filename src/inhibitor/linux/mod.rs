mod dbus;

use super::fallback::{FallbackInhibitor, InhibitionHandle, SessionStrategy};
use crate::config::{Config, SessionService};
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use dbus::{GnomeSessionManagerProxyBlocking, Login1ManagerProxyBlocking, PolicyAgentProxyBlocking};
use std::fmt;
use tracing::trace;
use zbus::blocking::Connection;

/// What logind is asked to inhibit.
const LOGIND_WHAT: &str = "sleep:idle";
/// Logind inhibitor mode. `block` holds off suspend until released.
const LOGIND_MODE: &str = "block";
/// GNOME's `toplevel_xid`. There is no window to attach the inhibitor to.
const GNOME_NO_TOPLEVEL: u32 = 0;

#[derive(Debug, Clone, Copy)]
enum Bus {
    System,
    Session,
}

impl fmt::Display for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Session => write!(f, "session"),
        }
    }
}

/// Lazily opened bus connection.
///
/// The GNOME and KDE services drop a client's inhibitors
/// when its connection closes,
/// so the connection is kept for as long as the strategy lives.
#[derive(Debug)]
struct BusConnection {
    bus: Bus,
    connection: Option<Connection>,
}

impl BusConnection {
    const fn new(bus: Bus) -> Self {
        Self {
            bus,
            connection: None,
        }
    }

    fn get(&mut self) -> Result<Connection> {
        if let Some(connection) = &self.connection {
            return Ok(connection.clone());
        }

        trace!("Connecting to the {} bus", self.bus);
        let connection = match self.bus {
            Bus::System => Connection::system(),
            Bus::Session => Connection::session(),
        }
        .wrap_err_with(|| format!("Failed to connect to the {} bus", self.bus))?;

        self.connection = Some(connection.clone());
        Ok(connection)
    }

    /// Runs `f` against the connection.
    /// A failed call drops the connection so the next call starts fresh.
    fn call<T>(&mut self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let connection = self.get()?;
        let res = f(&connection);
        if res.is_err() {
            self.connection = None;
        }
        res
    }
}

/// `org.freedesktop.login1.Manager.Inhibit` on the system bus.
#[derive(Debug)]
pub struct Logind {
    app_name: String,
    bus: BusConnection,
}

impl Logind {
    pub fn new(config: &Config) -> Self {
        Self {
            app_name: config.app_name.clone(),
            bus: BusConnection::new(Bus::System),
        }
    }
}

impl SessionStrategy for Logind {
    fn name(&self) -> &'static str {
        "systemd-logind"
    }

    fn attempt(&mut self, reason: &str) -> Result<InhibitionHandle> {
        self.bus.call(|connection| {
            let proxy = Login1ManagerProxyBlocking::new(connection)
                .wrap_err("Failed to create login1 manager proxy")?;

            let fd = proxy
                .inhibit(LOGIND_WHAT, &self.app_name, reason, LOGIND_MODE)
                .wrap_err("login1 Inhibit call failed")?;

            Ok(InhibitionHandle::Descriptor(fd.into()))
        })
    }
}

/// `org.gnome.SessionManager.Inhibit` on the session bus.
#[derive(Debug)]
pub struct GnomeSession {
    app_id: String,
    flags: u32,
    bus: BusConnection,
}

impl GnomeSession {
    pub fn new(config: &Config) -> Self {
        Self {
            app_id: config.app_id.clone(),
            flags: config.gnome_inhibit_flags,
            bus: BusConnection::new(Bus::Session),
        }
    }
}

impl SessionStrategy for GnomeSession {
    fn name(&self) -> &'static str {
        "GNOME session manager"
    }

    fn attempt(&mut self, reason: &str) -> Result<InhibitionHandle> {
        self.bus.call(|connection| {
            let proxy = GnomeSessionManagerProxyBlocking::new(connection)
                .wrap_err("Failed to create GNOME session manager proxy")?;

            let cookie = proxy
                .inhibit(&self.app_id, GNOME_NO_TOPLEVEL, reason, self.flags)
                .wrap_err("GNOME Inhibit call failed")?;

            Ok(InhibitionHandle::Cookie(cookie))
        })
    }

    fn releases_cookies(&self) -> bool {
        true
    }

    fn release_cookie(&mut self, cookie: u32) -> Result<()> {
        self.bus.call(|connection| {
            GnomeSessionManagerProxyBlocking::new(connection)
                .wrap_err("Failed to create GNOME session manager proxy")?
                .uninhibit(cookie)
                .wrap_err("GNOME Uninhibit call failed")
        })
    }
}

/// KDE PowerDevil's `PolicyAgent.AddInhibition` on the session bus.
#[derive(Debug)]
pub struct KdePowerManagement {
    app_id: String,
    policy: u32,
    bus: BusConnection,
}

impl KdePowerManagement {
    pub fn new(config: &Config) -> Self {
        Self {
            app_id: config.app_id.clone(),
            policy: config.kde_inhibit_policy,
            bus: BusConnection::new(Bus::Session),
        }
    }
}

impl SessionStrategy for KdePowerManagement {
    fn name(&self) -> &'static str {
        "KDE PowerDevil"
    }

    fn attempt(&mut self, reason: &str) -> Result<InhibitionHandle> {
        self.bus.call(|connection| {
            let proxy = PolicyAgentProxyBlocking::new(connection)
                .wrap_err("Failed to create PowerDevil policy agent proxy")?;

            let cookie = proxy
                .add_inhibition(self.policy, &self.app_id, reason)
                .wrap_err("PowerDevil AddInhibition call failed")?;

            Ok(InhibitionHandle::Cookie(cookie))
        })
    }

    fn releases_cookies(&self) -> bool {
        true
    }

    fn release_cookie(&mut self, cookie: u32) -> Result<()> {
        self.bus.call(|connection| {
            PolicyAgentProxyBlocking::new(connection)
                .wrap_err("Failed to create PowerDevil policy agent proxy")?
                .release_inhibition(cookie)
                .wrap_err("PowerDevil ReleaseInhibition call failed")
        })
    }
}

impl FallbackInhibitor {
    /// Creates an inhibitor trying the configured session services in order.
    /// No bus is contacted until the first `inhibit`.
    pub fn from_config(config: &Config) -> Self {
        let strategies = config
            .session_services
            .iter()
            .map(|service| -> Box<dyn SessionStrategy> {
                match service {
                    SessionService::Logind => Box::new(Logind::new(config)),
                    SessionService::Gnome => Box::new(GnomeSession::new(config)),
                    SessionService::Kde => Box::new(KdePowerManagement::new(config)),
                }
            })
            .collect();

        Self::new(strategies)
    }
}
