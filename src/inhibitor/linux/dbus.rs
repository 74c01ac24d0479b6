use zbus::proxy;
use zbus::zvariant::OwnedFd;

#[proxy(
    interface = "org.freedesktop.login1.Manager",
    default_service = "org.freedesktop.login1",
    default_path = "/org/freedesktop/login1",
    gen_async = false,
    blocking_name = "Login1ManagerProxyBlocking"
)]
pub trait Login1Manager {
    /// Takes an inhibitor lock, which is held until the returned descriptor is closed.
    fn inhibit(&self, what: &str, who: &str, why: &str, mode: &str) -> zbus::Result<OwnedFd>;
}

#[proxy(
    interface = "org.gnome.SessionManager",
    default_service = "org.gnome.SessionManager",
    default_path = "/org/gnome/SessionManager",
    gen_async = false,
    blocking_name = "GnomeSessionManagerProxyBlocking"
)]
pub trait GnomeSessionManager {
    fn inhibit(&self, app_id: &str, toplevel_xid: u32, reason: &str, flags: u32)
    -> zbus::Result<u32>;

    fn uninhibit(&self, inhibit_cookie: u32) -> zbus::Result<()>;
}

#[proxy(
    interface = "org.kde.Solid.PowerManagement.PolicyAgent",
    default_service = "org.kde.Solid.PowerManagement",
    default_path = "/org/kde/Solid/PowerManagement/PolicyAgent",
    gen_async = false,
    blocking_name = "PolicyAgentProxyBlocking"
)]
pub trait PolicyAgent {
    fn add_inhibition(&self, types: u32, app_name: &str, reason: &str) -> zbus::Result<u32>;

    fn release_inhibition(&self, cookie: u32) -> zbus::Result<()>;
}
