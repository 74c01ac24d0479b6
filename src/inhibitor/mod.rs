use crate::config::Config;
use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(all(unix, not(target_os = "macos")))] {
        mod fallback;
        mod linux;

        pub use fallback::{FallbackInhibitor, InhibitionHandle, SessionStrategy};
        pub use linux::{GnomeSession, KdePowerManagement, Logind};

        /// Suspend inhibitor for the current target.
        pub type PlatformInhibitor = FallbackInhibitor;
    } else if #[cfg(target_os = "macos")] {
        mod macos;

        pub use macos::AssertionInhibitor;

        /// Suspend inhibitor for the current target.
        pub type PlatformInhibitor = AssertionInhibitor;
    } else if #[cfg(windows)] {
        mod windows;

        pub use windows::ExecutionStateInhibitor;

        /// Suspend inhibitor for the current target.
        pub type PlatformInhibitor = ExecutionStateInhibitor;
    } else {
        mod unsupported;

        pub use unsupported::UnsupportedInhibitor;

        /// Suspend inhibitor for the current target.
        pub type PlatformInhibitor = UnsupportedInhibitor;
    }
}

/// Requests and releases suspend inhibition from the operating system.
///
/// Both calls are idempotent on the inhibited flag:
/// `inhibit` while inhibited and `release` while released
/// succeed without touching the OS.
///
/// Failures are logged by the implementation and never panic.
pub trait Inhibitor: Send {
    /// Prevents the system from suspending, showing `reason` where the OS supports it.
    /// Returns `true` if the system is inhibited after the call.
    fn inhibit(&mut self, reason: &str) -> bool;

    /// Gives up a held inhibition.
    ///
    /// The inhibited flag is always cleared,
    /// even if the OS rejects the release.
    /// Returns `false` only when that OS call failed.
    fn release(&mut self) -> bool;

    /// Whether the OS has acknowledged an inhibition that has not been released.
    fn is_inhibited(&self) -> bool;
}

impl<T: Inhibitor + ?Sized> Inhibitor for Box<T> {
    fn inhibit(&mut self, reason: &str) -> bool {
        (**self).inhibit(reason)
    }

    fn release(&mut self) -> bool {
        (**self).release()
    }

    fn is_inhibited(&self) -> bool {
        (**self).is_inhibited()
    }
}

/// Creates the inhibitor for the current target.
pub fn create_inhibitor(config: &Config) -> PlatformInhibitor {
    PlatformInhibitor::from_config(config)
}
