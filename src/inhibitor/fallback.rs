use super::Inhibitor;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use std::fmt;
use std::iter;
use std::os::fd::OwnedFd;
use tracing::{debug, error, info, warn};

/// Token needed to undo an inhibition taken through a session service.
#[derive(Debug)]
pub enum InhibitionHandle {
    /// The inhibition lasts for as long as the descriptor stays open.
    Descriptor(OwnedFd),
    /// Cookie to hand back to an uninhibit call.
    Cookie(u32),
}

/// One way of inhibiting suspend through a desktop session service.
pub trait SessionStrategy: Send {
    /// Name used in log messages.
    fn name(&self) -> &'static str;

    /// Asks the service to inhibit suspend.
    /// An `Err` means the service was unreachable or refused.
    fn attempt(&mut self, reason: &str) -> Result<InhibitionHandle>;

    /// Whether this service understands [`InhibitionHandle::Cookie`] releases.
    fn releases_cookies(&self) -> bool {
        false
    }

    /// Releases an inhibition identified by `cookie`.
    fn release_cookie(&mut self, cookie: u32) -> Result<()> {
        Err(eyre!("{} does not issue cookies (cookie {cookie})", self.name()))
    }
}

#[derive(Debug)]
struct Held {
    handle: InhibitionHandle,
    issuer: usize,
}

/// Inhibitor which tries an ordered list of session services
/// and keeps the handle from the first one to succeed.
pub struct FallbackInhibitor {
    strategies: Vec<Box<dyn SessionStrategy>>,
    held: Option<Held>,
}

impl FallbackInhibitor {
    /// Creates an inhibitor trying `strategies` in order.
    pub fn new(strategies: Vec<Box<dyn SessionStrategy>>) -> Self {
        Self {
            strategies,
            held: None,
        }
    }

    /// Names of the services tried, highest priority first.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    fn strategy_name(&self, index: usize) -> &'static str {
        self.strategies
            .get(index)
            .map_or("unknown service", |strategy| strategy.name())
    }

    /// Hands `cookie` to the issuing service first,
    /// then to every other service which takes cookies,
    /// until one of them confirms.
    fn release_cookie(&mut self, cookie: u32, issuer: usize) -> bool {
        let count = self.strategies.len();
        let order = iter::once(issuer).chain((0..count).filter(move |&index| index != issuer));

        for index in order {
            let Some(strategy) = self.strategies.get_mut(index) else {
                continue;
            };

            if !strategy.releases_cookies() {
                continue;
            }

            match strategy.release_cookie(cookie) {
                Ok(()) => {
                    debug!(
                        "Successfully released suspend inhibition via {}",
                        strategy.name()
                    );
                    return true;
                }
                Err(err) => {
                    warn!(
                        "Failed to release suspend inhibition via {}: {err:?}",
                        strategy.name()
                    );
                }
            }
        }

        error!("No session service accepted inhibition cookie {cookie}");
        false
    }
}

impl Inhibitor for FallbackInhibitor {
    fn inhibit(&mut self, reason: &str) -> bool {
        if let Some(held) = &self.held {
            debug!(
                "Suspend inhibition already active via {}",
                self.strategy_name(held.issuer)
            );
            return true;
        }

        for (issuer, strategy) in self.strategies.iter_mut().enumerate() {
            match strategy.attempt(reason) {
                Ok(handle) => {
                    info!(
                        "Successfully inhibited suspend via {}: {reason}",
                        strategy.name()
                    );
                    self.held = Some(Held { handle, issuer });
                    return true;
                }
                Err(err) => {
                    warn!("Failed to inhibit suspend via {}: {err:?}", strategy.name());
                }
            }
        }

        warn!("Could not inhibit suspend - no compatible power management service found");
        false
    }

    fn release(&mut self) -> bool {
        let Some(Held { handle, issuer }) = self.held.take() else {
            return true;
        };

        match handle {
            InhibitionHandle::Descriptor(fd) => {
                drop(fd);
                debug!(
                    "Released suspend inhibition ({} descriptor closed)",
                    self.strategy_name(issuer)
                );
                true
            }
            InhibitionHandle::Cookie(cookie) => self.release_cookie(cookie, issuer),
        }
    }

    fn is_inhibited(&self) -> bool {
        self.held.is_some()
    }
}

impl Drop for FallbackInhibitor {
    fn drop(&mut self) {
        if self.held.is_some() {
            debug!("Releasing suspend inhibition held at shutdown");
            self.release();
        }
    }
}

impl fmt::Debug for FallbackInhibitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackInhibitor")
            .field("strategies", &self.strategy_names())
            .field("held", &self.held)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::sync::{Arc, Mutex};

    type CallLog = Arc<Mutex<Vec<String>>>;

    enum Issues {
        Descriptor,
        Cookie(u32),
        Nothing,
    }

    struct MockStrategy {
        name: &'static str,
        issues: Issues,
        release_ok: bool,
        log: CallLog,
    }

    impl MockStrategy {
        fn boxed(
            name: &'static str,
            issues: Issues,
            release_ok: bool,
            log: &CallLog,
        ) -> Box<dyn SessionStrategy> {
            Box::new(Self {
                name,
                issues,
                release_ok,
                log: log.clone(),
            })
        }
    }

    impl SessionStrategy for MockStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        fn attempt(&mut self, reason: &str) -> Result<InhibitionHandle> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:inhibit:{reason}", self.name));

            match self.issues {
                Issues::Descriptor => Ok(InhibitionHandle::Descriptor(
                    File::open("/dev/null")?.into(),
                )),
                Issues::Cookie(cookie) => Ok(InhibitionHandle::Cookie(cookie)),
                Issues::Nothing => Err(eyre!("{} is not running", self.name)),
            }
        }

        fn releases_cookies(&self) -> bool {
            !matches!(self.issues, Issues::Descriptor)
        }

        fn release_cookie(&mut self, cookie: u32) -> Result<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:release:{cookie}", self.name));

            if self.release_ok {
                Ok(())
            } else {
                Err(eyre!("unknown cookie"))
            }
        }
    }

    fn calls(log: &CallLog) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn stops_at_first_working_service() {
        let log = CallLog::default();
        let mut inhibitor = FallbackInhibitor::new(vec![
            MockStrategy::boxed("logind", Issues::Nothing, true, &log),
            MockStrategy::boxed("gnome", Issues::Cookie(7), true, &log),
            MockStrategy::boxed("kde", Issues::Cookie(9), true, &log),
        ]);

        assert!(inhibitor.inhibit("Writing to USB"));
        assert!(inhibitor.is_inhibited());
        assert_eq!(
            calls(&log),
            ["logind:inhibit:Writing to USB", "gnome:inhibit:Writing to USB"]
        );
    }

    #[test]
    fn all_services_failing_leaves_system_uninhibited() {
        let log = CallLog::default();
        let mut inhibitor = FallbackInhibitor::new(vec![
            MockStrategy::boxed("logind", Issues::Nothing, true, &log),
            MockStrategy::boxed("gnome", Issues::Nothing, true, &log),
            MockStrategy::boxed("kde", Issues::Nothing, true, &log),
        ]);

        assert!(!inhibitor.inhibit("Downloading"));
        assert!(!inhibitor.is_inhibited());
        assert_eq!(calls(&log).len(), 3);
    }

    #[test]
    fn repeated_inhibit_contacts_service_once() {
        let log = CallLog::default();
        let mut inhibitor = FallbackInhibitor::new(vec![MockStrategy::boxed(
            "gnome",
            Issues::Cookie(1),
            true,
            &log,
        )]);

        assert!(inhibitor.inhibit("first"));
        assert!(inhibitor.inhibit("second"));
        assert_eq!(calls(&log), ["gnome:inhibit:first"]);
    }

    #[test]
    fn repeated_release_contacts_service_once() {
        let log = CallLog::default();
        let mut inhibitor = FallbackInhibitor::new(vec![MockStrategy::boxed(
            "gnome",
            Issues::Cookie(42),
            true,
            &log,
        )]);

        inhibitor.inhibit("Downloading");
        assert!(inhibitor.release());
        assert!(inhibitor.release());
        assert!(!inhibitor.is_inhibited());
        assert_eq!(
            calls(&log),
            ["gnome:inhibit:Downloading", "gnome:release:42"]
        );
    }

    #[test]
    fn descriptor_release_needs_no_service_call() {
        let log = CallLog::default();
        let mut inhibitor = FallbackInhibitor::new(vec![
            MockStrategy::boxed("logind", Issues::Descriptor, true, &log),
            MockStrategy::boxed("gnome", Issues::Cookie(3), true, &log),
        ]);

        assert!(inhibitor.inhibit("Downloading"));
        assert!(inhibitor.release());
        assert!(!inhibitor.is_inhibited());
        assert_eq!(calls(&log), ["logind:inhibit:Downloading"]);
    }

    #[test]
    fn cookie_release_falls_through_to_other_services() {
        let log = CallLog::default();
        let mut inhibitor = FallbackInhibitor::new(vec![
            MockStrategy::boxed("logind", Issues::Nothing, true, &log),
            MockStrategy::boxed("gnome", Issues::Nothing, true, &log),
            MockStrategy::boxed("kde", Issues::Cookie(5), false, &log),
        ]);

        assert!(inhibitor.inhibit("Writing"));
        assert!(inhibitor.release());
        assert_eq!(&calls(&log)[3..], ["kde:release:5", "logind:release:5"]);
    }

    #[test]
    fn failed_release_still_clears_flag() {
        let log = CallLog::default();
        let mut inhibitor = FallbackInhibitor::new(vec![MockStrategy::boxed(
            "kde",
            Issues::Cookie(11),
            false,
            &log,
        )]);

        assert!(inhibitor.inhibit("Writing"));
        assert!(!inhibitor.release());
        assert!(!inhibitor.is_inhibited());

        assert!(inhibitor.inhibit("Writing again"));
        assert_eq!(calls(&log).len(), 3);
    }

    #[test]
    fn drop_releases_held_inhibition() {
        let log = CallLog::default();
        let mut inhibitor = FallbackInhibitor::new(vec![MockStrategy::boxed(
            "gnome",
            Issues::Cookie(8),
            true,
            &log,
        )]);

        inhibitor.inhibit("Downloading");
        drop(inhibitor);

        assert_eq!(calls(&log).last().unwrap(), "gnome:release:8");
    }
}
