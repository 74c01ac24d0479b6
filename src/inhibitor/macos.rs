use super::Inhibitor;
use crate::config::Config;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use core_foundation::base::TCFType;
use core_foundation::string::{CFString, CFStringRef};
use tracing::{debug, info, warn};

type IOPMAssertionID = u32;
type IOPMAssertionLevel = u32;
type IOReturn = i32;

#[link(name = "IOKit", kind = "framework")]
unsafe extern "C" {
    fn IOPMAssertionCreateWithName(
        assertion_type: CFStringRef,
        assertion_level: IOPMAssertionLevel,
        assertion_name: CFStringRef,
        assertion_id: *mut IOPMAssertionID,
    ) -> IOReturn;

    fn IOPMAssertionRelease(assertion_id: IOPMAssertionID) -> IOReturn;
}

/// `kIOPMAssertionTypeNoIdleSleep`
const ASSERTION_TYPE_NO_IDLE_SLEEP: &str = "NoIdleSleepAssertion";
/// `kIOPMAssertionLevelOn`
const ASSERTION_LEVEL_ON: IOPMAssertionLevel = 255;
/// `kIOReturnSuccess`
const IO_RETURN_SUCCESS: IOReturn = 0;

fn create_assertion(reason: &str) -> Result<IOPMAssertionID> {
    let assertion_type = CFString::new(ASSERTION_TYPE_NO_IDLE_SLEEP);
    let assertion_name = CFString::new(reason);
    let mut id: IOPMAssertionID = 0;

    // SAFETY: both strings outlive the call and `id` is a valid out-pointer.
    let res = unsafe {
        IOPMAssertionCreateWithName(
            assertion_type.as_concrete_TypeRef(),
            ASSERTION_LEVEL_ON,
            assertion_name.as_concrete_TypeRef(),
            &mut id,
        )
    };

    if res == IO_RETURN_SUCCESS {
        Ok(id)
    } else {
        Err(eyre!("IOPMAssertionCreateWithName failed, error code: {res}"))
    }
}

fn release_assertion(id: IOPMAssertionID) -> Result<()> {
    // SAFETY: `id` came from `IOPMAssertionCreateWithName` and is released once.
    let res = unsafe { IOPMAssertionRelease(id) };

    if res == IO_RETURN_SUCCESS {
        Ok(())
    } else {
        Err(eyre!("IOPMAssertionRelease failed, error code: {res}"))
    }
}

/// Inhibitor holding an IOKit "no idle sleep" power assertion.
#[derive(Debug, Default)]
pub struct AssertionInhibitor {
    assertion: Option<IOPMAssertionID>,
}

impl AssertionInhibitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(_config: &Config) -> Self {
        Self::new()
    }
}

impl Inhibitor for AssertionInhibitor {
    fn inhibit(&mut self, reason: &str) -> bool {
        if self.assertion.is_some() {
            debug!("Suspend inhibition already active");
            return true;
        }

        match create_assertion(reason) {
            Ok(id) => {
                info!("Successfully inhibited suspend on macOS: {reason}");
                self.assertion = Some(id);
                true
            }
            Err(err) => {
                warn!("Failed to inhibit suspend on macOS: {err:?}");
                false
            }
        }
    }

    fn release(&mut self) -> bool {
        let Some(id) = self.assertion.take() else {
            return true;
        };

        match release_assertion(id) {
            Ok(()) => {
                debug!("Successfully released suspend inhibition on macOS");
                true
            }
            Err(err) => {
                warn!("Failed to release suspend inhibition on macOS: {err:?}");
                false
            }
        }
    }

    fn is_inhibited(&self) -> bool {
        self.assertion.is_some()
    }
}

impl Drop for AssertionInhibitor {
    fn drop(&mut self) {
        self.release();
    }
}
