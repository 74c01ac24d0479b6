use super::Inhibitor;
use crate::config::Config;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use tracing::{debug, info, warn};
use windows_sys::Win32::Foundation::GetLastError;
use windows_sys::Win32::System::Power::{
    ES_AWAYMODE_REQUIRED, ES_CONTINUOUS, ES_SYSTEM_REQUIRED, EXECUTION_STATE,
    SetThreadExecutionState,
};

const INHIBIT_STATE: EXECUTION_STATE = ES_CONTINUOUS | ES_SYSTEM_REQUIRED | ES_AWAYMODE_REQUIRED;
const RELEASE_STATE: EXECUTION_STATE = ES_CONTINUOUS;

/// Sets the thread execution state.
/// A zero previous state means the call failed.
fn set_execution_state(state: EXECUTION_STATE) -> Result<()> {
    // SAFETY: plain Win32 call taking a flag set.
    let previous = unsafe { SetThreadExecutionState(state) };

    if previous == 0 {
        // SAFETY: reads the calling thread's last error code.
        let code = unsafe { GetLastError() };
        Err(eyre!("SetThreadExecutionState({state:#x}) failed, error code: {code}"))
    } else {
        Ok(())
    }
}

/// Inhibitor using the thread execution state.
/// No handle is kept; releasing restores `ES_CONTINUOUS` alone.
#[derive(Debug, Default)]
pub struct ExecutionStateInhibitor {
    inhibited: bool,
}

impl ExecutionStateInhibitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(_config: &Config) -> Self {
        Self::new()
    }
}

impl Inhibitor for ExecutionStateInhibitor {
    fn inhibit(&mut self, reason: &str) -> bool {
        if self.inhibited {
            debug!("Suspend inhibition already active");
            return true;
        }

        match set_execution_state(INHIBIT_STATE) {
            Ok(()) => {
                info!("Successfully inhibited suspend on Windows: {reason}");
                self.inhibited = true;
                true
            }
            Err(err) => {
                warn!("Failed to inhibit suspend on Windows: {err:?}");
                false
            }
        }
    }

    fn release(&mut self) -> bool {
        if !self.inhibited {
            return true;
        }

        self.inhibited = false;

        match set_execution_state(RELEASE_STATE) {
            Ok(()) => {
                debug!("Successfully released suspend inhibition on Windows");
                true
            }
            Err(err) => {
                warn!("Failed to release suspend inhibition on Windows: {err:?}");
                false
            }
        }
    }

    fn is_inhibited(&self) -> bool {
        self.inhibited
    }
}

impl Drop for ExecutionStateInhibitor {
    fn drop(&mut self) {
        self.release();
    }
}
