use crate::config::Config;
use crate::inhibitor::{Inhibitor, PlatformInhibitor, create_inhibitor};
use crate::macros::lock;
use crate::unique_id::operation_id;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, trace, warn};

#[derive(Debug)]
struct State<I> {
    active: HashSet<String>,
    /// Description of the operation which started the current inhibition.
    /// Not updated by later registrations.
    current_reason: String,
    inhibitor: I,
}

/// Maps any number of concurrently running operations
/// onto a single suspend inhibition.
///
/// The first registered operation inhibits suspend
/// and the last one to unregister releases it.
/// The operation set and the inhibitor sit behind one lock,
/// so the emptiness check and the inhibitor call happen atomically.
///
/// Inhibition failures are logged and never stop an operation from registering.
#[derive(Debug)]
pub struct SuspendManager<I = PlatformInhibitor> {
    state: Mutex<State<I>>,
}

impl SuspendManager {
    /// Creates a manager using the inhibitor for the current target.
    pub fn from_config(config: &Config) -> Self {
        Self::new(create_inhibitor(config))
    }
}

impl<I: Inhibitor> SuspendManager<I> {
    pub fn new(inhibitor: I) -> Self {
        Self {
            state: Mutex::new(State {
                active: HashSet::new(),
                current_reason: String::new(),
                inhibitor,
            }),
        }
    }

    /// Marks `operation_id` as running.
    ///
    /// Registering an id which is already active does nothing.
    /// If no other operation was running, suspend is inhibited
    /// with `description` as the reason.
    pub fn register_operation(&self, operation_id: impl Into<String>, description: &str) {
        let operation_id = operation_id.into();
        debug!("Registering operation: {operation_id} - {description}");

        let mut state = lock!(self.state);
        let was_empty = state.active.is_empty();
        state.active.insert(operation_id);

        if was_empty {
            state.current_reason = description.to_string();

            let State {
                current_reason,
                inhibitor,
                ..
            } = &mut *state;

            if !inhibitor.inhibit(current_reason) {
                warn!("Continuing without suspend inhibition: {current_reason}");
            }
        }
    }

    /// Marks `operation_id` as finished.
    ///
    /// Unknown ids are ignored.
    /// Suspend inhibition is released once the last operation is gone.
    pub fn unregister_operation(&self, operation_id: &str) {
        debug!("Unregistering operation: {operation_id}");

        let mut state = lock!(self.state);
        Self::remove_operation(&mut state, operation_id);
    }

    fn remove_operation(state: &mut State<I>, operation_id: &str) {
        if !state.active.remove(operation_id) {
            trace!("Operation {operation_id} was not registered");
            return;
        }

        if state.active.is_empty() && !state.inhibitor.release() {
            warn!("Suspend inhibition may still be held by the OS");
        }
    }

    /// Whether any operation is currently registered.
    pub fn has_active_operations(&self) -> bool {
        !lock!(self.state).active.is_empty()
    }

    pub fn active_operation_count(&self) -> usize {
        lock!(self.state).active.len()
    }

    /// Reason passed to the OS for the current inhibition,
    /// or `None` when no operation is running.
    pub fn current_reason(&self) -> Option<String> {
        let state = lock!(self.state);
        (!state.active.is_empty()).then(|| state.current_reason.clone())
    }

    /// Whether the OS currently holds a suspend inhibition for this process.
    pub fn is_inhibited(&self) -> bool {
        lock!(self.state).inhibitor.is_inhibited()
    }

    /// Registers `operation_id` and returns a guard
    /// which unregisters it when dropped.
    pub fn track(
        &self,
        operation_id: impl Into<String>,
        description: &str,
    ) -> OperationGuard<'_, I> {
        let operation_id = operation_id.into();
        self.register_operation(operation_id.clone(), description);

        OperationGuard {
            manager: self,
            operation_id,
        }
    }

    /// Registers an operation under a freshly generated id.
    /// See [`SuspendManager::track`].
    pub fn begin(&self, description: &str) -> OperationGuard<'_, I> {
        self.track(operation_id("operation"), description)
    }
}

/// Keeps an operation registered until dropped,
/// covering error and cancellation paths as well as success.
#[must_use = "dropping the guard immediately unregisters the operation"]
#[derive(Debug)]
pub struct OperationGuard<'a, I: Inhibitor = PlatformInhibitor> {
    manager: &'a SuspendManager<I>,
    operation_id: String,
}

impl<I: Inhibitor> OperationGuard<'_, I> {
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }
}

impl<I: Inhibitor> Drop for OperationGuard<'_, I> {
    fn drop(&mut self) {
        debug!("Unregistering operation: {}", self.operation_id);

        // May run while unwinding, where a second panic would abort.
        let mut state = self
            .manager
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        SuspendManager::<I>::remove_operation(&mut state, &self.operation_id);
    }
}
