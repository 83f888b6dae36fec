//! Background execution of a simulation.

use super::CompartmentManager;
use crate::errors::{RCATError, RCATResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// The manager handed back once a background run is over.
#[derive(Debug)]
pub struct SimulationOutcome {
    pub manager: CompartmentManager,
    pub result: RCATResult<()>,
}

/// Handle on a simulation running on its own thread.
#[derive(Debug)]
pub struct SimulationHandle {
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<SimulationOutcome>,
}

impl SimulationHandle {
    pub(super) fn spawn(mut manager: CompartmentManager) -> Self {
        let cancel = manager.cancel_token();
        let thread = std::thread::spawn(move || {
            let result = match manager.state() {
                super::ManagerState::Idle => manager.init().map(|_| ()),
                _ => Ok(()),
            }
            .and_then(|_| manager.run().map(|_| ()));
            SimulationOutcome { manager, result }
        });
        Self { cancel, thread }
    }

    /// Ask the simulation to stop before its next realization.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait until every realization has run, one has failed or the run was cancelled.
    pub fn join(self) -> RCATResult<SimulationOutcome> {
        self.thread
            .join()
            .map_err(|_| RCATError::Error("simulation thread panicked".to_string()))
    }
}
