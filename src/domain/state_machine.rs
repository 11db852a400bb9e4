//! The recording state machine (§4.C).
//!
//! Six states, a five-event alphabet, and listener fan-out on every
//! transition. Grounded on `recording_session_service.py`'s use of
//! `StateMachine`/`RecordEvent`/`RecordState` (the Python source's own
//! `StateMachine` class was not present in the retrieved snapshot; its shape
//! here follows exactly from how the session service drives it —
//! `sm.handle(RecordEvent.X)`, `sm.state`, `sm.add_listener(async_fn)`).

use crate::error::AppError;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordState {
    Stopped,
    Matching,
    Recording,
    Paused,
    /// Reached on `STOP` the same way `Stopping` is; kept as a distinct name
    /// because the specification lists both, but it carries the same
    /// `NONE`-action phase-handler policy (§4.E) and the same completion
    /// edge to `Stopped`.
    Finishing,
    Stopping,
}

impl RecordState {
    pub fn name(&self) -> &'static str {
        match self {
            RecordState::Stopped => "STOPPED",
            RecordState::Matching => "MATCHING",
            RecordState::Recording => "RECORDING",
            RecordState::Paused => "PAUSED",
            RecordState::Finishing => "FINISHING",
            RecordState::Stopping => "STOPPING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordEvent {
    Start,
    Pause,
    Resume,
    Stop,
    Reset,
}

impl RecordEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RecordEvent::Start => "START",
            RecordEvent::Pause => "PAUSE",
            RecordEvent::Resume => "RESUME",
            RecordEvent::Stop => "STOP",
            RecordEvent::Reset => "RESET",
        }
    }
}

/// Registered on every transition; per §4.C, "listeners may not themselves
/// block on commands" — the callback is synchronous and expected to return
/// quickly (logging, metrics), not drive further state-machine calls.
pub type Listener = Box<dyn Fn(RecordState) + Send + Sync>;

pub struct StateMachine {
    state: Mutex<RecordState>,
    listeners: Mutex<Vec<Listener>>,
}

impl StateMachine {
    pub fn new() -> Self {
        StateMachine {
            state: Mutex::new(RecordState::Stopped),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> RecordState {
        *self.state.lock().expect("state mutex poisoned")
    }

    pub fn add_listener(&self, listener: Listener) {
        self.listeners.lock().expect("listeners mutex poisoned").push(listener);
    }

    fn notify(&self, state: RecordState) {
        for listener in self.listeners.lock().expect("listeners mutex poisoned").iter() {
            listener(state);
        }
    }

    /// Apply `event`, returning the resulting state or a `RuleViolation` if
    /// the transition is not defined for the current state (per §4.C's
    /// diagram; `RESET` is defined from every state).
    pub fn handle(&self, event: RecordEvent) -> Result<RecordState, AppError> {
        let mut guard = self.state.lock().expect("state mutex poisoned");
        let current = *guard;

        if event == RecordEvent::Reset {
            *guard = RecordState::Stopped;
            drop(guard);
            self.notify(RecordState::Stopped);
            return Ok(RecordState::Stopped);
        }

        let next = match (current, event) {
            (RecordState::Stopped, RecordEvent::Start) => RecordState::Matching,
            (RecordState::Matching, RecordEvent::Start) => RecordState::Recording,
            // Idempotent self-transition: an external `started` notification
            // arriving while already RECORDING doesn't move the machine.
            (RecordState::Recording, RecordEvent::Start) => RecordState::Recording,
            (RecordState::Recording, RecordEvent::Pause) => RecordState::Paused,
            (RecordState::Paused, RecordEvent::Resume) => RecordState::Recording,
            (RecordState::Recording, RecordEvent::Stop) => RecordState::Stopping,
            (RecordState::Paused, RecordEvent::Stop) => RecordState::Stopping,
            _ => {
                return Err(AppError::RuleViolation(format!(
                    "no transition for event {} in state {}",
                    event.name(),
                    current.name()
                )))
            }
        };

        *guard = next;
        drop(guard);
        self.notify(next);
        Ok(next)
    }

    /// Completion of an internal `STOPPING`/`FINISHING` phase always lands on
    /// `STOPPED`; the phase handler policy for these states is `NONE` (§4.E)
    /// so nothing else drives this edge.
    pub fn complete(&self) -> RecordState {
        let mut guard = self.state.lock().expect("state mutex poisoned");
        if matches!(*guard, RecordState::Stopping | RecordState::Finishing) {
            *guard = RecordState::Stopped;
        }
        let state = *guard;
        drop(guard);
        self.notify(state);
        state
    }

    /// Reconciles an external recorder status notification (§4.C): only
    /// synthesizes the corresponding internal event when the current state
    /// disagrees with the externally reported reality.
    pub fn reconcile_external_status(&self, status: &str) -> Option<Result<RecordState, AppError>> {
        let current = self.state();
        match status {
            "started" if current == RecordState::Stopped || current == RecordState::Matching => {
                Some(self.handle(RecordEvent::Start))
            }
            "paused" if current == RecordState::Recording => Some(self.handle(RecordEvent::Pause)),
            "resumed" if current == RecordState::Paused => Some(self.handle(RecordEvent::Resume)),
            "stopped" if current != RecordState::Stopped => Some(self.handle(RecordEvent::Stop)),
            _ => None,
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn full_cycle_reaches_stopped() {
        let sm = StateMachine::new();
        assert_eq!(sm.handle(RecordEvent::Start).unwrap(), RecordState::Matching);
        assert_eq!(sm.handle(RecordEvent::Start).unwrap(), RecordState::Recording);
        assert_eq!(sm.handle(RecordEvent::Pause).unwrap(), RecordState::Paused);
        assert_eq!(sm.handle(RecordEvent::Resume).unwrap(), RecordState::Recording);
        assert_eq!(sm.handle(RecordEvent::Stop).unwrap(), RecordState::Stopping);
        assert_eq!(sm.complete(), RecordState::Stopped);
    }

    #[test]
    fn invalid_transition_is_rule_violation() {
        let sm = StateMachine::new();
        assert!(matches!(sm.handle(RecordEvent::Pause), Err(AppError::RuleViolation(_))));
    }

    #[test]
    fn reset_works_from_any_state() {
        let sm = StateMachine::new();
        sm.handle(RecordEvent::Start).unwrap();
        sm.handle(RecordEvent::Start).unwrap();
        assert_eq!(sm.handle(RecordEvent::Reset).unwrap(), RecordState::Stopped);
    }

    #[test]
    fn listeners_fire_on_every_transition() {
        let sm = StateMachine::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counted = count.clone();
        sm.add_listener(Box::new(move |_state| {
            counted.fetch_add(1, Ordering::SeqCst);
        }));
        sm.handle(RecordEvent::Start).unwrap();
        sm.handle(RecordEvent::Start).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn external_started_is_ignored_when_already_recording() {
        let sm = StateMachine::new();
        sm.handle(RecordEvent::Start).unwrap();
        sm.handle(RecordEvent::Start).unwrap();
        assert!(sm.reconcile_external_status("started").is_none());
    }
}
