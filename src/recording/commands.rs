//! The vocabulary phase handlers return (§4.E): an action for the session
//! service to execute, the context as the handler wants it going forward,
//! and an optional human-readable reason (surfaced in logs/events).

use crate::domain::events::DomainEvent;
use crate::recording::context::RecordingContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingAction {
    None,
    Start,
    Pause,
    Resume,
    Stop,
    Cancel,
    ResetMetadata,
    /// MATCHING's schedule-change response (§4.E): cancel the in-flight
    /// match and throw away the metadata gathered for it in one step.
    CancelAndResetMetadata,
}

#[derive(Debug, Clone)]
pub struct RecordingCommand {
    pub action: RecordingAction,
    pub updated_context: RecordingContext,
    pub reason: Option<String>,
    /// Domain events a handler decided to publish as a side effect (e.g.
    /// weapon detection's incremental `recording.metadata_updated` /
    /// `battle.weapons_detected` pair). The use case publishes these after
    /// applying `updated_context`.
    pub events: Vec<DomainEvent>,
}

impl RecordingCommand {
    pub fn none(context: RecordingContext) -> RecordingCommand {
        RecordingCommand {
            action: RecordingAction::None,
            updated_context: context,
            reason: None,
            events: Vec::new(),
        }
    }

    pub fn with_reason(action: RecordingAction, context: RecordingContext, reason: impl Into<String>) -> RecordingCommand {
        RecordingCommand {
            action,
            updated_context: context,
            reason: Some(reason.into()),
            events: Vec::new(),
        }
    }

    pub fn action(action: RecordingAction, context: RecordingContext) -> RecordingCommand {
        RecordingCommand {
            action,
            updated_context: context,
            reason: None,
            events: Vec::new(),
        }
    }

    pub fn with_events(mut self, events: Vec<DomainEvent>) -> RecordingCommand {
        self.events = events;
        self
    }
}
