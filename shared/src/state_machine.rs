//! Command Dispatch State Machine
//!
//! Defines the linear dispatch lifecycle. Every intermediate state can fail;
//! terminal states accept no further events.
//!
//! ```text
//! QUEUED -> SIGNATURE_VALIDATED -> HASH_COMMITTED -> TRANSMITTING
//!        -> ACKNOWLEDGED -> MANIFEST_GENERATED -> SUCCESS
//! (any non-terminal) -> FAILED
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one command attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchState {
    Queued,
    SignatureValidated,
    HashCommitted,
    Transmitting,
    Acknowledged,
    ManifestGenerated,
    Success,
    Failed,
}

impl DispatchState {
    /// Check if no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchState::Success | DispatchState::Failed)
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchState::Queued => "QUEUED",
            DispatchState::SignatureValidated => "SIGNATURE_VALIDATED",
            DispatchState::HashCommitted => "HASH_COMMITTED",
            DispatchState::Transmitting => "TRANSMITTING",
            DispatchState::Acknowledged => "ACKNOWLEDGED",
            DispatchState::ManifestGenerated => "MANIFEST_GENERATED",
            DispatchState::Success => "SUCCESS",
            DispatchState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Events that drive a dispatch forward
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    /// Signature passed the freshness check
    SignatureAccepted,
    /// Command hash computed
    HashComputed,
    /// Envelope handed to the platform client
    TransmissionStarted,
    /// Platform accepted the command
    PlatformAcknowledged,
    /// Success manifest built
    ManifestBuilt,
    /// Result recorded
    Completed,
    /// Any error after queueing
    Error(String),
}

/// Result of a state transition attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Transition was valid and state changed
    Advanced(DispatchState),
    /// The attempt moved to FAILED
    Failed { from: DispatchState, reason: String },
    /// Transition was invalid from current state
    Invalid {
        from: DispatchState,
        event: DispatchEvent,
    },
}

/// State machine for a single command attempt
#[derive(Debug)]
pub struct CommandStateMachine {
    current_state: DispatchState,
    history: Vec<DispatchState>,
}

impl Default for CommandStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandStateMachine {
    /// Create a new state machine in Queued state
    pub fn new() -> Self {
        Self {
            current_state: DispatchState::Queued,
            history: vec![DispatchState::Queued],
        }
    }

    /// Get current state
    pub fn state(&self) -> DispatchState {
        self.current_state
    }

    /// Every state visited so far, oldest first
    pub fn visited(&self) -> &[DispatchState] {
        &self.history
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: DispatchEvent) -> Transition {
        if let DispatchEvent::Error(reason) = &event {
            if self.current_state.is_terminal() {
                return Transition::Invalid {
                    from: self.current_state,
                    event,
                };
            }
            let from = self.current_state;
            self.enter(DispatchState::Failed);
            return Transition::Failed {
                from,
                reason: reason.clone(),
            };
        }

        match self.get_next_state(&event) {
            Some(state) => {
                self.enter(state);
                Transition::Advanced(state)
            }
            None => Transition::Invalid {
                from: self.current_state,
                event,
            },
        }
    }

    fn enter(&mut self, state: DispatchState) {
        self.current_state = state;
        self.history.push(state);
    }

    /// Get the next state for a given event, if the transition is valid
    fn get_next_state(&self, event: &DispatchEvent) -> Option<DispatchState> {
        use DispatchEvent::*;
        use DispatchState::*;

        match (self.current_state, event) {
            (Queued, SignatureAccepted) => Some(SignatureValidated),
            (SignatureValidated, HashComputed) => Some(HashCommitted),
            (HashCommitted, TransmissionStarted) => Some(Transmitting),
            (Transmitting, PlatformAcknowledged) => Some(Acknowledged),
            (Acknowledged, ManifestBuilt) => Some(ManifestGenerated),
            (ManifestGenerated, Completed) => Some(Success),
            _ => None,
        }
    }
}

/// Check if a transition from one state to another is part of the lifecycle
pub fn is_valid_transition(from: DispatchState, to: DispatchState) -> bool {
    use DispatchState::*;

    match (from, to) {
        // Terminal states are final
        (Success | Failed, _) => false,

        // Failure can be reached from any intermediate state
        (_, Failed) => true,

        (Queued, SignatureValidated) => true,
        (SignatureValidated, HashCommitted) => true,
        (HashCommitted, Transmitting) => true,
        (Transmitting, Acknowledged) => true,
        (Acknowledged, ManifestGenerated) => true,
        (ManifestGenerated, Success) => true,

        _ => false,
    }
}
