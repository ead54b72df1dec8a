//! Trust classification.
//!
//! A caller starts on probation and becomes trusted once the assistant has
//! delivered real content in the session. Only the most recent assistant
//! turn is inspected, so a later rejection puts the caller back on probation.

use serde::{Deserialize, Serialize};
use tutorgate_core::message::{Message, Role, TurnKind};

/// Whether the gate applies to this caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustState {
    Probation,
    Trusted,
}

impl TrustState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Probation => "probation",
            Self::Trusted => "trusted",
        }
    }
}

impl std::fmt::Display for TrustState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derives a [`TrustState`] from prior turns.
#[derive(Debug, Clone)]
pub struct TrustClassifier {
    welcome_message: String,
    rejection_message: String,
    ratchet: bool,
}

impl TrustClassifier {
    pub fn new(welcome_message: impl Into<String>, rejection_message: impl Into<String>) -> Self {
        Self {
            welcome_message: welcome_message.into(),
            rejection_message: rejection_message.into(),
            ratchet: true,
        }
    }

    /// With the ratchet off every caller stays on probation.
    pub fn with_ratchet(mut self, enabled: bool) -> Self {
        self.ratchet = enabled;
        self
    }

    /// Classify from `history`: every turn before the one being answered.
    ///
    /// A `kind` marker on the last assistant turn wins; without one the
    /// turn text is compared against the welcome and rejection literals.
    pub fn classify(&self, history: &[Message]) -> TrustState {
        if !self.ratchet {
            return TrustState::Probation;
        }

        let Some(last) = history.iter().rev().find(|m| m.role == Role::Assistant) else {
            return TrustState::Probation;
        };

        match last.kind {
            Some(TurnKind::Welcome | TurnKind::Rejection) => TrustState::Probation,
            Some(TurnKind::Content) => TrustState::Trusted,
            None if last.content.contains(&self.rejection_message) => TrustState::Probation,
            None if last.content == self.welcome_message => TrustState::Probation,
            None => TrustState::Trusted,
        }
    }
}
