//! The soft gate: probationary callers only get through on clearly
//! on-topic queries.

use serde::{Deserialize, Serialize};
use tutorgate_core::knowledge::ContextChunk;

use crate::trust::TrustState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateDecision {
    Allowed,
    Blocked,
}

impl GateDecision {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Gatekeeper {
    confidence_threshold: f32,
}

impl Gatekeeper {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            confidence_threshold,
        }
    }

    /// Trusted callers are never blocked. Probationary callers are blocked
    /// unless the top chunk meets the threshold.
    pub fn should_block(&self, trust: TrustState, chunks: &[ContextChunk]) -> bool {
        match trust {
            TrustState::Trusted => false,
            TrustState::Probation => chunks
                .first()
                .is_none_or(|top| top.score < self.confidence_threshold),
        }
    }

    pub fn decide(&self, trust: TrustState, chunks: &[ContextChunk]) -> GateDecision {
        if self.should_block(trust, chunks) {
            GateDecision::Blocked
        } else {
            GateDecision::Allowed
        }
    }
}

impl Default for Gatekeeper {
    fn default() -> Self {
        Self::new(0.25)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(scores: &[f32]) -> Vec<ContextChunk> {
        scores
            .iter()
            .enumerate()
            .map(|(i, s)| ContextChunk::new(format!("chunk {i}"), *s))
            .collect()
    }

    #[test]
    fn trusted_is_never_blocked() {
        let gate = Gatekeeper::default();
        let cases: [&[f32]; 4] = [&[], &[0.0], &[0.02, 0.01], &[0.9]];
        for scores in cases {
            assert!(!gate.should_block(TrustState::Trusted, &chunks(scores)));
        }
    }

    #[test]
    fn probation_with_no_chunks_is_blocked() {
        assert!(Gatekeeper::default().should_block(TrustState::Probation, &[]));
    }

    #[test]
    fn probation_threshold_is_inclusive() {
        let gate = Gatekeeper::default();
        assert!(!gate.should_block(TrustState::Probation, &chunks(&[0.25])));
        assert!(gate.should_block(TrustState::Probation, &chunks(&[0.2499])));
        assert!(!gate.should_block(TrustState::Probation, &chunks(&[0.6, 0.1])));
    }

    #[test]
    fn only_the_first_chunk_is_considered() {
        let gate = Gatekeeper::default();
        assert!(gate.should_block(TrustState::Probation, &chunks(&[0.05, 0.9])));
    }

    #[test]
    fn decide_maps_to_enum() {
        let gate = Gatekeeper::new(0.5);
        assert_eq!(
            gate.decide(TrustState::Probation, &chunks(&[0.3])),
            GateDecision::Blocked
        );
        assert_eq!(
            gate.decide(TrustState::Probation, &chunks(&[0.5])),
            GateDecision::Allowed
        );
        assert!(GateDecision::Blocked.is_blocked());
    }
}
