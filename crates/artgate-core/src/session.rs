//! Gate session state machine.
//!
//! Tracks the verifier's lifecycle from startup through authentication.
//! The session itself is pure state; the engine that drives it owns the
//! camera and extractor. A scan trigger in any state other than Ready
//! is ignored, so no two verification attempts ever overlap.

use crate::types::VerificationAttempt;

/// Verifier lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Waiting for a live frame source.
    Idle,
    /// Frame source available; scans may be triggered.
    Ready,
    /// One scan is in flight.
    Verifying,
    /// Terminal: a scan was accepted and the capture device released.
    Authenticated,
    /// Terminal for this session: device permission failure or a
    /// deployment mismatch. Requires external intervention.
    Denied,
}

impl GateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateState::Idle => "idle",
            GateState::Ready => "ready",
            GateState::Verifying => "verifying",
            GateState::Authenticated => "authenticated",
            GateState::Denied => "denied",
        }
    }
}

/// Result of asking the session to start a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStart {
    Started,
    /// A scan is already in flight; this trigger is a no-op.
    AlreadyVerifying,
    /// The session is not in Ready (still idle, denied, or done).
    NotReady,
}

/// One verifier session: threshold plus lifecycle state.
#[derive(Debug)]
pub struct GateSession {
    threshold: f32,
    state: GateState,
    last_similarity: Option<f32>,
}

impl GateSession {
    /// A fresh session starts Idle; the caller has already loaded the
    /// extractor and reference (startup failures never construct one).
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            state: GateState::Idle,
            last_similarity: None,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Similarity score of the most recent completed scan, if any.
    pub fn last_similarity(&self) -> Option<f32> {
        self.last_similarity
    }

    /// The frame source came up: Idle -> Ready.
    pub fn frame_source_ready(&mut self) {
        if self.state == GateState::Idle {
            self.state = GateState::Ready;
            tracing::info!("gate ready for scans");
        }
    }

    /// Permission or deployment failure: dead-end until external retry.
    pub fn deny(&mut self) {
        tracing::warn!(from = self.state.as_str(), "gate session denied");
        self.state = GateState::Denied;
    }

    /// Try to start a scan. Only Ready transitions to Verifying.
    pub fn begin_scan(&mut self) -> ScanStart {
        match self.state {
            GateState::Ready => {
                self.state = GateState::Verifying;
                ScanStart::Started
            }
            GateState::Verifying => ScanStart::AlreadyVerifying,
            _ => ScanStart::NotReady,
        }
    }

    /// Record a completed attempt. Acceptance is terminal; rejection
    /// returns to Ready so the user can retry with the score in hand.
    pub fn complete_scan(&mut self, attempt: &VerificationAttempt) -> GateState {
        debug_assert_eq!(self.state, GateState::Verifying);
        self.last_similarity = Some(attempt.similarity);
        self.state = if attempt.accepted() {
            GateState::Authenticated
        } else {
            GateState::Ready
        };
        self.state
    }

    /// A recoverable error interrupted the scan: back to Ready, capture
    /// resource stays held for retry.
    pub fn abort_scan(&mut self) {
        if self.state == GateState::Verifying {
            self.state = GateState::Ready;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VerificationAttempt;

    fn ready_session() -> GateSession {
        let mut s = GateSession::new(0.70);
        s.frame_source_ready();
        s
    }

    #[test]
    fn test_starts_idle_and_becomes_ready() {
        let mut s = GateSession::new(0.70);
        assert_eq!(s.state(), GateState::Idle);
        assert_eq!(s.begin_scan(), ScanStart::NotReady);
        s.frame_source_ready();
        assert_eq!(s.state(), GateState::Ready);
    }

    #[test]
    fn test_second_scan_while_verifying_is_ignored() {
        let mut s = ready_session();
        assert_eq!(s.begin_scan(), ScanStart::Started);
        // Second trigger while in flight: no-op, never a second attempt.
        assert_eq!(s.begin_scan(), ScanStart::AlreadyVerifying);
        assert_eq!(s.state(), GateState::Verifying);
    }

    #[test]
    fn test_rejection_returns_to_ready_with_score() {
        let mut s = ready_session();
        s.begin_scan();
        let attempt = VerificationAttempt::from_similarity(0.42, 0.70);
        assert_eq!(s.complete_scan(&attempt), GateState::Ready);
        assert_eq!(s.last_similarity(), Some(0.42));
        // Retry is possible
        assert_eq!(s.begin_scan(), ScanStart::Started);
    }

    #[test]
    fn test_acceptance_is_terminal() {
        let mut s = ready_session();
        s.begin_scan();
        let attempt = VerificationAttempt::from_similarity(0.91, 0.70);
        assert_eq!(s.complete_scan(&attempt), GateState::Authenticated);
        assert_eq!(s.begin_scan(), ScanStart::NotReady);
    }

    #[test]
    fn test_denied_is_terminal() {
        let mut s = GateSession::new(0.70);
        s.deny();
        assert_eq!(s.state(), GateState::Denied);
        assert_eq!(s.begin_scan(), ScanStart::NotReady);
        // A late frame source cannot resurrect a denied session.
        s.frame_source_ready();
        assert_eq!(s.state(), GateState::Denied);
    }

    #[test]
    fn test_abort_returns_to_ready() {
        let mut s = ready_session();
        s.begin_scan();
        s.abort_scan();
        assert_eq!(s.state(), GateState::Ready);
        assert_eq!(s.last_similarity(), None);
    }
}
