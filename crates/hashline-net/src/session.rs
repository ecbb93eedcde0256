//! One outstanding pull exchange with one peer.

use hashline_core::Fingerprint;

use crate::messages::{FingerprintRequest, FingerprintResponse, NodeAddress};

/// Lifecycle of a pull session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Request constructed, waiting for the matching response.
    AwaitingResponse,
    /// Matching response arrived. Terminal.
    Completed,
    /// Transport failure or timeout. Terminal.
    Faulted,
}

/// State for one outstanding [`FingerprintRequest`] to one peer.
///
/// The session is purely reactive: the service feeds it transport events
/// and it reports the transitions. It has no clock of its own and never
/// retries; a failed pull is retried, if at all, with a fresh session.
#[derive(Debug)]
pub struct PullSession {
    peer: NodeAddress,
    token: u64,
    from_height: u64,
    state: SessionState,
}

impl PullSession {
    /// Create a session and the request envelope it will await an answer
    /// to. The session starts in [`SessionState::AwaitingResponse`].
    pub fn start(
        peer: NodeAddress,
        token: u64,
        from_height: u64,
    ) -> (Self, FingerprintRequest) {
        let session = Self {
            peer,
            token,
            from_height,
            state: SessionState::AwaitingResponse,
        };
        let request = FingerprintRequest { token, from_height };
        (session, request)
    }

    /// The peer this session is pulling from.
    pub fn peer(&self) -> &NodeAddress {
        &self.peer
    }

    /// The correlation token this session issued.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// The height the request asked from.
    pub fn from_height(&self) -> u64 {
        self.from_height
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Feed a response to the session.
    ///
    /// Completes the session and yields the fingerprints only while
    /// awaiting and only when the token matches. A mismatched token
    /// belongs to a different, possibly stale, exchange and is ignored
    /// rather than treated as an error.
    pub fn on_response(&mut self, response: FingerprintResponse) -> Option<Vec<Fingerprint>> {
        if self.state != SessionState::AwaitingResponse {
            return None;
        }
        if response.token != self.token {
            return None;
        }
        self.state = SessionState::Completed;
        Some(response.fingerprints)
    }

    /// Mark the session faulted after a transport failure or timeout.
    ///
    /// Returns whether the transition happened; terminal states are
    /// never left.
    pub fn on_transport_failure(&mut self) -> bool {
        if self.state != SessionState::AwaitingResponse {
            return false;
        }
        self.state = SessionState::Faulted;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashline_core::StateDigest;

    fn fingerprints(heights: &[u64]) -> Vec<Fingerprint> {
        heights
            .iter()
            .map(|&h| Fingerprint::new(h, StateDigest::of(&h.to_le_bytes()), None))
            .collect()
    }

    fn session() -> PullSession {
        let (session, request) = PullSession::start(NodeAddress::from_bytes([1; 32]), 42, 100);
        assert_eq!(request.token, 42);
        assert_eq!(request.from_height, 100);
        session
    }

    #[test]
    fn test_start_awaits_response() {
        let session = session();
        assert_eq!(session.state(), SessionState::AwaitingResponse);
        assert_eq!(session.token(), 42);
        assert_eq!(session.from_height(), 100);
    }

    #[test]
    fn test_matching_response_completes() {
        let mut session = session();
        let result = session.on_response(FingerprintResponse::new(42, fingerprints(&[100, 101])));

        let heights: Vec<u64> = result.unwrap().iter().map(|fp| fp.height).collect();
        assert_eq!(heights, vec![100, 101]);
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[test]
    fn test_mismatched_token_is_ignored() {
        let mut session = session();
        let result = session.on_response(FingerprintResponse::new(7, fingerprints(&[100])));

        assert!(result.is_none());
        assert_eq!(session.state(), SessionState::AwaitingResponse);
    }

    #[test]
    fn test_empty_response_still_completes() {
        let mut session = session();
        let result = session.on_response(FingerprintResponse::new(42, vec![]));

        assert_eq!(result, Some(vec![]));
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[test]
    fn test_completed_is_terminal() {
        let mut session = session();
        session.on_response(FingerprintResponse::new(42, vec![]));

        assert!(session
            .on_response(FingerprintResponse::new(42, fingerprints(&[100])))
            .is_none());
        assert!(!session.on_transport_failure());
        assert_eq!(session.state(), SessionState::Completed);
    }

    #[test]
    fn test_faulted_is_terminal() {
        let mut session = session();
        assert!(session.on_transport_failure());
        assert_eq!(session.state(), SessionState::Faulted);

        assert!(!session.on_transport_failure());
        assert!(session
            .on_response(FingerprintResponse::new(42, fingerprints(&[100])))
            .is_none());
        assert_eq!(session.state(), SessionState::Faulted);
    }
}
