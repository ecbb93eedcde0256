//! The reconciliation service: correlation, dispatch, and fan-out.
//!
//! Owns the table of outstanding pull sessions (at most one per peer),
//! classifies inbound envelopes, and fans protocol events out to
//! registered consumers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use hashline_core::Fingerprint;

use crate::messages::{
    Envelope, FingerprintAnnouncement, FingerprintRequest, FingerprintResponse, NodeAddress,
};
use crate::peers::PeerDirectory;
use crate::session::PullSession;
use crate::transport::Transport;

/// Consumer of reconciliation protocol events.
///
/// Callbacks run on the service's dispatch task, one at a time, so
/// implementations need no synchronization of their own. Registering or
/// removing listeners from inside a callback is safe.
pub trait ReconListener: Send + Sync {
    /// A peer announced a newly committed fingerprint.
    fn on_announcement(&self, fingerprint: &Fingerprint, from: &NodeAddress);

    /// A peer asked for our fingerprints from a height onward.
    ///
    /// Listeners decide what to answer and reply via
    /// [`ReconService::send_response`].
    fn on_request(&self, from: &NodeAddress, request: &FingerprintRequest);

    /// A pull this node initiated completed with the peer's fingerprints.
    fn on_pull_result(&self, fingerprints: &[Fingerprint], peer: &NodeAddress);

    /// A pull this node initiated failed.
    ///
    /// Default: ignore. Override to drive retry or backoff policy.
    fn on_pull_failed(&self, _peer: &NodeAddress, _reason: &str) {}
}

/// Observer of delivery outcomes for responses this node sent.
pub trait ResponseObserver: Send + Sync {
    /// The response reached the transport; `byte_size` is its serialized
    /// size.
    fn on_sent(&self, byte_size: usize);

    /// The transport failed to deliver the response.
    fn on_send_failed(&self);
}

/// Tuning for the reconciliation service.
#[derive(Debug, Clone)]
pub struct ReconConfig {
    /// How long a pull may await its response before it is faulted.
    ///
    /// The transport is not required to signal peer disconnects, so this
    /// watchdog is what reclaims sessions whose peer went silent.
    pub response_timeout: Duration,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(120),
        }
    }
}

/// Everything fanned out to consumers, marshaled through one channel so
/// listener code runs on a single task.
enum Notification {
    Announcement {
        fingerprint: Fingerprint,
        from: NodeAddress,
    },
    Request {
        from: NodeAddress,
        request: FingerprintRequest,
    },
    PullResult {
        fingerprints: Vec<Fingerprint>,
        peer: NodeAddress,
    },
    PullFailed {
        peer: NodeAddress,
        reason: String,
    },
    ResponseSent {
        byte_size: usize,
    },
    ResponseSendFailed,
}

/// Listener and observer registrations, shared with the dispatch task.
#[derive(Default)]
struct Registries {
    listeners: Mutex<Vec<Arc<dyn ReconListener>>>,
    response_observers: Mutex<Vec<Arc<dyn ResponseObserver>>>,
}

impl Registries {
    /// Snapshot so registration during a notification pass is safe.
    fn listeners(&self) -> Vec<Arc<dyn ReconListener>> {
        self.listeners
            .lock()
            .expect("listener registry poisoned")
            .clone()
    }

    fn response_observers(&self) -> Vec<Arc<dyn ResponseObserver>> {
        self.response_observers
            .lock()
            .expect("observer registry poisoned")
            .clone()
    }
}

/// The reconciliation service.
///
/// The service is a cheap handle: clones share the same session table,
/// registries, and transport, so it can be captured by spawned tasks and
/// handed to listeners freely. Created with [`ReconService::new`] inside
/// a Tokio runtime; the constructor spawns the notification dispatch
/// task. Inbound envelopes flow in via
/// [`ReconService::register_for_transport_events`] or, for callers that
/// drive the transport themselves, [`ReconService::on_envelope`].
pub struct ReconService<T: Transport> {
    transport: Arc<T>,
    peers: Arc<dyn PeerDirectory>,
    config: ReconConfig,
    sessions: Arc<Mutex<HashMap<NodeAddress, PullSession>>>,
    registries: Arc<Registries>,
    notify_tx: mpsc::UnboundedSender<Notification>,
    registered: Arc<AtomicBool>,
}

impl<T: Transport> Clone for ReconService<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            peers: Arc::clone(&self.peers),
            config: self.config.clone(),
            sessions: Arc::clone(&self.sessions),
            registries: Arc::clone(&self.registries),
            notify_tx: self.notify_tx.clone(),
            registered: Arc::clone(&self.registered),
        }
    }
}

impl<T: Transport> ReconService<T> {
    /// Create a service and spawn its notification dispatch task.
    pub fn new(transport: Arc<T>, peers: Arc<dyn PeerDirectory>, config: ReconConfig) -> Self {
        let registries = Arc::new(Registries::default());
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        tokio::spawn(dispatch_notifications(Arc::clone(&registries), notify_rx));

        Self {
            transport,
            peers,
            config,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            registries,
            notify_tx,
            registered: Arc::new(AtomicBool::new(false)),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Inbound dispatch
    // ─────────────────────────────────────────────────────────────────────

    /// Start routing inbound envelopes from the transport to this service.
    ///
    /// Idempotent: calling it again never duplicates delivery.
    pub fn register_for_transport_events(&self) {
        if self.registered.swap(true, Ordering::SeqCst) {
            return;
        }

        let service = self.clone();
        tokio::spawn(async move {
            loop {
                match service.transport.recv().await {
                    Ok((from, envelope)) => service.on_envelope(envelope, from),
                    // Our own transport shut down; nothing left to route.
                    Err(_) => break,
                }
            }
        });
    }

    /// Classify and dispatch one inbound envelope.
    ///
    /// Announcements and requests fan out to protocol-event listeners;
    /// responses route to the session holding their token. Anything else
    /// on the shared transport is not ours and is ignored.
    pub fn on_envelope(&self, envelope: Envelope, from: NodeAddress) {
        match envelope {
            Envelope::Announcement(announcement) => {
                debug!(peer = %from, height = announcement.fingerprint.height,
                    "received fingerprint announcement");
                self.notify(Notification::Announcement {
                    fingerprint: announcement.fingerprint,
                    from,
                });
            }
            Envelope::Request(request) => {
                debug!(peer = %from, from_height = request.from_height,
                    "received fingerprint request");
                self.notify(Notification::Request { from, request });
            }
            Envelope::Response(response) => self.on_response(response, from),
            Envelope::Keepalive { .. } => {}
        }
    }

    fn on_response(&self, response: FingerprintResponse, from: NodeAddress) {
        // A response only counts if the sender still owns a session and
        // the token matches it; everything else is a stale echo of a
        // superseded or reset exchange and is dropped without comment.
        let Some(mut session) = self.take_session(&from, response.token) else {
            debug!(peer = %from, token = response.token, "dropping unmatched response");
            return;
        };

        if let Some(fingerprints) = session.on_response(response) {
            self.notify(Notification::PullResult {
                fingerprints,
                peer: from,
            });
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Outbound operations
    // ─────────────────────────────────────────────────────────────────────

    /// Announce a newly committed fingerprint to every connected peer.
    ///
    /// Fire-and-forget; no acknowledgment is expected or tracked.
    pub fn broadcast_fingerprint(&self, fingerprint: Fingerprint) {
        let envelope = Envelope::Announcement(FingerprintAnnouncement { fingerprint });
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            if let Err(e) = transport.broadcast(envelope).await {
                warn!(error = %e, "fingerprint broadcast failed");
            }
        });
    }

    /// Pull a peer's fingerprints from `from_height` onward.
    ///
    /// At most one pull per peer is outstanding; a newer pull supersedes
    /// the older one, whose eventual answer no longer matches any
    /// registered token and is discarded when it arrives.
    pub fn pull_from(&self, peer: NodeAddress, from_height: u64) {
        let request = {
            let mut sessions = self.sessions();
            let token = fresh_token(&sessions);
            let (session, request) = PullSession::start(peer, token, from_height);
            if sessions.insert(peer, session).is_some() {
                debug!(peer = %peer, "superseding outstanding pull");
            }
            request
        };

        debug!(peer = %peer, from_height, token = request.token, "requesting fingerprints");

        let service = self.clone();
        tokio::spawn(async move {
            let token = request.token;
            if let Err(e) = service
                .transport
                .send(&peer, Envelope::Request(request))
                .await
            {
                service.fault_session(&peer, token, &format!("send failed: {e}"));
                return;
            }

            // The transport may never signal a disconnect, so a watchdog
            // backs every pull. Completion or supersession makes it a
            // no-op: the token no longer matches anything.
            tokio::time::sleep(service.config.response_timeout).await;
            service.fault_session(&peer, token, "timed out awaiting response");
        });
    }

    /// Pull from every connected peer classified as authoritative.
    pub fn pull_from_all_authoritative_peers(&self, from_height: u64) {
        let service = self.clone();
        tokio::spawn(async move {
            let peers = match service.transport.connected_peers().await {
                Ok(peers) => peers,
                Err(e) => {
                    warn!(error = %e, "could not enumerate connected peers");
                    return;
                }
            };
            for peer in peers {
                if service.peers.is_authoritative(&peer) {
                    service.pull_from(peer, from_height);
                }
            }
        });
    }

    /// Answer a peer's fingerprint request.
    ///
    /// Fire-and-forget from the caller's perspective: the delivery
    /// outcome reaches the response observers asynchronously, success
    /// carrying the serialized byte size.
    pub fn send_response(&self, to: NodeAddress, token: u64, fingerprints: Vec<Fingerprint>) {
        let response = FingerprintResponse::new(token, fingerprints);
        debug!(peer = %to, count = response.fingerprints.len(), "sending fingerprint response");

        let transport = Arc::clone(&self.transport);
        let notify_tx = self.notify_tx.clone();
        tokio::spawn(async move {
            match transport.send(&to, Envelope::Response(response)).await {
                Ok(byte_size) => {
                    let _ = notify_tx.send(Notification::ResponseSent { byte_size });
                }
                Err(e) => {
                    warn!(peer = %to, error = %e, "failed to send fingerprint response");
                    let _ = notify_tx.send(Notification::ResponseSendFailed);
                }
            }
        });
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session table
    // ─────────────────────────────────────────────────────────────────────

    /// Drop every outstanding pull without notifying anyone.
    ///
    /// Used on topology resets, e.g. a local reconnection. A response
    /// that later arrives for a cleared peer finds no entry and is
    /// dropped.
    pub fn reset_sessions(&self) {
        self.sessions().clear();
    }

    /// Whether a pull to `peer` is currently outstanding.
    pub fn has_outstanding_pull(&self, peer: &NodeAddress) -> bool {
        self.sessions().contains_key(peer)
    }

    /// The token of the outstanding pull to `peer`, if any.
    pub fn outstanding_pull_token(&self, peer: &NodeAddress) -> Option<u64> {
        self.sessions().get(peer).map(|s| s.token())
    }

    /// Whether the peer directory classifies `peer` as authoritative.
    pub fn is_authoritative(&self, peer: &NodeAddress) -> bool {
        self.peers.is_authoritative(peer)
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<NodeAddress, PullSession>> {
        self.sessions.lock().expect("session table poisoned")
    }

    /// The single gate through which sessions leave the table: removes
    /// the entry for `peer` only if it carries `token`. Both terminal
    /// paths (response and fault) pass through here, so a stale watchdog
    /// or a superseded exchange can never evict its successor.
    fn take_session(&self, peer: &NodeAddress, token: u64) -> Option<PullSession> {
        let mut sessions = self.sessions();
        match sessions.get(peer) {
            Some(session) if session.token() == token => sessions.remove(peer),
            _ => None,
        }
    }

    fn fault_session(&self, peer: &NodeAddress, token: u64, reason: &str) {
        let Some(mut session) = self.take_session(peer, token) else {
            return;
        };
        session.on_transport_failure();

        warn!(peer = %peer, reason, "fingerprint pull failed");
        self.notify(Notification::PullFailed {
            peer: *peer,
            reason: reason.to_string(),
        });
    }

    // ─────────────────────────────────────────────────────────────────────
    // Listener bookkeeping
    // ─────────────────────────────────────────────────────────────────────

    /// Register a protocol-event listener.
    pub fn add_listener(&self, listener: Arc<dyn ReconListener>) {
        self.registries
            .listeners
            .lock()
            .expect("listener registry poisoned")
            .push(listener);
    }

    /// Remove a previously registered protocol-event listener.
    pub fn remove_listener(&self, listener: &Arc<dyn ReconListener>) {
        self.registries
            .listeners
            .lock()
            .expect("listener registry poisoned")
            .retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Register an observer of response delivery outcomes.
    pub fn add_response_observer(&self, observer: Arc<dyn ResponseObserver>) {
        self.registries
            .response_observers
            .lock()
            .expect("observer registry poisoned")
            .push(observer);
    }

    /// Remove a previously registered response observer.
    pub fn remove_response_observer(&self, observer: &Arc<dyn ResponseObserver>) {
        self.registries
            .response_observers
            .lock()
            .expect("observer registry poisoned")
            .retain(|o| !Arc::ptr_eq(o, observer));
    }

    fn notify(&self, notification: Notification) {
        // Failure means the dispatch task is gone, i.e. we are shutting
        // down; late notifications have nowhere to go.
        let _ = self.notify_tx.send(notification);
    }
}

/// Pick a token no outstanding session is using.
fn fresh_token(sessions: &HashMap<NodeAddress, PullSession>) -> u64 {
    loop {
        let token = rand::random::<u64>();
        if sessions.values().all(|s| s.token() != token) {
            return token;
        }
    }
}

/// Drains the notification queue on a single task so listener code never
/// runs concurrently with itself.
async fn dispatch_notifications(
    registries: Arc<Registries>,
    mut rx: mpsc::UnboundedReceiver<Notification>,
) {
    while let Some(notification) = rx.recv().await {
        match notification {
            Notification::Announcement { fingerprint, from } => {
                for listener in registries.listeners() {
                    listener.on_announcement(&fingerprint, &from);
                }
            }
            Notification::Request { from, request } => {
                for listener in registries.listeners() {
                    listener.on_request(&from, &request);
                }
            }
            Notification::PullResult { fingerprints, peer } => {
                for listener in registries.listeners() {
                    listener.on_pull_result(&fingerprints, &peer);
                }
            }
            Notification::PullFailed { peer, reason } => {
                for listener in registries.listeners() {
                    listener.on_pull_failed(&peer, &reason);
                }
            }
            Notification::ResponseSent { byte_size } => {
                for observer in registries.response_observers() {
                    observer.on_sent(byte_size);
                }
            }
            Notification::ResponseSendFailed => {
                for observer in registries.response_observers() {
                    observer.on_send_failed();
                }
            }
        }
    }
}
