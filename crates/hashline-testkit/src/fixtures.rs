//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: in-memory nodes, recording
//! listeners, and a listener that answers pulls from a held history.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use hashline_core::{Fingerprint, StateDigest};
use hashline_net::{
    FingerprintRequest, MemoryNetwork, MemoryTransport, NodeAddress, ReconConfig, ReconListener,
    ReconService, ResponseObserver, StaticPeerDirectory, Transport,
};

/// Route `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

/// Build a linked fingerprint chain of `count` entries starting at
/// `start_height`. `tag` keeps chains from different "nodes" distinct.
pub fn fingerprint_chain(tag: u8, start_height: u64, count: usize) -> Vec<Fingerprint> {
    let mut out = Vec::with_capacity(count);
    let mut prev: Option<Fingerprint> = None;
    for i in 0..count {
        let height = start_height + i as u64;
        let digest = StateDigest::of(format!("{tag}:{height}").as_bytes());
        let fp = match &prev {
            Some(p) => p.next(digest),
            None => Fingerprint::new(height, digest, None),
        };
        out.push(fp.clone());
        prev = Some(fp);
    }
    out
}

/// Poll until `cond` holds; panics if it does not within two seconds.
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Listener that records every protocol event it sees.
#[derive(Default)]
pub struct RecordingListener {
    announcements: Mutex<Vec<(Fingerprint, NodeAddress)>>,
    requests: Mutex<Vec<(NodeAddress, FingerprintRequest)>>,
    pull_results: Mutex<Vec<(Vec<Fingerprint>, NodeAddress)>>,
    pull_failures: Mutex<Vec<(NodeAddress, String)>>,
}

impl RecordingListener {
    pub fn announcements(&self) -> Vec<(Fingerprint, NodeAddress)> {
        self.announcements.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<(NodeAddress, FingerprintRequest)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn pull_results(&self) -> Vec<(Vec<Fingerprint>, NodeAddress)> {
        self.pull_results.lock().unwrap().clone()
    }

    pub fn pull_failures(&self) -> Vec<(NodeAddress, String)> {
        self.pull_failures.lock().unwrap().clone()
    }
}

impl ReconListener for RecordingListener {
    fn on_announcement(&self, fingerprint: &Fingerprint, from: &NodeAddress) {
        self.announcements
            .lock()
            .unwrap()
            .push((fingerprint.clone(), *from));
    }

    fn on_request(&self, from: &NodeAddress, request: &FingerprintRequest) {
        self.requests.lock().unwrap().push((*from, *request));
    }

    fn on_pull_result(&self, fingerprints: &[Fingerprint], peer: &NodeAddress) {
        self.pull_results
            .lock()
            .unwrap()
            .push((fingerprints.to_vec(), *peer));
    }

    fn on_pull_failed(&self, peer: &NodeAddress, reason: &str) {
        self.pull_failures
            .lock()
            .unwrap()
            .push((*peer, reason.to_string()));
    }
}

/// Observer that records response delivery outcomes.
#[derive(Default)]
pub struct RecordingObserver {
    sent: Mutex<Vec<usize>>,
    failed: Mutex<usize>,
}

impl RecordingObserver {
    pub fn sent(&self) -> Vec<usize> {
        self.sent.lock().unwrap().clone()
    }

    pub fn failed(&self) -> usize {
        *self.failed.lock().unwrap()
    }
}

impl ResponseObserver for RecordingObserver {
    fn on_sent(&self, byte_size: usize) {
        self.sent.lock().unwrap().push(byte_size);
    }

    fn on_send_failed(&self) {
        *self.failed.lock().unwrap() += 1;
    }
}

/// Listener that answers fingerprint requests from a held history,
/// the way a real node would serve its committed fingerprints.
pub struct HistoryResponder<T: Transport> {
    history: Mutex<Vec<Fingerprint>>,
    service: Mutex<Weak<ReconService<T>>>,
}

impl<T: Transport> HistoryResponder<T> {
    pub fn new(history: Vec<Fingerprint>) -> Arc<Self> {
        Arc::new(Self {
            history: Mutex::new(history),
            service: Mutex::new(Weak::new()),
        })
    }

    /// Wire the responder to the service it answers through.
    pub fn bind(&self, service: &Arc<ReconService<T>>) {
        *self.service.lock().unwrap() = Arc::downgrade(service);
    }

    /// Append a newly "committed" fingerprint to the history.
    pub fn commit(&self, fingerprint: Fingerprint) {
        self.history.lock().unwrap().push(fingerprint);
    }
}

impl<T: Transport> ReconListener for HistoryResponder<T> {
    fn on_announcement(&self, _fingerprint: &Fingerprint, _from: &NodeAddress) {}

    fn on_request(&self, from: &NodeAddress, request: &FingerprintRequest) {
        let Some(service) = self.service.lock().unwrap().upgrade() else {
            return;
        };
        let answer: Vec<Fingerprint> = self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|fp| fp.height >= request.from_height)
            .cloned()
            .collect();
        service.send_response(*from, request.token, answer);
    }

    fn on_pull_result(&self, _fingerprints: &[Fingerprint], _peer: &NodeAddress) {}
}

/// One in-memory node: transport, service, and a recording listener.
pub struct TestNode {
    pub address: NodeAddress,
    pub transport: Arc<MemoryTransport>,
    pub service: Arc<ReconService<MemoryTransport>>,
    pub listener: Arc<RecordingListener>,
}

impl TestNode {
    /// Join the network with a deterministic address derived from `seed`.
    pub async fn join(
        network: &MemoryNetwork,
        seed: u8,
        directory: StaticPeerDirectory,
        config: ReconConfig,
    ) -> Self {
        let address = NodeAddress::from_bytes([seed; 32]);
        let transport = Arc::new(network.create_transport(address).await);
        let service = Arc::new(ReconService::new(
            Arc::clone(&transport),
            Arc::new(directory),
            config,
        ));
        let listener: Arc<RecordingListener> = Arc::default();
        service.add_listener(listener.clone());
        service.register_for_transport_events();

        Self {
            address,
            transport,
            service,
            listener,
        }
    }

    /// Join with default config and an empty peer directory.
    pub async fn join_default(network: &MemoryNetwork, seed: u8) -> Self {
        Self::join(
            network,
            seed,
            StaticPeerDirectory::default(),
            ReconConfig::default(),
        )
        .await
    }
}
