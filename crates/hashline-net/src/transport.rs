//! Transport abstraction for the reconciliation protocol.
//!
//! The transport owns connection establishment, framing, and encryption;
//! this layer only hands it envelopes and receives envelopes back.
//! Implementations may use TCP, QUIC, or any other medium.

use async_trait::async_trait;

use crate::error::{NetError, Result};
use crate::messages::{Envelope, NodeAddress};

/// Transport trait for sending and receiving reconciliation envelopes.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send an envelope to a specific peer.
    ///
    /// Returns the serialized size of the envelope on success.
    async fn send(&self, peer: &NodeAddress, envelope: Envelope) -> Result<usize>;

    /// Receive the next inbound envelope from any peer.
    ///
    /// Returns the sender's address and the envelope. Blocks until an
    /// envelope is available or the transport shuts down.
    async fn recv(&self) -> Result<(NodeAddress, Envelope)>;

    /// Fan an envelope out to every connected peer except ourselves.
    ///
    /// Best-effort: peers that disconnected mid-broadcast are skipped.
    async fn broadcast(&self, envelope: Envelope) -> Result<()>;

    /// Get the local node's address.
    fn local_address(&self) -> NodeAddress;

    /// List currently connected peers.
    async fn connected_peers(&self) -> Result<Vec<NodeAddress>>;

    /// Check if a specific peer is connected.
    async fn is_connected(&self, peer: &NodeAddress) -> bool;
}

/// A simple in-memory transport for testing and simulation.
///
/// Uses channels to simulate message passing between nodes.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::{mpsc, Mutex, RwLock};

    /// Envelope plus routing metadata.
    #[derive(Debug, Clone)]
    struct Delivery {
        from: NodeAddress,
        envelope: Envelope,
    }

    /// Serialized size of an envelope on the simulated wire.
    fn wire_size(envelope: &Envelope) -> Result<usize> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(envelope, &mut buf)
            .map_err(|e| NetError::Encoding(e.to_string()))?;
        Ok(buf.len())
    }

    /// Shared state for the in-memory network.
    ///
    /// Cheap to clone; clones refer to the same network.
    #[derive(Clone, Default)]
    pub struct MemoryNetwork {
        /// Inbound channels for each connected node.
        senders: Arc<RwLock<HashMap<NodeAddress, mpsc::Sender<Delivery>>>>,
    }

    impl MemoryNetwork {
        /// Create a new in-memory network.
        pub fn new() -> Self {
            Self::default()
        }

        /// Create a transport connected to this network.
        pub async fn create_transport(&self, address: NodeAddress) -> MemoryTransport {
            let (tx, rx) = mpsc::channel(1000);

            self.senders.write().await.insert(address, tx);

            MemoryTransport {
                address,
                network: self.clone(),
                receiver: Mutex::new(rx),
            }
        }

        /// Drop a node from the network, simulating a disconnect.
        ///
        /// Subsequent sends to the address fail and its receive loop ends.
        pub async fn disconnect(&self, address: &NodeAddress) {
            self.senders.write().await.remove(address);
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        address: NodeAddress,
        network: MemoryNetwork,
        receiver: Mutex<mpsc::Receiver<Delivery>>,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&self, peer: &NodeAddress, envelope: Envelope) -> Result<usize> {
            envelope.validate_limits().map_err(NetError::LimitExceeded)?;
            let byte_size = wire_size(&envelope)?;

            let senders = self.network.senders.read().await;
            let sender = senders
                .get(peer)
                .ok_or(NetError::PeerNotConnected(*peer))?;

            sender
                .send(Delivery {
                    from: self.address,
                    envelope,
                })
                .await
                .map_err(|_| NetError::PeerNotConnected(*peer))?;

            Ok(byte_size)
        }

        async fn recv(&self) -> Result<(NodeAddress, Envelope)> {
            let mut rx = self.receiver.lock().await;
            match rx.recv().await {
                Some(delivery) => Ok((delivery.from, delivery.envelope)),
                None => Err(NetError::Transport("channel closed".into())),
            }
        }

        async fn broadcast(&self, envelope: Envelope) -> Result<()> {
            envelope.validate_limits().map_err(NetError::LimitExceeded)?;

            let senders = self.network.senders.read().await;
            for (peer, sender) in senders.iter() {
                if peer != &self.address {
                    // Peers that vanished mid-broadcast are skipped.
                    let _ = sender
                        .send(Delivery {
                            from: self.address,
                            envelope: envelope.clone(),
                        })
                        .await;
                }
            }
            Ok(())
        }

        fn local_address(&self) -> NodeAddress {
            self.address
        }

        async fn connected_peers(&self) -> Result<Vec<NodeAddress>> {
            let senders = self.network.senders.read().await;
            Ok(senders
                .keys()
                .filter(|addr| *addr != &self.address)
                .copied()
                .collect())
        }

        async fn is_connected(&self, peer: &NodeAddress) -> bool {
            let senders = self.network.senders.read().await;
            senders.contains_key(peer)
        }
    }
}
