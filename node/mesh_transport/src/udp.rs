// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host-side stand-in for the mesh radio: frames every datagram as
//! `sender_mac(6) | command_byte(1) | payload`, broadcasts over UDP, and
//! maintains a peer table from whatever it has heard recently. The wire
//! format of `payload` itself is untouched — command byte first, per §6 —
//! this envelope only exists to carry MAC addressing over IP.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mesh_blocks::Mac;
use tokio::net::UdpSocket;
use tracing::{debug, trace, warn};

use crate::command::Command;
use crate::traits::{MeshTransport, PeerInfo};

const ENVELOPE_HEADER_LEN: usize = 8; // 6-byte mac + 1-byte level + 1-byte command
const PEER_STALE_AFTER: Duration = Duration::from_secs(120);

struct PeerEntry {
    addr: SocketAddr,
    level: u8,
    last_seen: Instant,
}

/// UDP broadcast transport. One per node; `run()` must be spawned by the
/// caller to drive the background receive loop (mirrors how `forest`'s
/// `Libp2pService` is constructed then handed to `JoinSet::spawn`).
pub struct UdpMeshTransport {
    socket: UdpSocket,
    own_mac: Mac,
    own_level: u8,
    broadcast_addr: SocketAddr,
    peers: Mutex<HashMap<Mac, PeerEntry>>,
    inbound_tx: flume::Sender<(Mac, Vec<u8>)>,
    inbound_rx: flume::Receiver<(Mac, Vec<u8>)>,
}

impl UdpMeshTransport {
    /// Binds `bind_addr` with broadcast enabled and returns a transport
    /// ready to have its own [`UdpMeshTransport::run`] spawned.
    pub async fn bind(
        bind_addr: SocketAddr,
        broadcast_addr: SocketAddr,
        own_mac: Mac,
        own_level: u8,
    ) -> io::Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.set_broadcast(true)?;
        let (inbound_tx, inbound_rx) = flume::unbounded();
        Ok(Self {
            socket,
            own_mac,
            own_level,
            broadcast_addr,
            peers: Mutex::new(HashMap::new()),
            inbound_tx,
            inbound_rx,
        })
    }

    /// Drives the receive loop until the socket errors out. Intended to be
    /// spawned as a long-lived task alongside the round engine and
    /// dispatcher tasks.
    pub async fn run(&self) {
        let mut buf = vec![0u8; 2048];
        loop {
            let (len, from_addr) = match self.socket.recv_from(&mut buf).await {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(%err, "mesh transport socket recv failed, stopping receive loop");
                    return;
                }
            };
            if len < ENVELOPE_HEADER_LEN {
                trace!(len, "dropping undersized datagram");
                continue;
            }
            let mut mac = [0u8; 6];
            mac.copy_from_slice(&buf[0..6]);
            if mac == self.own_mac {
                continue; // broadcast loopback
            }
            let level = buf[6];
            let payload = buf[7..len].to_vec();

            {
                let mut peers = self.peers.lock().expect("peer table poisoned");
                peers.insert(
                    mac,
                    PeerEntry {
                        addr: from_addr,
                        level,
                        last_seen: Instant::now(),
                    },
                );
                peers.retain(|_, entry| entry.last_seen.elapsed() < PEER_STALE_AFTER);
            }

            debug!(peer = %mesh_blocks::mac_to_hex(&mac), bytes = payload.len(), "received datagram");
            if self.inbound_tx.send((mac, payload)).is_err() {
                return; // no receiver left, shutting down
            }
        }
    }
}

#[async_trait]
impl MeshTransport for UdpMeshTransport {
    async fn send(&self, cmd: Command, dest: Mac, payload: &[u8]) -> io::Result<()> {
        let mut datagram = Vec::with_capacity(ENVELOPE_HEADER_LEN + payload.len());
        datagram.extend_from_slice(&self.own_mac);
        datagram.push(self.own_level);
        datagram.push(cmd as u8);
        datagram.extend_from_slice(payload);

        let target = if dest == mesh_blocks::BROADCAST_MAC {
            self.broadcast_addr
        } else {
            match self.peers.lock().expect("peer table poisoned").get(&dest) {
                Some(entry) => entry.addr,
                None => {
                    warn!(peer = %mesh_blocks::mac_to_hex(&dest), "send to unknown peer, falling back to broadcast");
                    self.broadcast_addr
                }
            }
        };
        self.socket.send_to(&datagram, target).await.map(|_| ())
    }

    async fn recv(&self) -> Option<(Mac, Vec<u8>)> {
        self.inbound_rx.recv_async().await.ok()
    }

    fn get_peers(&self) -> Vec<PeerInfo> {
        self.peers
            .lock()
            .expect("peer table poisoned")
            .iter()
            .map(|(mac, entry)| PeerInfo {
                mac: *mac,
                level: entry.level,
            })
            .collect()
    }

    fn get_own_mac(&self) -> Mac {
        self.own_mac
    }

    fn get_own_level(&self) -> u8 {
        self.own_level
    }
}
