// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io;

use async_trait::async_trait;
use mesh_blocks::Mac;

use crate::command::Command;

/// A peer as seen in a `get_peers()` snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    pub mac: Mac,
    /// Hop distance from the root node. Only consulted to gate root-style
    /// election retries (§4.3 F3); this core never trusts it for anything
    /// safety-relevant.
    pub level: u8,
}

/// The mesh radio/transport contract the round engine and receive dispatcher
/// depend on. The actual physical layer — wireless bring-up, network
/// attach, credential loading — is an external collaborator; this trait is
/// the entire surface the core ever touches.
#[async_trait]
pub trait MeshTransport: Send + Sync {
    /// Best-effort send; `dest == `[`mesh_blocks::BROADCAST_MAC`] broadcasts.
    /// Returns success/failure of the local send call only — no delivery
    /// guarantee.
    async fn send(&self, cmd: Command, dest: Mac, payload: &[u8]) -> io::Result<()>;

    /// Blocks until the next inbound datagram, returning its sender and its
    /// raw bytes (command byte first, exactly as received — see §6).
    async fn recv(&self) -> Option<(Mac, Vec<u8>)>;

    /// Snapshot of currently known peers, excluding self. An empty result
    /// means the mesh has not yet formed.
    fn get_peers(&self) -> Vec<PeerInfo>;

    fn get_own_mac(&self) -> Mac;

    /// 0 or 1 means "root-eligible"; only used to gate election retries.
    fn get_own_level(&self) -> u8;
}

/// The on-demand temperature/humidity reading contract. Each call may be
/// synchronous and should complete in practice well under the round
/// engine's timeouts; implementations may cache for a short window.
pub trait SensorSource: Send + Sync {
    fn read_temperature(&self) -> f32;
    fn read_humidity(&self) -> f32;
}

/// The optional external controller surface (`READ_LEDGER`,
/// `RESET_BLOCKCHAIN`), read as plain-text lines over a local socket or
/// equivalent.
pub trait CommandChannel: Send + Sync {
    /// Non-blocking: returns the next queued command line, if any.
    fn try_recv_line(&self) -> Option<String>;
}
