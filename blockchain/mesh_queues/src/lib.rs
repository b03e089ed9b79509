// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded FIFO queues (capacity 10 each) feeding the round engine: one
//! carrying per-peer sensor replies, one carrying election announcements.
//! Producers never block — a full queue drops the newest message and logs a
//! warning — and consumers wait up to a caller-supplied deadline.

use std::sync::Mutex;
use std::time::Duration;

use mesh_blocks::{Mac, SensorRecord, ZERO_MAC};
use tracing::warn;

const QUEUE_CAPACITY: usize = 10;

/// The currently-elected leader MAC, all-zero until the first election.
/// Owned and written exclusively by the round engine; the dispatcher only
/// ever reads it (to answer `CHAIN_REQ`) and otherwise communicates
/// elections back to the round engine via [`ElectionQueue`], never by
/// mutating this cell directly.
pub struct LeaderCell(Mutex<Mac>);

impl LeaderCell {
    pub fn new() -> Self {
        Self(Mutex::new(ZERO_MAC))
    }

    pub fn get(&self) -> Mac {
        *self.0.lock().expect("leader cell poisoned")
    }

    pub fn set(&self, leader: Mac) {
        *self.0.lock().expect("leader cell poisoned") = leader;
    }
}

impl Default for LeaderCell {
    fn default() -> Self {
        Self::new()
    }
}

/// `{mac, leader_mac}` — an announcement that `leader_mac` is now the
/// elected leader, as observed from `mac`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElectionMessage {
    pub from: Mac,
    pub leader: Mac,
}

/// Queue of `{mac, SensorRecord}` pulse replies, consumed by the round
/// engine's per-peer collection wait.
pub struct SensorResponseQueue {
    tx: flume::Sender<(Mac, SensorRecord)>,
    rx: flume::Receiver<(Mac, SensorRecord)>,
}

impl SensorResponseQueue {
    pub fn new() -> Self {
        let (tx, rx) = flume::bounded(QUEUE_CAPACITY);
        Self { tx, rx }
    }

    /// Non-blocking push; drops the message and logs a warning if the queue
    /// is already full.
    pub fn push(&self, mac: Mac, record: SensorRecord) {
        if self.tx.try_send((mac, record)).is_err() {
            warn!(peer = %mesh_blocks::mac_to_hex(&mac), "sensor response queue full, dropping reply");
        }
    }

    /// Waits up to `deadline` for a reply from `expected_peer`. Replies from
    /// other peers arriving in the meantime are dropped in place rather than
    /// requeued — callers only ever wait for one peer at a time (§4.3 L3).
    pub async fn wait_for(&self, expected_peer: Mac, deadline: Duration) -> Option<SensorRecord> {
        let wait = async {
            loop {
                match self.rx.recv_async().await {
                    Ok((mac, record)) if mac == expected_peer => return Some(record),
                    Ok(_) => continue,
                    Err(_) => return None,
                }
            }
        };
        tokio::time::timeout(deadline, wait).await.unwrap_or(None)
    }
}

impl Default for SensorResponseQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue of election announcements, consumed by the follower path while
/// waiting for the next round's leader to be named.
pub struct ElectionQueue {
    tx: flume::Sender<ElectionMessage>,
    rx: flume::Receiver<ElectionMessage>,
}

impl ElectionQueue {
    pub fn new() -> Self {
        let (tx, rx) = flume::bounded(QUEUE_CAPACITY);
        Self { tx, rx }
    }

    /// Non-blocking push; drops the message and logs a warning if full.
    pub fn push(&self, message: ElectionMessage) {
        if self.tx.try_send(message).is_err() {
            warn!("election queue full, dropping message");
        }
    }

    /// Waits up to `deadline` for the next election message, or `None` on
    /// timeout.
    pub async fn wait_next(&self, deadline: Duration) -> Option<ElectionMessage> {
        tokio::time::timeout(deadline, self.rx.recv_async())
            .await
            .ok()
            .and_then(Result::ok)
    }
}

impl Default for ElectionQueue {
    fn default() -> Self {
        Self::new()
    }
}
