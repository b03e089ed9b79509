// SPDX-License-Identifier: MIT OR Apache-2.0

//! The leader/follower round loop (§4.3). One [`RoundEngine`] runs as a
//! single long-lived task per node; it owns no network socket directly,
//! only the abstract [`MeshTransport`]/[`SensorSource`] collaborators and
//! the shared queues/ledger the dispatcher also touches.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use mesh_blocks::{format_pop_proof, Block, SensorRecord, BROADCAST_MAC, ZERO_MAC};
use mesh_ledger::LedgerStore;
use mesh_queues::{ElectionQueue, LeaderCell, SensorResponseQueue};
use mesh_transport::{Command, MeshTransport, PeerInfo, SensorSource};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::timing::{
    T_DISCOVERY_WAIT, T_ELECTION_WAIT, T_EMPTY_MESH_RETRY, T_PROPAGATION, T_PULSE_TIMEOUT, T_ROUND,
};

pub struct RoundEngine {
    transport: Arc<dyn MeshTransport>,
    sensor: Arc<dyn SensorSource>,
    ledger: Arc<LedgerStore>,
    sensor_queue: Arc<SensorResponseQueue>,
    election_queue: Arc<ElectionQueue>,
    leader: Arc<LeaderCell>,
}

impl RoundEngine {
    pub fn new(
        transport: Arc<dyn MeshTransport>,
        sensor: Arc<dyn SensorSource>,
        ledger: Arc<LedgerStore>,
        sensor_queue: Arc<SensorResponseQueue>,
        election_queue: Arc<ElectionQueue>,
        leader: Arc<LeaderCell>,
    ) -> Self {
        Self {
            transport,
            sensor,
            ledger,
            sensor_queue,
            election_queue,
            leader,
        }
    }

    /// Runs rounds forever until `shutdown` fires, mirroring the teacher's
    /// `ChainMuxer`/service-task shape: a `select!` between the unit of
    /// work and a shutdown signal, rather than an unconditional infinite
    /// loop.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = self.round_once() => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("round engine shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// One full iteration of the outer loop in §4.3: bootstrap window, role
    /// branch, then the leader or follower path.
    pub async fn round_once(&self) {
        let round_start = Instant::now();
        let own_mac = self.transport.get_own_mac();
        let peers = self.transport.get_peers();

        if peers.is_empty() && self.leader.get() == ZERO_MAC {
            debug!("mesh not yet formed, waiting before bootstrapping as singleton leader");
            tokio::time::sleep(T_EMPTY_MESH_RETRY).await;
            self.leader.set(own_mac);
        }

        if self.leader.get() == own_mac {
            self.run_leader(&peers, round_start).await;
        } else {
            self.run_follower().await;
        }
    }

    async fn run_leader(&self, peers: &[PeerInfo], round_start: Instant) {
        let own_mac = self.transport.get_own_mac();
        let now = unix_timestamp();

        let last = self.ledger.get_last();
        let (block_num, prev_hash) = match &last {
            Some(tail) => (tail.block_num + 1, tail.hash),
            None => (0, [0u8; 32]),
        };
        let mut block = Block::new(block_num, now, prev_hash);

        let local_reading = SensorRecord::new(own_mac, now, self.sensor.read_temperature(), self.sensor.read_humidity());
        block.push_sensor(local_reading);

        for peer in peers.iter().filter(|p| p.mac != own_mac) {
            if let Err(err) = self.transport.send(Command::Pulse, peer.mac, &[]).await {
                warn!(peer = %mesh_blocks::mac_to_hex(&peer.mac), %err, "pulse send failed, skipping peer");
                continue;
            }
            match self.sensor_queue.wait_for(peer.mac, T_PULSE_TIMEOUT).await {
                Some(record) => block.push_sensor(record),
                None => debug!(peer = %mesh_blocks::mac_to_hex(&peer.mac), "pulse timed out, skipping peer"),
            }
        }

        let nonce: u32 = rand::thread_rng().gen();
        block.pop_proof = format_pop_proof(&own_mac, now, nonce);
        block.compute_hash();

        let sealed = self.ledger.append(block);
        info!(block_num = sealed.block_num, sensors = sealed.num_sensor_readings(), "sealed block");

        if let Err(err) = self
            .transport
            .send(Command::NewBlock, BROADCAST_MAC, &sealed.serialize_for_wire())
            .await
        {
            warn!(%err, "new_block broadcast failed");
        }

        tokio::time::sleep(T_PROPAGATION).await;

        let refreshed_peers = self.transport.get_peers();
        let next_leader = pick_random_leader(own_mac, &refreshed_peers);
        self.leader.set(next_leader);
        if let Err(err) = self
            .transport
            .send(Command::Election, BROADCAST_MAC, &next_leader)
            .await
        {
            warn!(%err, "election broadcast failed");
        }

        sleep_to_round_boundary(round_start).await;
    }

    async fn run_follower(&self) {
        let own_mac = self.transport.get_own_mac();

        if let Some(msg) = self.election_queue.wait_next(T_ELECTION_WAIT).await {
            self.leader.set(msg.leader);
            return;
        }

        if self.leader.get() == ZERO_MAC {
            self.leader.set(own_mac);
        }
        let candidate = self.leader.get();
        if let Err(err) = self
            .transport
            .send(Command::Election, BROADCAST_MAC, &candidate)
            .await
        {
            warn!(%err, "discovery election broadcast failed");
        }

        tokio::time::sleep(T_DISCOVERY_WAIT).await;
        if let Some(msg) = self.election_queue.wait_next(T_DISCOVERY_WAIT).await {
            self.leader.set(msg.leader);
            return;
        }

        if self.transport.get_own_level() <= 1 {
            let peers = self.transport.get_peers();
            let next = pick_random_leader(own_mac, &peers);
            self.leader.set(next);
            if let Err(err) = self
                .transport
                .send(Command::Election, BROADCAST_MAC, &next)
                .await
            {
                warn!(%err, "root-eligible rediscovery election broadcast failed");
            }
        }
    }
}

fn pick_random_leader(own_mac: mesh_blocks::Mac, peers: &[PeerInfo]) -> mesh_blocks::Mac {
    let mut candidates: Vec<mesh_blocks::Mac> = peers.iter().map(|p| p.mac).collect();
    candidates.push(own_mac);
    let idx = rand::thread_rng().gen_range(0..candidates.len());
    candidates[idx]
}

async fn sleep_to_round_boundary(round_start: Instant) {
    let elapsed = round_start.elapsed();
    if let Some(remaining) = T_ROUND.checked_sub(elapsed) {
        tokio::time::sleep(remaining).await;
    }
}

fn unix_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs() as u32
}
