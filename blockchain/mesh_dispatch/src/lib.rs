// SPDX-License-Identifier: MIT OR Apache-2.0

//! The receive dispatcher: a synchronous state machine over the command
//! table (§4.4), invoked once per inbound datagram from the transport's
//! receive loop. It never calls `.await` or sleeps — any reply the protocol
//! owes the network comes back as a [`DispatchAction`] for the caller to
//! hand to the transport.

use std::time::{SystemTime, UNIX_EPOCH};

use mesh_blocks::{Block, Mac, SensorRecord, ZERO_MAC};
use mesh_ledger::LedgerStore;
use mesh_queues::{ElectionMessage, ElectionQueue, LeaderCell, SensorResponseQueue};
use mesh_transport::{Command, SensorSource};
use tracing::{debug, warn};

const SENSOR_DATA_PAYLOAD_LEN: usize = 4 + 4 + 4; // temperature, humidity, timestamp
const ELECTION_PAYLOAD_LEN: usize = 6;
const REQUEST_SPECIFIC_BLOCK_PAYLOAD_LEN: usize = 4;

/// A reply the dispatcher wants sent on the wire. The dispatcher never
/// sends directly — the caller (the task draining the transport's receive
/// stream) performs the actual `transport.send(...).await`.
#[derive(Clone, Debug, PartialEq)]
pub struct DispatchAction {
    pub cmd: Command,
    pub dest: Mac,
    pub payload: Vec<u8>,
}

impl DispatchAction {
    fn broadcast(cmd: Command, payload: Vec<u8>) -> Self {
        Self {
            cmd,
            dest: mesh_blocks::BROADCAST_MAC,
            payload,
        }
    }
}

/// Everything the dispatcher needs, gathered in one place so the caller
/// constructs it once per node and passes the same reference into every
/// `dispatch` call.
pub struct DispatchContext<'a> {
    pub ledger: &'a LedgerStore,
    pub sensor_queue: &'a SensorResponseQueue,
    pub election_queue: &'a ElectionQueue,
    pub leader: &'a LeaderCell,
    pub sensor: &'a dyn SensorSource,
    pub own_level: u8,
    pub own_mac: Mac,
}

/// Handles one inbound `(peer_mac, payload)` datagram. `payload[0]` is the
/// command byte; the remainder is command-specific. Zero-length payloads
/// are dropped silently, per §4.4.
pub fn dispatch(peer: Mac, payload: &[u8], ctx: &DispatchContext<'_>) -> Vec<DispatchAction> {
    if payload.is_empty() {
        return Vec::new();
    }
    let Ok(cmd) = Command::try_from(payload[0]) else {
        warn!(peer = %mesh_blocks::mac_to_hex(&peer), byte = payload[0], "dropping datagram with unrecognized command byte");
        return Vec::new();
    };
    let body = &payload[1..];

    match cmd {
        Command::Ack => {
            debug!(peer = %mesh_blocks::mac_to_hex(&peer), "ack");
            Vec::new()
        }
        Command::Pulse => handle_pulse(ctx),
        Command::ChainReq => handle_chain_req(peer, ctx),
        Command::ChainResp => {
            debug!(peer = %mesh_blocks::mac_to_hex(&peer), bytes = body.len(), "chain_resp (sync not implemented)");
            Vec::new()
        }
        Command::Election => handle_election(peer, body, ctx),
        Command::NewBlock => handle_new_block(peer, body, ctx),
        Command::SensorData => handle_sensor_data(peer, body, ctx),
        Command::ResetBlockchain => handle_reset(peer, ctx),
        Command::RequestSpecificBlock => handle_request_specific_block(peer, body, ctx),
        Command::HistoricalBlock => handle_historical_block(peer, body, ctx),
    }
}

/// A leader's PULSE asks every follower to take a reading and answer with
/// SENSOR_DATA; the leader's own reading is taken directly by the round
/// engine (§4.3 L3), never routed back through here.
fn handle_pulse(ctx: &DispatchContext<'_>) -> Vec<DispatchAction> {
    let timestamp = unix_timestamp();
    let temperature = ctx.sensor.read_temperature();
    let humidity = ctx.sensor.read_humidity();

    let mut payload = Vec::with_capacity(12);
    payload.extend_from_slice(&temperature.to_le_bytes());
    payload.extend_from_slice(&humidity.to_le_bytes());
    payload.extend_from_slice(&timestamp.to_le_bytes());
    vec![DispatchAction::broadcast(Command::SensorData, payload)]
}

fn unix_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs() as u32
}

fn handle_chain_req(peer: Mac, ctx: &DispatchContext<'_>) -> Vec<DispatchAction> {
    if ctx.leader.get() == ctx.own_mac {
        debug!(peer = %mesh_blocks::mac_to_hex(&peer), "replying to chain_req as current leader (stub)");
        vec![DispatchAction {
            cmd: Command::ChainResp,
            dest: peer,
            payload: Vec::new(),
        }]
    } else {
        Vec::new()
    }
}

fn handle_election(peer: Mac, body: &[u8], ctx: &DispatchContext<'_>) -> Vec<DispatchAction> {
    if body.len() != ELECTION_PAYLOAD_LEN {
        warn!(peer = %mesh_blocks::mac_to_hex(&peer), len = body.len(), "election payload wrong length, dropping");
        return Vec::new();
    }
    let mut leader = ZERO_MAC;
    leader.copy_from_slice(body);
    ctx.election_queue.push(ElectionMessage { from: peer, leader });
    Vec::new()
}

fn handle_new_block(peer: Mac, body: &[u8], ctx: &DispatchContext<'_>) -> Vec<DispatchAction> {
    let block = match Block::parse_from_wire(body) {
        Ok(block) => block,
        Err(err) => {
            warn!(peer = %mesh_blocks::mac_to_hex(&peer), %err, "rejecting new_block: parse error");
            return Vec::new();
        }
    };
    if !block.verify_hash() {
        warn!(peer = %mesh_blocks::mac_to_hex(&peer), block_num = block.block_num, "rejecting new_block: hash mismatch");
        return Vec::new();
    }

    let expected = ctx
        .ledger
        .get_last()
        .map(|last| last.block_num + 1)
        .unwrap_or(0);

    if block.block_num < expected {
        warn!(peer = %mesh_blocks::mac_to_hex(&peer), block_num = block.block_num, expected, "rejecting new_block: duplicate/stale height");
        return Vec::new();
    }

    // equal and gap cases both accept; gap additionally requests the backfill.
    let gap = block.block_num > expected;
    let inserted = ctx.ledger.insert(block);
    if !inserted {
        warn!(peer = %mesh_blocks::mac_to_hex(&peer), "new_block height accepted by comparison but insert rejected it as duplicate");
        return Vec::new();
    }

    if gap {
        debug!(peer = %mesh_blocks::mac_to_hex(&peer), missing = expected, "new_block has a height gap, requesting backfill");
        vec![DispatchAction::broadcast(
            Command::RequestSpecificBlock,
            expected.to_le_bytes().to_vec(),
        )]
    } else {
        Vec::new()
    }
}

fn handle_sensor_data(peer: Mac, body: &[u8], ctx: &DispatchContext<'_>) -> Vec<DispatchAction> {
    if body.len() != SENSOR_DATA_PAYLOAD_LEN {
        warn!(peer = %mesh_blocks::mac_to_hex(&peer), len = body.len(), "sensor_data payload wrong length, dropping");
        return Vec::new();
    }
    let temperature = f32::from_le_bytes(body[0..4].try_into().unwrap());
    let humidity = f32::from_le_bytes(body[4..8].try_into().unwrap());
    let timestamp = u32::from_le_bytes(body[8..12].try_into().unwrap());
    let record = SensorRecord::new(peer, timestamp, temperature, humidity);
    ctx.sensor_queue.push(peer, record);
    Vec::new()
}

fn handle_reset(peer: Mac, ctx: &DispatchContext<'_>) -> Vec<DispatchAction> {
    debug!(peer = %mesh_blocks::mac_to_hex(&peer), "reset_blockchain received, clearing ledger");
    ctx.ledger.deinit();
    Vec::new()
}

fn handle_request_specific_block(
    peer: Mac,
    body: &[u8],
    ctx: &DispatchContext<'_>,
) -> Vec<DispatchAction> {
    if body.len() != REQUEST_SPECIFIC_BLOCK_PAYLOAD_LEN {
        warn!(peer = %mesh_blocks::mac_to_hex(&peer), len = body.len(), "request_specific_block payload wrong length, dropping");
        return Vec::new();
    }
    if ctx.own_level > 1 {
        return Vec::new();
    }
    let height = u32::from_le_bytes(body.try_into().unwrap());
    match ctx.ledger.get_by_number(height) {
        Some(block) => {
            debug!(peer = %mesh_blocks::mac_to_hex(&peer), height, "replying with historical_block");
            vec![DispatchAction::broadcast(
                Command::HistoricalBlock,
                block.serialize_for_wire(),
            )]
        }
        None => Vec::new(),
    }
}

fn handle_historical_block(peer: Mac, body: &[u8], ctx: &DispatchContext<'_>) -> Vec<DispatchAction> {
    let block = match Block::parse_from_wire(body) {
        Ok(block) => block,
        Err(err) => {
            warn!(peer = %mesh_blocks::mac_to_hex(&peer), %err, "rejecting historical_block: parse error");
            return Vec::new();
        }
    };
    if !block.verify_hash() {
        warn!(peer = %mesh_blocks::mac_to_hex(&peer), block_num = block.block_num, "rejecting historical_block: hash mismatch");
        return Vec::new();
    }
    if !ctx.ledger.insert(block) {
        debug!(peer = %mesh_blocks::mac_to_hex(&peer), "historical_block duplicate height, ignoring");
    }
    Vec::new()
}
