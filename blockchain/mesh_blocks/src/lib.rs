// SPDX-License-Identifier: MIT OR Apache-2.0

//! Block and sensor-record data model, canonical wire codec and hashing for
//! the mesh ledger protocol.
//!
//! Field order, sizes and the hash-input/wire split are fixed by the
//! protocol — see [`Block::serialize_for_hash`] and
//! [`Block::serialize_for_wire`].

mod block;
mod errors;
mod mac;
mod record;

pub use block::{format_pop_proof, Block, HEATMAP_SIZE, POP_PROOF_WIRE_LEN};
pub use errors::CodecError;
pub use mac::{mac_from_hex, mac_to_hex, Mac, BROADCAST_MAC, ZERO_MAC};
pub use record::{SensorRecord, MAX_NEIGHBORS, RECORD_SIZE};
