// SPDX-License-Identifier: MIT OR Apache-2.0

use sha2::{Digest, Sha256};

use crate::errors::CodecError;
use crate::mac::{mac_to_hex, Mac};
use crate::record::{SensorRecord, RECORD_SIZE};

/// Size of the opaque heatmap payload hashed into every block.
pub const HEATMAP_SIZE: usize = 3;

/// Wire/hash-input width of the `pop_proof` field: ASCII-printable,
/// NUL-terminated, zero-padded to this many bytes.
pub const POP_PROOF_WIRE_LEN: usize = 64;

const HASH_LEN: usize = 32;

// block_num(4) + timestamp(4) + prev_hash(32) + pop_proof(64) + heatmap(3) + num_sensor_readings(4)
const HASH_HEADER_LEN: usize = 4 + 4 + HASH_LEN + POP_PROOF_WIRE_LEN + HEATMAP_SIZE + 4;
// hash-input header, plus the wire-only `hash` field inserted after prev_hash.
const WIRE_HEADER_LEN: usize = HASH_HEADER_LEN + HASH_LEN;

/// One round's entry in the chain.
///
/// A block is created on the leader, filled during a collection window,
/// sealed ([`Block::compute_hash`]), appended to the local ledger, broadcast,
/// and never mutated afterwards. On non-leader nodes it is parsed from the
/// wire, validated, and inserted.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub block_num: u32,
    pub timestamp: u32,
    pub prev_hash: [u8; HASH_LEN],
    pub pop_proof: String,
    pub heatmap: [u8; HEATMAP_SIZE],
    pub sensors: Vec<SensorRecord>,
    pub hash: [u8; HASH_LEN],
}

impl Block {
    /// Builds an empty block to be filled in by the leader during collection.
    /// `hash` is all-zero until [`Block::compute_hash`] seals it.
    pub fn new(block_num: u32, timestamp: u32, prev_hash: [u8; HASH_LEN]) -> Self {
        Self {
            block_num,
            timestamp,
            prev_hash,
            pop_proof: String::new(),
            heatmap: [0; HEATMAP_SIZE],
            sensors: Vec::new(),
            hash: [0; HASH_LEN],
        }
    }

    /// `num_sensor_readings` is never stored separately from `sensors`; this
    /// keeps invariant 4 (`num_sensor_readings == len(sensors)`) true by
    /// construction instead of by convention.
    pub fn num_sensor_readings(&self) -> u32 {
        self.sensors.len() as u32
    }

    pub fn push_sensor(&mut self, record: SensorRecord) {
        self.sensors.push(record);
    }

    /// Canonical hash-input serialization: everything in §4.2's field order,
    /// excluding the `hash` field itself.
    pub fn serialize_for_hash(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HASH_HEADER_LEN + self.sensors.len() * RECORD_SIZE);
        out.extend_from_slice(&self.block_num.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.prev_hash);
        out.extend_from_slice(&encode_pop_proof(&self.pop_proof));
        out.extend_from_slice(&self.heatmap);
        out.extend_from_slice(&self.num_sensor_readings().to_le_bytes());
        for record in &self.sensors {
            record.write_to(&mut out);
        }
        out
    }

    /// Canonical wire serialization: hash-input layout with `hash` spliced in
    /// immediately after `prev_hash`.
    pub fn serialize_for_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(WIRE_HEADER_LEN + self.sensors.len() * RECORD_SIZE);
        out.extend_from_slice(&self.block_num.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.prev_hash);
        out.extend_from_slice(&self.hash);
        out.extend_from_slice(&encode_pop_proof(&self.pop_proof));
        out.extend_from_slice(&self.heatmap);
        out.extend_from_slice(&self.num_sensor_readings().to_le_bytes());
        for record in &self.sensors {
            record.write_to(&mut out);
        }
        out
    }

    /// Parses a block out of its wire representation, validating the total
    /// length against the header plus `num_sensor_readings * RECORD_SIZE`.
    pub fn parse_from_wire(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < WIRE_HEADER_LEN {
            return Err(CodecError::TooShort {
                need: WIRE_HEADER_LEN,
                got: bytes.len(),
            });
        }

        let mut cursor = 0usize;
        let block_num = take_u32(bytes, &mut cursor);
        let timestamp = take_u32(bytes, &mut cursor);
        let prev_hash = take_array::<HASH_LEN>(bytes, &mut cursor);
        let hash = take_array::<HASH_LEN>(bytes, &mut cursor);
        let pop_proof_buf = take_array::<POP_PROOF_WIRE_LEN>(bytes, &mut cursor);
        let pop_proof = decode_pop_proof(&pop_proof_buf)?;
        let heatmap = take_array::<HEATMAP_SIZE>(bytes, &mut cursor);
        let num_sensor_readings = take_u32(bytes, &mut cursor);

        let expected_len = WIRE_HEADER_LEN + num_sensor_readings as usize * RECORD_SIZE;
        if bytes.len() != expected_len {
            return Err(CodecError::LengthMismatch {
                declared: num_sensor_readings,
                expected_len,
                actual_len: bytes.len(),
            });
        }

        let mut sensors = Vec::with_capacity(num_sensor_readings as usize);
        for _ in 0..num_sensor_readings {
            let record_buf = &bytes[cursor..cursor + RECORD_SIZE];
            sensors.push(SensorRecord::read_from(record_buf));
            cursor += RECORD_SIZE;
        }

        Ok(Block {
            block_num,
            timestamp,
            prev_hash,
            pop_proof,
            heatmap,
            sensors,
            hash,
        })
    }

    /// Computes `SHA-256(serialize_for_hash(self))`, stores it into `hash`,
    /// and returns it.
    pub fn compute_hash(&mut self) -> [u8; HASH_LEN] {
        let digest = Sha256::digest(self.serialize_for_hash());
        self.hash.copy_from_slice(&digest);
        self.hash
    }

    /// Recomputes the hash over the current fields and compares it against
    /// the stored `hash`, summing byte differences rather than short-
    /// circuiting on the first mismatch.
    pub fn verify_hash(&self) -> bool {
        let digest = Sha256::digest(self.serialize_for_hash());
        let mut diff = 0u8;
        for (a, b) in digest.iter().zip(self.hash.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

/// Builds the printable proof-of-participation string:
/// `Leader:<mac-colon-hex>;Time:<timestamp>;Nonce:<nonce>`, truncated to 63
/// bytes (the 64th is reserved for the wire NUL terminator).
pub fn format_pop_proof(leader: &Mac, timestamp: u32, nonce: u32) -> String {
    let full = format!("Leader:{};Time:{timestamp};Nonce:{nonce}", mac_to_hex(leader));
    if full.len() > POP_PROOF_WIRE_LEN - 1 {
        full[..POP_PROOF_WIRE_LEN - 1].to_string()
    } else {
        full
    }
}

fn encode_pop_proof(s: &str) -> [u8; POP_PROOF_WIRE_LEN] {
    let mut buf = [0u8; POP_PROOF_WIRE_LEN];
    let bytes = s.as_bytes();
    let take = bytes.len().min(POP_PROOF_WIRE_LEN - 1);
    buf[..take].copy_from_slice(&bytes[..take]);
    buf
}

fn decode_pop_proof(buf: &[u8; POP_PROOF_WIRE_LEN]) -> Result<String, CodecError> {
    let end = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or(CodecError::PopProofNotTerminated {
            max: POP_PROOF_WIRE_LEN,
        })?;
    for &b in &buf[..end] {
        if !(0x20..=0x7e).contains(&b) {
            return Err(CodecError::PopProofNotPrintable { byte: b });
        }
    }
    // SAFETY-free: already validated ASCII-printable above.
    Ok(String::from_utf8(buf[..end].to_vec()).expect("validated ascii-printable"))
}

fn take_u32(bytes: &[u8], cursor: &mut usize) -> u32 {
    let value = u32::from_le_bytes(bytes[*cursor..*cursor + 4].try_into().unwrap());
    *cursor += 4;
    value
}

fn take_array<const N: usize>(bytes: &[u8], cursor: &mut usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[*cursor..*cursor + N]);
    *cursor += N;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SensorRecord;

    fn sample_block(n_sensors: usize) -> Block {
        let mut block = Block::new(7, 1_000, [9u8; 32]);
        block.pop_proof = format_pop_proof(&[1, 2, 3, 4, 5, 6], 1_000, 42);
        block.heatmap = [1, 2, 3];
        for i in 0..n_sensors {
            let mut rec = SensorRecord::new([i as u8; 6], 1_000 + i as u32, 20.0 + i as f32, 50.0);
            rec.rssi = [-10, -20, -30, -40, -50];
            block.push_sensor(rec);
        }
        block
    }

    #[test]
    fn round_trip_empty_and_populated() {
        for n in [0, 1, 3, 8] {
            let mut block = sample_block(n);
            block.compute_hash();
            let wire = block.serialize_for_wire();
            let parsed = Block::parse_from_wire(&wire).expect("parses");
            assert_eq!(parsed, block);
        }
    }

    #[test]
    fn hash_excludes_hash_field() {
        let mut a = sample_block(2);
        let mut b = a.clone();
        b.hash = [0xAB; 32];
        assert_eq!(a.serialize_for_hash(), b.serialize_for_hash());
        a.compute_hash();
        b.compute_hash();
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn verify_hash_detects_tampering() {
        let mut block = sample_block(1);
        block.compute_hash();
        let mut tampered = block.clone();
        tampered.sensors[0].humidity += 1.0;
        assert!(block.verify_hash());
        assert!(!tampered.verify_hash());
    }

    #[test]
    fn compute_hash_is_idempotent() {
        let mut block = sample_block(2);
        let first = block.compute_hash();
        let second = block.compute_hash();
        assert_eq!(first, second);
    }

    #[test]
    fn parse_rejects_length_mismatch() {
        let mut block = sample_block(2);
        block.compute_hash();
        let mut wire = block.serialize_for_wire();
        wire.pop(); // truncate one byte off the last record
        assert_eq!(
            Block::parse_from_wire(&wire),
            Err(CodecError::LengthMismatch {
                declared: 2,
                expected_len: WIRE_HEADER_LEN + 2 * RECORD_SIZE,
                actual_len: wire.len(),
            })
        );
    }

    #[test]
    fn parse_rejects_too_short() {
        assert!(matches!(
            Block::parse_from_wire(&[0u8; 10]),
            Err(CodecError::TooShort { .. })
        ));
    }

    #[test]
    fn pop_proof_matches_expected_pattern() {
        let pop = format_pop_proof(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff], 123, 456);
        assert!(pop.starts_with("Leader:aa:bb:cc:dd:ee:ff;Time:123;Nonce:456"));
    }

    #[test]
    fn pop_proof_truncates_to_wire_width() {
        let pop = format_pop_proof(&[0xff; 6], u32::MAX, u32::MAX);
        assert!(pop.len() <= POP_PROOF_WIRE_LEN - 1);
        let encoded = encode_pop_proof(&pop);
        assert_eq!(decode_pop_proof(&encoded).unwrap(), pop);
    }
}
