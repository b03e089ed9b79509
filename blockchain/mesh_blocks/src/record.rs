// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::mac::Mac;

/// Number of neighbor link-strength samples carried per sensor record.
pub const MAX_NEIGHBORS: usize = 5;

/// Wire size of one [`SensorRecord`]: 6 (mac) + 4 (timestamp) + 4 (temperature)
/// + 4 (humidity) + `MAX_NEIGHBORS` (rssi).
pub const RECORD_SIZE: usize = 6 + 4 + 4 + 4 + MAX_NEIGHBORS;

/// One peer's reading within a block.
///
/// Records form an ordered sequence inside a [`crate::Block`]; the order is
/// the order in which the leader appended them during collection.
#[derive(Clone, Debug, PartialEq)]
pub struct SensorRecord {
    pub mac: Mac,
    /// Seconds since an arbitrary epoch.
    pub timestamp: u32,
    pub temperature: f32,
    pub humidity: f32,
    /// Neighbor link strengths, in dBm-ish signed units, one per slot.
    pub rssi: [i8; MAX_NEIGHBORS],
}

impl SensorRecord {
    pub fn new(mac: Mac, timestamp: u32, temperature: f32, humidity: f32) -> Self {
        Self {
            mac,
            timestamp,
            temperature,
            humidity,
            rssi: [0; MAX_NEIGHBORS],
        }
    }

    pub(crate) fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.mac);
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.temperature.to_le_bytes());
        out.extend_from_slice(&self.humidity.to_le_bytes());
        for rssi in &self.rssi {
            out.push(*rssi as u8);
        }
    }

    pub(crate) fn read_from(buf: &[u8]) -> Self {
        debug_assert_eq!(buf.len(), RECORD_SIZE);
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&buf[0..6]);
        let timestamp = u32::from_le_bytes(buf[6..10].try_into().unwrap());
        let temperature = f32::from_le_bytes(buf[10..14].try_into().unwrap());
        let humidity = f32::from_le_bytes(buf[14..18].try_into().unwrap());
        let mut rssi = [0i8; MAX_NEIGHBORS];
        for (slot, byte) in rssi.iter_mut().zip(&buf[18..18 + MAX_NEIGHBORS]) {
            *slot = *byte as i8;
        }
        Self {
            mac,
            timestamp,
            temperature,
            humidity,
            rssi,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_size_matches_field_layout() {
        assert_eq!(RECORD_SIZE, 23);
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut rec = SensorRecord::new([1, 2, 3, 4, 5, 6], 42, 21.5, 55.0);
        rec.rssi = [-128, -1, 0, 1, 127];
        let mut buf = Vec::new();
        rec.write_to(&mut buf);
        assert_eq!(buf.len(), RECORD_SIZE);
        let back = SensorRecord::read_from(&buf);
        assert_eq!(rec, back);
    }
}
