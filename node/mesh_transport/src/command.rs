// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// The command byte leading every datagram (§4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    Ack = 0x01,
    Pulse = 0x02,
    ChainReq = 0x03,
    ChainResp = 0x04,
    Election = 0x05,
    NewBlock = 0x06,
    SensorData = 0x07,
    ResetBlockchain = 0x08,
    RequestSpecificBlock = 0x09,
    HistoricalBlock = 0x0A,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized command byte 0x{0:02x}")]
pub struct UnknownCommand(pub u8);

impl TryFrom<u8> for Command {
    type Error = UnknownCommand;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Ok(match byte {
            0x01 => Command::Ack,
            0x02 => Command::Pulse,
            0x03 => Command::ChainReq,
            0x04 => Command::ChainResp,
            0x05 => Command::Election,
            0x06 => Command::NewBlock,
            0x07 => Command::SensorData,
            0x08 => Command::ResetBlockchain,
            0x09 => Command::RequestSpecificBlock,
            0x0A => Command::HistoricalBlock,
            other => return Err(UnknownCommand(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_known_byte() {
        for byte in [
            0x01u8, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A,
        ] {
            let cmd = Command::try_from(byte).expect("known command byte");
            assert_eq!(cmd as u8, byte);
        }
    }

    #[test]
    fn rejects_unknown_byte() {
        assert_eq!(Command::try_from(0x00), Err(UnknownCommand(0x00)));
        assert_eq!(Command::try_from(0xFF), Err(UnknownCommand(0xFF)));
    }
}
