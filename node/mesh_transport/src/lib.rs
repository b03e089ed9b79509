// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport, sensor and command-channel contracts for a mesh node, plus
//! host-side adapters (UDP broadcast, synthetic sensor, stdin command
//! channel) that stand in for the real radio and hardware.

mod command;
mod command_channel;
mod sensor;
mod traits;
mod udp;

pub use command::{Command, UnknownCommand};
pub use command_channel::StdinCommandChannel;
pub use sensor::SyntheticSensor;
pub use traits::{CommandChannel, MeshTransport, PeerInfo, SensorSource};
pub use udp::UdpMeshTransport;
