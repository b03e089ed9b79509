// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

/// Target wall-clock length of one leader round.
pub const T_ROUND: Duration = Duration::from_secs(15);
/// How long the leader waits for one peer's `SENSOR_DATA` reply to a `PULSE`.
pub const T_PULSE_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a follower waits for an `ELECTION` message before starting discovery.
pub const T_ELECTION_WAIT: Duration = Duration::from_secs(70);
/// Pause used twice during follower discovery (§4.3 F3).
pub const T_DISCOVERY_WAIT: Duration = Duration::from_secs(5);
/// Retry interval while the mesh has not yet formed any peers.
pub const T_EMPTY_MESH_RETRY: Duration = Duration::from_secs(5);
/// Settling time between the block broadcast and the election broadcast (L8).
pub const T_PROPAGATION: Duration = Duration::from_millis(500);
