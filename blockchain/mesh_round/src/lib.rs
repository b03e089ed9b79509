// SPDX-License-Identifier: MIT OR Apache-2.0

//! The round engine: the leader/follower loop that drives block sealing,
//! broadcast, and leader rotation.

mod engine;
mod timing;

pub use engine::RoundEngine;
pub use timing::{
    T_DISCOVERY_WAIT, T_ELECTION_WAIT, T_EMPTY_MESH_RETRY, T_PROPAGATION, T_PULSE_TIMEOUT, T_ROUND,
};
