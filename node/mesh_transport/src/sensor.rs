// SPDX-License-Identifier: MIT OR Apache-2.0

//! A synthetic sensor reading source for development and testing, standing
//! in for the real temperature/humidity probe hardware. Values random-walk
//! around a configurable baseline rather than jumping independently each
//! call, so a sequence of readings looks plausible in logs and tests.

use std::sync::Mutex;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::traits::SensorSource;

pub struct SyntheticSensor {
    state: Mutex<SyntheticState>,
}

struct SyntheticState {
    rng: ChaCha8Rng,
    temperature: f32,
    humidity: f32,
}

impl SyntheticSensor {
    /// Seeds from the OS RNG; readings drift around `25.0`C / `50.0`%.
    pub fn new() -> Self {
        Self::seeded(rand::thread_rng().gen(), 25.0, 50.0)
    }

    /// Deterministic constructor for tests.
    pub fn seeded(seed: u64, base_temperature: f32, base_humidity: f32) -> Self {
        Self {
            state: Mutex::new(SyntheticState {
                rng: ChaCha8Rng::seed_from_u64(seed),
                temperature: base_temperature,
                humidity: base_humidity,
            }),
        }
    }
}

impl Default for SyntheticSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSource for SyntheticSensor {
    fn read_temperature(&self) -> f32 {
        let mut state = self.state.lock().expect("sensor state poisoned");
        let delta = state.rng.gen_range(-0.3..=0.3);
        state.temperature += delta;
        state.temperature
    }

    fn read_humidity(&self) -> f32 {
        let mut state = self.state.lock().expect("sensor state poisoned");
        let delta = state.rng.gen_range(-0.5..=0.5);
        state.humidity = (state.humidity + delta).clamp(0.0, 100.0);
        state.humidity
    }
}
