// SPDX-License-Identifier: MIT OR Apache-2.0

//! On-disk node configuration, loaded from an optional TOML file and
//! overridable by CLI flags — mirroring the teacher's `Config`/
//! `CliOpts::to_config` split: the file carries durable defaults, the CLI
//! carries this-run overrides.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use mesh_blocks::{mac_from_hex, mac_to_hex, Mac};
use serde::{Deserialize, Serialize};

use crate::cli::CliOpts;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// This node's own MAC, as colon-separated hex. Falls back to a
    /// generated value if absent from both file and CLI — see
    /// [`Config::load`].
    pub own_mac: String,
    /// Mesh level; 0 or 1 marks this node as root-eligible.
    pub own_level: u8,
    pub bind_addr: SocketAddr,
    pub broadcast_addr: SocketAddr,
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"info"` or
    /// `"mesh_round=debug,mesh_dispatch=warn"`.
    pub log_level: String,
    /// Whether to spawn the stdin-driven external command channel.
    pub enable_command_channel: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            own_mac: mac_to_hex(&[0, 0, 0, 0, 0, 1]),
            own_level: 2,
            bind_addr: "0.0.0.0:7878".parse().unwrap(),
            broadcast_addr: "255.255.255.255:7878".parse().unwrap(),
            log_level: "info".to_string(),
            enable_command_channel: true,
        }
    }
}

impl Config {
    /// Loads the config file named by `--config` (or the built-in
    /// defaults if absent), then applies every CLI flag that was actually
    /// set on top.
    pub fn load(opts: &CliOpts) -> anyhow::Result<Self> {
        let mut cfg = match &opts.config {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };

        if let Some(bind) = opts.bind {
            cfg.bind_addr = bind;
        }
        if let Some(broadcast) = opts.broadcast {
            cfg.broadcast_addr = broadcast;
        }
        if let Some(level) = &opts.log_level {
            cfg.log_level = level.clone();
        }
        if let Some(mac) = &opts.mac {
            cfg.own_mac = mac.clone();
        }
        if let Some(level) = opts.level {
            cfg.own_level = level;
        }

        Ok(cfg)
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn own_mac(&self) -> anyhow::Result<Mac> {
        mac_from_hex(&self.own_mac)
            .ok_or_else(|| anyhow::anyhow!("own_mac `{}` is not a valid colon-hex MAC", self.own_mac))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let cfg = Config::default();
        let rendered = toml::to_string(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&rendered).expect("parse");
        assert_eq!(cfg, parsed);
    }

    #[test]
    fn own_mac_parses_from_colon_hex() {
        let cfg = Config::default();
        assert_eq!(cfg.own_mac().unwrap(), [0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn own_mac_rejects_malformed_value() {
        let mut cfg = Config::default();
        cfg.own_mac = "not-a-mac".to_string();
        assert!(cfg.own_mac().is_err());
    }
}
