// SPDX-License-Identifier: MIT OR Apache-2.0

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Mesh ledger node.
#[derive(Parser)]
#[command(name = env!("CARGO_PKG_NAME"), version, about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    #[command(flatten)]
    pub opts: CliOpts,
    #[command(subcommand)]
    pub command: Option<NodeCommand>,
}

#[derive(Subcommand)]
pub enum NodeCommand {
    /// Prints a `RESET_BLOCKCHAIN` line for piping into a running node's
    /// stdin command channel.
    Reset,
}

#[derive(Parser, Default)]
pub struct CliOpts {
    /// A TOML file containing node configuration.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// This node's own MAC, as colon-separated hex, overriding the config file.
    #[arg(long)]
    pub mac: Option<String>,
    /// Mesh level override; 0 or 1 marks this node as root-eligible.
    #[arg(long)]
    pub level: Option<u8>,
    /// UDP address to bind the mesh transport to.
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// UDP broadcast address for the mesh transport.
    #[arg(long)]
    pub broadcast: Option<SocketAddr>,
    /// `tracing_subscriber::EnvFilter` directive, e.g. `info` or `debug`.
    #[arg(long)]
    pub log_level: Option<String>,
}
