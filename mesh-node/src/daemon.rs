// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wires the transport, ledger, queues, dispatcher and round engine
//! together into the running node, the way `forest/daemon`'s `start`
//! assembles its services into one `JoinSet`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mesh_dispatch::{dispatch, DispatchContext};
use mesh_ledger::LedgerStore;
use mesh_queues::{ElectionQueue, LeaderCell, SensorResponseQueue};
use mesh_round::RoundEngine;
use mesh_transport::{CommandChannel, MeshTransport, SensorSource, StdinCommandChannel, SyntheticSensor, UdpMeshTransport};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::Config;

pub async fn run(config: Config) -> anyhow::Result<()> {
    let own_mac = config.own_mac()?;

    let transport = Arc::new(
        UdpMeshTransport::bind(config.bind_addr, config.broadcast_addr, own_mac, config.own_level)
            .await
            .with_context(|| format!("binding mesh transport to {}", config.bind_addr))?,
    );
    let sensor = Arc::new(SyntheticSensor::new());
    let ledger = Arc::new(LedgerStore::init());
    let sensor_queue = Arc::new(SensorResponseQueue::new());
    let election_queue = Arc::new(ElectionQueue::new());
    let leader = Arc::new(LeaderCell::new());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut services: JoinSet<anyhow::Result<()>> = JoinSet::new();

    {
        let transport = transport.clone();
        services.spawn(async move {
            transport.run().await;
            Ok(())
        });
    }

    {
        let transport: Arc<dyn MeshTransport> = transport.clone();
        let ledger = ledger.clone();
        let sensor_queue = sensor_queue.clone();
        let election_queue = election_queue.clone();
        let leader = leader.clone();
        let sensor = sensor.clone();
        let own_level = config.own_level;
        services.spawn(async move {
            run_receive_loop(
                transport,
                ledger,
                sensor_queue,
                election_queue,
                leader,
                sensor,
                own_mac,
                own_level,
            )
            .await;
            Ok(())
        });
    }

    {
        let transport: Arc<dyn MeshTransport> = transport.clone();
        let engine = RoundEngine::new(
            transport,
            sensor,
            ledger.clone(),
            sensor_queue.clone(),
            election_queue.clone(),
            leader.clone(),
        );
        let shutdown_rx = shutdown_rx.clone();
        services.spawn(async move {
            engine.run(shutdown_rx).await;
            Ok(())
        });
    }

    if config.enable_command_channel {
        let channel = StdinCommandChannel::spawn();
        let transport: Arc<dyn MeshTransport> = transport.clone();
        let ledger = ledger.clone();
        services.spawn(async move {
            run_command_channel(channel, transport, ledger).await;
            Ok(())
        });
    }

    info!(mac = %mesh_blocks::mac_to_hex(&own_mac), bind = %config.bind_addr, "mesh node started");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, shutting down");
        }
        result = propagate_first_error(&mut services) => {
            if let Err(err) = result {
                warn!(%err, "a service task failed, shutting down");
            }
        }
    }

    let _ = shutdown_tx.send(true);
    services.shutdown().await;
    Ok(())
}

async fn run_receive_loop(
    transport: Arc<dyn MeshTransport>,
    ledger: Arc<LedgerStore>,
    sensor_queue: Arc<SensorResponseQueue>,
    election_queue: Arc<ElectionQueue>,
    leader: Arc<LeaderCell>,
    sensor: Arc<dyn SensorSource>,
    own_mac: mesh_blocks::Mac,
    own_level: u8,
) {
    while let Some((peer, payload)) = transport.recv().await {
        let ctx = DispatchContext {
            ledger: &ledger,
            sensor_queue: &sensor_queue,
            election_queue: &election_queue,
            leader: &leader,
            sensor: sensor.as_ref(),
            own_level,
            own_mac,
        };
        let actions = dispatch(peer, &payload, &ctx);
        for action in actions {
            if let Err(err) = transport.send(action.cmd, action.dest, &action.payload).await {
                warn!(%err, "failed to send dispatcher-triggered reply");
            }
        }
    }
}

async fn run_command_channel(
    channel: StdinCommandChannel,
    transport: Arc<dyn MeshTransport>,
    ledger: Arc<LedgerStore>,
) {
    loop {
        match channel.try_recv_line() {
            Some(line) => match line.trim() {
                "READ_LEDGER" => {
                    ledger.with_blocks(|blocks| {
                        for block in blocks {
                            info!(block_num = block.block_num, sensors = block.num_sensor_readings(), "ledger entry");
                        }
                    });
                }
                "RESET_BLOCKCHAIN" => {
                    if let Err(err) = transport
                        .send(mesh_transport::Command::ResetBlockchain, mesh_blocks::BROADCAST_MAC, &[])
                        .await
                    {
                        warn!(%err, "failed to broadcast reset_blockchain");
                    }
                    ledger.deinit();
                }
                other if !other.is_empty() => {
                    warn!(line = other, "unrecognized command channel line");
                }
                _ => {}
            },
            None => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }
}

async fn propagate_first_error(services: &mut JoinSet<anyhow::Result<()>>) -> anyhow::Result<()> {
    loop {
        match services.join_next().await {
            Some(Ok(Ok(()))) => continue,
            Some(Ok(Err(err))) => return Err(err),
            Some(Err(join_err)) => return Err(join_err.into()),
            None => return Ok(()),
        }
    }
}
