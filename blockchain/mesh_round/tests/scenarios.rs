// SPDX-License-Identifier: MIT OR Apache-2.0

use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mesh_blocks::{Mac, SensorRecord};
use mesh_ledger::LedgerStore;
use mesh_queues::{ElectionQueue, LeaderCell, SensorResponseQueue};
use mesh_round::RoundEngine;
use mesh_transport::{Command, MeshTransport, PeerInfo, SensorSource};

struct FakeTransport {
    own_mac: Mac,
    own_level: u8,
    peers: Mutex<Vec<PeerInfo>>,
    sent: Mutex<Vec<(Command, Mac, Vec<u8>)>>,
}

impl FakeTransport {
    fn new(own_mac: Mac, own_level: u8, peers: Vec<PeerInfo>) -> Self {
        Self {
            own_mac,
            own_level,
            peers: Mutex::new(peers),
            sent: Mutex::new(Vec::new()),
        }
    }

    fn sent_snapshot(&self) -> Vec<(Command, Mac, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MeshTransport for FakeTransport {
    async fn send(&self, cmd: Command, dest: Mac, payload: &[u8]) -> io::Result<()> {
        self.sent.lock().unwrap().push((cmd, dest, payload.to_vec()));
        Ok(())
    }

    async fn recv(&self) -> Option<(Mac, Vec<u8>)> {
        None
    }

    fn get_peers(&self) -> Vec<PeerInfo> {
        self.peers.lock().unwrap().clone()
    }

    fn get_own_mac(&self) -> Mac {
        self.own_mac
    }

    fn get_own_level(&self) -> u8 {
        self.own_level
    }
}

struct FixedSensor {
    temperature: f32,
    humidity: f32,
}

impl SensorSource for FixedSensor {
    fn read_temperature(&self) -> f32 {
        self.temperature
    }

    fn read_humidity(&self) -> f32 {
        self.humidity
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_1_genesis_on_singleton_mesh() {
    let own_mac: Mac = [1; 6];
    let transport = Arc::new(FakeTransport::new(own_mac, 0, Vec::new()));
    let sensor = Arc::new(FixedSensor {
        temperature: 22.0,
        humidity: 40.0,
    });
    let ledger = Arc::new(LedgerStore::init());
    let sensor_queue = Arc::new(SensorResponseQueue::new());
    let election_queue = Arc::new(ElectionQueue::new());
    let leader = Arc::new(LeaderCell::new());

    let engine = RoundEngine::new(
        transport.clone(),
        sensor,
        ledger.clone(),
        sensor_queue,
        election_queue,
        leader.clone(),
    );

    engine.round_once().await;

    assert_eq!(ledger.len(), 1);
    let genesis = ledger.get_by_number(0).expect("genesis block present");
    assert_eq!(genesis.block_num, 0);
    assert_eq!(genesis.prev_hash, [0u8; 32]);
    assert_eq!(genesis.sensors.len(), 1);
    assert_eq!(genesis.sensors[0].mac, own_mac);
    assert!(genesis.verify_hash());

    let re = regex_like_pop_proof(&genesis.pop_proof);
    assert!(re, "pop_proof `{}` does not match expected pattern", genesis.pop_proof);

    // having no peers, the node re-elects itself
    assert_eq!(leader.get(), own_mac);
}

#[tokio::test(start_paused = true)]
async fn scenario_2_three_node_happy_round() {
    let mac_a: Mac = [0xA; 6];
    let mac_b: Mac = [0xB; 6];
    let mac_c: Mac = [0xC; 6];

    let transport = Arc::new(FakeTransport::new(
        mac_a,
        0,
        vec![
            PeerInfo { mac: mac_b, level: 1 },
            PeerInfo { mac: mac_c, level: 1 },
        ],
    ));
    let sensor = Arc::new(FixedSensor {
        temperature: 21.0,
        humidity: 55.0,
    });
    let ledger = Arc::new(LedgerStore::init());
    let sensor_queue = Arc::new(SensorResponseQueue::new());
    let election_queue = Arc::new(ElectionQueue::new());
    let leader = Arc::new(LeaderCell::new());
    leader.set(mac_a);

    // Simulates B and C having already replied to A's forthcoming PULSE by
    // the time A gets around to waiting for each of them.
    sensor_queue.push(mac_b, SensorRecord::new(mac_b, 100, 19.0, 60.0));
    sensor_queue.push(mac_c, SensorRecord::new(mac_c, 100, 18.0, 61.0));

    let engine = RoundEngine::new(
        transport.clone(),
        sensor,
        ledger.clone(),
        sensor_queue,
        election_queue,
        leader.clone(),
    );

    engine.round_once().await;

    assert_eq!(ledger.len(), 1);
    let block = ledger.get_by_number(0).unwrap();
    assert_eq!(block.sensors.len(), 3);
    assert_eq!(
        block.sensors.iter().map(|r| r.mac).collect::<Vec<_>>(),
        vec![mac_a, mac_b, mac_c]
    );

    let sent = transport.sent_snapshot();
    let new_block_msgs: Vec<_> = sent.iter().filter(|(cmd, ..)| *cmd == Command::NewBlock).collect();
    assert_eq!(new_block_msgs.len(), 1);

    let election_msgs: Vec<_> = sent.iter().filter(|(cmd, ..)| *cmd == Command::Election).collect();
    assert_eq!(election_msgs.len(), 1);
    let elected_mac: Mac = election_msgs[0].2.clone().try_into().unwrap();
    assert!([mac_a, mac_b, mac_c].contains(&elected_mac));
}

#[tokio::test(start_paused = true)]
async fn scenario_3_follower_rediscovers_leader_after_timeout() {
    let own_mac: Mac = [2; 6];
    let peer_mac: Mac = [3; 6];
    let transport = Arc::new(FakeTransport::new(
        own_mac,
        1, // root-eligible
        vec![PeerInfo { mac: peer_mac, level: 1 }],
    ));
    let sensor = Arc::new(FixedSensor {
        temperature: 20.0,
        humidity: 50.0,
    });
    let ledger = Arc::new(LedgerStore::init());
    let sensor_queue = Arc::new(SensorResponseQueue::new());
    let election_queue = Arc::new(ElectionQueue::new());
    let leader = Arc::new(LeaderCell::new());
    // Leader (some other node) has already crashed; nobody will ever push
    // to the election queue in this test.
    leader.set([9; 6]);

    let engine = RoundEngine::new(
        transport.clone(),
        sensor,
        ledger,
        sensor_queue,
        election_queue,
        leader.clone(),
    );

    engine.round_once().await;

    // Root-eligible and never heard an election: it must have broadcast at
    // least one ELECTION of its own by the end of discovery.
    let sent = transport.sent_snapshot();
    let election_msgs: Vec<_> = sent.iter().filter(|(cmd, ..)| *cmd == Command::Election).collect();
    assert!(!election_msgs.is_empty());
    let final_leader = leader.get();
    assert!([own_mac, peer_mac].contains(&final_leader));
}

fn regex_like_pop_proof(pop: &str) -> bool {
    // `^Leader:[0-9a-f:]+;Time:\d+;Nonce:\d+$` without pulling in a regex dependency.
    let Some(rest) = pop.strip_prefix("Leader:") else {
        return false;
    };
    let Some((mac_part, rest)) = rest.split_once(";Time:") else {
        return false;
    };
    if mac_part.is_empty() || !mac_part.chars().all(|c| c.is_ascii_hexdigit() || c == ':') {
        return false;
    }
    let Some((time_part, nonce_part)) = rest.split_once(";Nonce:") else {
        return false;
    };
    !time_part.is_empty()
        && time_part.chars().all(|c| c.is_ascii_digit())
        && !nonce_part.is_empty()
        && nonce_part.chars().all(|c| c.is_ascii_digit())
}
