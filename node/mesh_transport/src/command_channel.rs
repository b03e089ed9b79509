// SPDX-License-Identifier: MIT OR Apache-2.0

//! Host stand-in for the external controller link (`READ_LEDGER`,
//! `RESET_BLOCKCHAIN`): a background thread reads newline-delimited
//! commands from stdin and hands them to whoever polls
//! [`StdinCommandChannel::try_recv_line`].

use std::io::BufRead;
use std::sync::mpsc;
use std::thread;

use tracing::warn;

use crate::traits::CommandChannel;

pub struct StdinCommandChannel {
    rx: mpsc::Receiver<String>,
}

impl StdinCommandChannel {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            return; // receiver dropped, channel is shutting down
                        }
                    }
                    Err(err) => {
                        warn!(%err, "stdin command channel read failed, stopping");
                        return;
                    }
                }
            }
        });
        Self { rx }
    }
}

impl CommandChannel for StdinCommandChannel {
    fn try_recv_line(&self) -> Option<String> {
        match self.rx.try_recv() {
            Ok(line) => Some(line),
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => None,
        }
    }
}
