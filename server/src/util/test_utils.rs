/*
 * Created on Mon Apr 11 2022
 *
 * This file is a part of Cardinal
 * Cardinal is a free and open-source in-memory data structure server that
 * speaks the RESP wire protocol, written by Sayan Nandan ("the Author") with
 * the vision of providing a familiar, fast and predictable keyspace without
 * compromising on correctness.
 *
 * Copyright (c) 2022, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! An in-process server harness for end-to-end tests
//!
//! Every connection is one half of a `tokio::io::duplex` pair; the other
//! half runs a real [`ConnectionHandler`] task, so a test exercises the
//! whole pipeline: framing, dispatch, transactions, replies, pub/sub
//! pushes and replication promotion.

use crate::config::ConfigurationSet;
use crate::corestore::Corestore;
use crate::dbnet::connection::Connection;
use crate::dbnet::{ConnectionHandler, MAXIMUM_CONNECTION_LIMIT};
use crate::replication::{ReplicationState, Role};
use std::sync::Arc;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::{broadcast, mpsc, Semaphore};

pub struct TestServer {
    pub store: Corestore,
    signal: broadcast::Sender<()>,
    climit: Arc<Semaphore>,
    term_tx: mpsc::Sender<()>,
    _term_rx: mpsc::Receiver<()>,
}

impl TestServer {
    pub fn new() -> Self {
        Self::with_role(Role::Leader)
    }
    pub fn with_role(role: Role) -> Self {
        let store = Corestore::new_empty(ConfigurationSet::default(), ReplicationState::new(role));
        let (signal, _) = broadcast::channel(1);
        let (term_tx, _term_rx) = mpsc::channel(1);
        TestServer {
            store,
            signal,
            climit: Arc::new(Semaphore::new(MAXIMUM_CONNECTION_LIMIT)),
            term_tx,
            _term_rx,
        }
    }
    /// Open a client connection; a real handler serves the other half
    pub fn connect(&self) -> DuplexStream {
        let (client, server) = duplex(1 << 16);
        let mut chandle = ConnectionHandler::new(
            self.store.clone(),
            Connection::new(server),
            self.climit.clone(),
            self.signal.subscribe(),
            self.term_tx.clone(),
        );
        tokio::spawn(async move {
            let _ = chandle.run().await;
        });
        client
    }
    /// Open a quiet upstream link served by `run_replica_link`, as if this
    /// side were the leader's end of the replication stream
    pub fn connect_replica_link(&self) -> DuplexStream {
        let (leader_side, follower_side) = duplex(1 << 16);
        let mut con = Connection::new(follower_side);
        con.set_quiet(true);
        let mut chandle =
            ConnectionHandler::for_replica_link(self.store.clone(), con, self.signal.subscribe());
        tokio::spawn(async move {
            let _ = chandle.run_replica_link().await;
        });
        leader_side
    }
}

pub async fn read_exactly(stream: &mut DuplexStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await.unwrap();
    buf
}

/// Send `input` and assert the reply is byte-for-byte `expected`
pub async fn assert_reply(stream: &mut DuplexStream, input: &[u8], expected: &[u8]) {
    stream.write_all(input).await.unwrap();
    let got = read_exactly(stream, expected.len()).await;
    assert_eq!(
        got,
        expected,
        "for input {:?}: got {:?}, want {:?}",
        String::from_utf8_lossy(input),
        String::from_utf8_lossy(&got),
        String::from_utf8_lossy(expected)
    );
}
