/*
 * Created on Mon Mar 28 2022
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

//! # Replication
//!
//! Writes flow leader → follower only. On the leader, a connection that
//! completes a `PSYNC` is promoted into the follower set: from then on,
//! every successful write command's canonical wire encoding is pushed down
//! its frame channel in local commit order. On the follower, a service task
//! dials the configured leader, walks the handshake, swallows the snapshot
//! bulk and then runs an ordinary dispatch loop over the upstream link with
//! reply writing suppressed.

use crate::corestore::Corestore;
use crate::dbnet::connection::Connection;
use crate::dbnet::ConnectionHandler;
use crate::protocol::Element;
use crate::resp;
use crate::util::error::{Error, ServerResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// The snapshot a leader ships to a fresh follower: magic, EOF, zero
/// (disabled) checksum. The keyspace state behind it is always empty
pub const EMPTY_SNAPSHOT: [u8; 18] = [
    b'R', b'E', b'D', b'I', b'S', b'0', b'0', b'1', b'1', 0xFF, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// The replication role this process was started with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
}

/// Replication identity, offset and the follower sinks, shared via
/// [`Corestore`]
pub struct ReplicationState {
    role: Role,
    replid: String,
    offset: AtomicU64,
    followers: Mutex<HashMap<u64, UnboundedSender<Vec<u8>>>>,
}

impl ReplicationState {
    pub fn new(role: Role) -> Self {
        ReplicationState {
            role,
            replid: generate_replid(),
            offset: AtomicU64::new(0),
            followers: Mutex::new(HashMap::new()),
        }
    }
    pub const fn role(&self) -> Role {
        self.role
    }
    /// The role string the `INFO` surface reports
    pub const fn role_str(&self) -> &'static str {
        match self.role {
            Role::Leader => "master",
            Role::Follower => "slave",
        }
    }
    pub fn replid(&self) -> &str {
        &self.replid
    }
    pub fn offset(&self) -> u64 {
        self.offset.load(Ordering::Relaxed)
    }
    /// Account for upstream bytes the follower has processed
    pub fn add_offset(&self, bytes: u64) {
        self.offset.fetch_add(bytes, Ordering::Relaxed);
    }
    /// Promote a connection into the follower set
    pub fn register_follower(&self, id: u64, sink: UnboundedSender<Vec<u8>>) {
        self.followers.lock().insert(id, sink);
    }
    pub fn unregister_follower(&self, id: u64) {
        self.followers.lock().remove(&id);
    }
    pub fn follower_count(&self) -> usize {
        self.followers.lock().len()
    }
    /// Push a write command's canonical encoding to every follower
    ///
    /// Called after the local execution succeeded. Frames reach any one
    /// follower in the exact order they were propagated here, which is the
    /// leader's local commit order.
    pub fn propagate_write(&self, frame: &[u8]) {
        let mut followers = self.followers.lock();
        followers.retain(|_, sink| sink.send(frame.to_vec()).is_ok());
        if self.role == Role::Leader {
            self.offset.fetch_add(frame.len() as u64, Ordering::Relaxed);
        }
    }
}

/// A 40-hex-character replication id, minted once per process
fn generate_replid() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.push_str(&Uuid::new_v4().simple().to_string());
    id.truncate(40);
    id
}

/// The follower-side replication service
///
/// Dials the leader, walks the handshake, then keeps the upstream link
/// open as a quiet dispatch loop until the process terminates. Every error
/// in here is fatal: a follower that cannot follow is misconfigured.
pub async fn replication_service(
    store: Corestore,
    leader_host: String,
    leader_port: u16,
    listen_port: u16,
    termination_signal: broadcast::Receiver<()>,
) -> ServerResult<()> {
    let stream = TcpStream::connect((leader_host.as_str(), leader_port))
        .await
        .map_err(|e| {
            Error::Replication(format!(
                "failed to connect to leader {leader_host}:{leader_port}: {e}"
            ))
        })?;
    let mut con = Connection::new(stream);
    handshake(&mut con, listen_port).await?;
    log::info!("Handshake with leader {leader_host}:{leader_port} complete");
    // from here on the leader's commands come down this link; execute them
    // without writing replies back
    con.set_quiet(true);
    let mut handler = ConnectionHandler::for_replica_link(store, con, termination_signal);
    handler
        .run_replica_link()
        .await
        .map_err(|e| Error::Replication(format!("upstream link failed: {e}")))
}

/// The four-step handshake plus the snapshot bulk
///
/// Every reply is read and discarded; the snapshot contents are ignored
/// because the leader always ships the empty keyspace.
async fn handshake<C>(con: &mut Connection<C>, listen_port: u16) -> ServerResult<()>
where
    C: crate::dbnet::BufferedSocketStream,
{
    let port = listen_port.to_string();
    exchange(con, &[b"PING"]).await?;
    exchange(con, &[b"REPLCONF", b"listening-port", port.as_bytes()]).await?;
    exchange(con, &[b"REPLCONF", b"capa", b"psync2"]).await?;
    let reply = exchange(con, &[b"PSYNC", b"?", b"-1"]).await?;
    match reply {
        Element::SimpleString(s) if s.starts_with("FULLRESYNC") => {}
        other => {
            return Err(Error::Replication(format!(
                "unexpected PSYNC reply: {other:?}"
            )))
        }
    }
    let snapshot = con
        .read_snapshot_payload()
        .await
        .map_err(|e| Error::Replication(format!("failed to read snapshot bulk: {e}")))?;
    log::info!("Received a {} byte snapshot from the leader", snapshot.len());
    Ok(())
}

async fn exchange<C>(con: &mut Connection<C>, args: &[&[u8]]) -> ServerResult<Element>
where
    C: crate::dbnet::BufferedSocketStream,
{
    con.write_raw(&resp::encode_argv_array(args)).await?;
    con.flush().await?;
    match con.read_element().await? {
        Some((element, _)) => Ok(element),
        None => Err(Error::Replication(
            "leader closed the link mid-handshake".to_owned(),
        )),
    }
}

/// `REPLCONF ACK <offset>`, sent in reply to a `GETACK` from the leader
pub fn encode_ack(offset: u64) -> Vec<u8> {
    resp::encode_argv_array(&[&b"REPLCONF"[..], b"ACK", offset.to_string().as_bytes()])
}
