/*
 * Created on Sat Apr 09 2022
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

//! # Database networking
//!
//! The listener accepts connections under a semaphore limit and spawns one
//! [`ConnectionHandler`] task per client. A handler's run loop multiplexes
//! three event sources: frames parsed off the socket, frames pushed at the
//! connection (pub/sub deliveries and, once promoted, the replication
//! stream), and the termination signal.

pub mod connection;
mod listener;

pub use listener::{connect, Listener};

use crate::actions::{ActionError, ActionResult, Command};
use crate::corestore::{Corestore, Data};
use crate::pubsub::ConnId;
use crate::queryengine::{self, transaction::TransactionSlot, CommandParseError};
use crate::replication;
use crate::util::IoResult;
use connection::Connection;
use std::collections::HashSet;
use std::io::{Error as IoError, ErrorKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use std::cell::Cell;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{broadcast, Semaphore};
use tokio::time;

pub const MAXIMUM_CONNECTION_LIMIT: usize = 50000;

/// This is a "marker trait" that ensures that no silly types are
/// passed into the [`Connection`] type
pub trait BufferedSocketStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl BufferedSocketStream for tokio::net::TcpStream {}
#[cfg(test)]
impl BufferedSocketStream for tokio::io::DuplexStream {}

/// Result of [`Connection::read_query`]
pub enum QueryResult {
    /// A parsed argument vector plus the bytes it occupied on the wire
    Q((Vec<Data>, usize)),
    /// The client disconnected between frames
    Disconnected,
    /// The stream produced bytes the protocol doesn't allow
    ProtocolError,
}

/// A backoff implementation that is meant to be used in connection loops
pub(self) struct NetBackoff {
    c: Cell<u8>,
}

impl NetBackoff {
    /// The maximum backoff duration
    const MAX_BACKOFF: u8 = 64;
    pub const fn new() -> Self {
        Self { c: Cell::new(1) }
    }
    /// Wait for the current backoff duration
    pub async fn spin(&self) {
        time::sleep(Duration::from_secs(self.c.get() as _)).await;
        self.c.set(self.c.get() << 1);
    }
    /// Should we disconnect the stream?
    pub fn should_disconnect(&self) -> bool {
        self.c.get() > Self::MAX_BACKOFF
    }
}

static CONN_ID: AtomicU64 = AtomicU64::new(0);

fn next_conn_id() -> ConnId {
    CONN_ID.fetch_add(1, Ordering::Relaxed)
}

/// Per-connection dispatcher state; dies with the connection task
pub struct ConnectionState {
    /// the connection's identity in the pub/sub and follower registries
    pub id: ConnId,
    /// the transaction slot
    pub txn: TransactionSlot,
    /// the channels this connection is subscribed to
    pub subscriptions: HashSet<Data>,
    /// the sending half of this connection's pushed-frame channel
    pub sink: UnboundedSender<Vec<u8>>,
}

/// One event the run loop can wake up on
enum Event {
    Packet(IoResult<QueryResult>),
    Push(Option<Vec<u8>>),
    Term,
}

/// A generic connection handler: one per live connection
pub struct ConnectionHandler<C> {
    /// an atomic reference to the shared in-memory engine
    pub(crate) store: Corestore,
    /// the connection
    pub(crate) con: Connection<C>,
    /// the dispatcher state
    pub(crate) state: ConnectionState,
    /// the receiving half of the pushed-frame channel
    rx: UnboundedReceiver<Vec<u8>>,
    /// the semaphore used to impose limits on number of connections
    climit: Arc<Semaphore>,
    /// check for termination signals
    termination_signal: broadcast::Receiver<()>,
    /// the sender we drop when we're done with handling a connection
    /// (used for graceful exit); absent on the replica link
    _term_sig_tx: Option<mpsc::Sender<()>>,
}

impl<C: BufferedSocketStream> ConnectionHandler<C> {
    pub fn new(
        store: Corestore,
        con: Connection<C>,
        climit: Arc<Semaphore>,
        termination_signal: broadcast::Receiver<()>,
        term_sig_tx: mpsc::Sender<()>,
    ) -> Self {
        let (sink, rx) = mpsc::unbounded_channel();
        ConnectionHandler {
            store,
            con,
            state: ConnectionState {
                id: next_conn_id(),
                txn: TransactionSlot::new(),
                subscriptions: HashSet::new(),
                sink,
            },
            rx,
            climit,
            termination_signal,
            _term_sig_tx: Some(term_sig_tx),
        }
    }

    /// A handler over the follower's upstream link. There is no listener
    /// behind this connection, so the connection-limit and drain plumbing
    /// are stand-ins
    pub fn for_replica_link(
        store: Corestore,
        con: Connection<C>,
        termination_signal: broadcast::Receiver<()>,
    ) -> Self {
        let (sink, rx) = mpsc::unbounded_channel();
        ConnectionHandler {
            store,
            con,
            state: ConnectionState {
                id: next_conn_id(),
                txn: TransactionSlot::new(),
                subscriptions: HashSet::new(),
                sink,
            },
            rx,
            climit: Arc::new(Semaphore::new(0)),
            termination_signal,
            _term_sig_tx: None,
        }
    }

    /// Split-borrow the pieces the query engine dispatches over
    pub(crate) fn parts(&mut self) -> (&Corestore, &mut Connection<C>, &mut ConnectionState) {
        (&self.store, &mut self.con, &mut self.state)
    }

    async fn next_event(&mut self) -> Event {
        let Self {
            con,
            rx,
            termination_signal,
            ..
        } = self;
        tokio::select! {
            packet = con.read_query() => Event::Packet(packet),
            frame = rx.recv() => Event::Push(frame),
            _ = termination_signal.recv() => Event::Term,
        }
    }

    /// The client run loop
    pub async fn run(&mut self) -> IoResult<()> {
        loop {
            match self.next_event().await {
                Event::Packet(packet) => match packet? {
                    QueryResult::Q((argv, _)) => {
                        let promote = self.dispatch(argv).await?;
                        self.con.flush().await?;
                        if promote {
                            return self.run_follower_sink().await;
                        }
                    }
                    QueryResult::Disconnected => return Ok(()),
                    QueryResult::ProtocolError => {
                        log::debug!("closing connection after a protocol error");
                        return Ok(());
                    }
                },
                Event::Push(Some(frame)) => {
                    self.con.write_raw_forced(&frame).await?;
                    self.con.flush().await?;
                }
                // we hold a sender ourselves, so the channel can't close
                Event::Push(None) => {}
                Event::Term => return Ok(()),
            }
        }
    }

    /// Parse and run one argument vector. Returns true if the connection
    /// completed a `PSYNC` and must become a follower sink
    async fn dispatch(&mut self, argv: Vec<Data>) -> IoResult<bool> {
        let cmd = match queryengine::parse_command(argv) {
            Ok(cmd) => cmd,
            Err(CommandParseError::Static(e)) => {
                self.con.write_raw(e).await?;
                return Ok(false);
            }
            Err(CommandParseError::UnknownCommand(name)) => {
                let e = format!("-ERR unknown command '{name}'\r\n");
                self.con.write_raw(e.as_bytes()).await?;
                return Ok(false);
            }
            Err(CommandParseError::UnknownSubcommand(name, subcommand)) => {
                let e = format!("-ERR unknown subcommand '{subcommand}' for '{name}'\r\n");
                self.con.write_raw(e.as_bytes()).await?;
                return Ok(false);
            }
        };
        if !self.state.subscriptions.is_empty() && !cmd.allowed_while_subscribed() {
            let e = format!(
                "-ERR Can't execute '{}': only (P|S)SUBSCRIBE / (P|S)UNSUBSCRIBE / PING / QUIT / RESET are allowed in this context\r\n",
                cmd.name()
            );
            self.con.write_raw(e.as_bytes()).await?;
            return Ok(false);
        }
        // queueing is the dispatcher's decision, not the command's
        if self.state.txn.is_active() && !cmd.is_txn_control() {
            self.state.txn.enqueue(cmd);
            self.con
                .write_raw(crate::protocol::responses::groups::QUEUED)
                .await?;
            return Ok(false);
        }
        let is_psync = matches!(cmd, Command::Psync { .. });
        match self.run_command(cmd).await {
            Ok(()) => {}
            Err(ActionError::ActionError(e)) => self.con.write_raw(e).await?,
            Err(ActionError::IoError(e)) => return Err(e),
        }
        Ok(is_psync)
    }

    /// Execute a command and, on success, propagate it if it was a write
    pub(crate) async fn run_command(&mut self, cmd: Command) -> ActionResult<()> {
        let wire = cmd.is_write().then(|| cmd.to_wire());
        queryengine::execute(self, cmd).await?;
        if let Some(frame) = wire {
            self.store.replication().propagate_write(&frame);
        }
        Ok(())
    }

    /// The post-`PSYNC` mode: forward propagated frames, swallow whatever
    /// the follower sends back
    async fn run_follower_sink(&mut self) -> IoResult<()> {
        log::info!("Connection promoted into the follower set");
        self.store
            .replication()
            .register_follower(self.state.id, self.state.sink.clone());
        loop {
            match self.next_event().await {
                Event::Packet(packet) => match packet? {
                    // follower chatter (ACK replies) is read and dropped
                    QueryResult::Q(_) => {}
                    QueryResult::Disconnected | QueryResult::ProtocolError => return Ok(()),
                },
                Event::Push(Some(frame)) => {
                    self.con.write_raw_forced(&frame).await?;
                    self.con.flush().await?;
                }
                Event::Push(None) => {}
                Event::Term => return Ok(()),
            }
        }
    }

    /// The follower's upstream loop: dispatch what the leader sends,
    /// account every processed byte, answer `GETACK` and nothing else
    pub async fn run_replica_link(&mut self) -> IoResult<()> {
        loop {
            match self.next_event().await {
                Event::Packet(packet) => match packet? {
                    QueryResult::Q((argv, advance)) => {
                        match queryengine::parse_command(argv) {
                            Ok(Command::ReplConf { args })
                                if args
                                    .first()
                                    .is_some_and(|arg| arg.eq_ignore_ascii_case(b"GETACK")) =>
                            {
                                let ack =
                                    replication::encode_ack(self.store.replication().offset());
                                self.con.write_raw_forced(&ack).await?;
                                self.con.flush().await?;
                            }
                            Ok(cmd) => match self.run_command(cmd).await {
                                // an action error has nowhere to go on a
                                // quiet link
                                Ok(()) | Err(ActionError::ActionError(_)) => {}
                                Err(ActionError::IoError(e)) => return Err(e),
                            },
                            Err(_) => {
                                log::trace!("ignoring an unparseable upstream command")
                            }
                        }
                        self.store.replication().add_offset(advance as u64);
                    }
                    QueryResult::Disconnected => {
                        log::warn!("the leader closed the replication link");
                        return Ok(());
                    }
                    QueryResult::ProtocolError => {
                        return Err(IoError::from(ErrorKind::InvalidData))
                    }
                },
                Event::Push(Some(frame)) => {
                    self.con.write_raw_forced(&frame).await?;
                    self.con.flush().await?;
                }
                Event::Push(None) => {}
                Event::Term => return Ok(()),
            }
        }
    }
}

impl<C> Drop for ConnectionHandler<C> {
    fn drop(&mut self) {
        // return the permit and scrub this connection out of the shared
        // registries, whatever path got us here
        self.climit.add_permits(1);
        self.store.pubsub().unsubscribe_all(self.state.id);
        self.store.replication().unregister_follower(self.state.id);
    }
}
