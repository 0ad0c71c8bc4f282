/*
 * Created on Sun Apr 10 2022
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

use super::{ConnectionHandler, NetBackoff};
use crate::corestore::Corestore;
use crate::dbnet::connection::Connection;
use crate::util::error::{Error, ServerResult};
use crate::util::IoResult;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Semaphore};

/// The base TCP listener
pub struct BaseListener {
    /// An atomic reference to the shared in-memory engine
    pub store: Corestore,
    /// The incoming connection listener (binding)
    pub listener: TcpListener,
    /// The maximum number of connections
    pub climit: Arc<Semaphore>,
    /// The shutdown broadcaster
    pub signal: broadcast::Sender<()>,
    // When all `Sender`s are dropped - the `Receiver` gets a `None` value;
    // we send a clone of `terminate_tx` to each handler
    pub terminate_tx: mpsc::Sender<()>,
    pub terminate_rx: mpsc::Receiver<()>,
}

impl BaseListener {
    pub async fn init(
        store: &Corestore,
        host: IpAddr,
        port: u16,
        maxcon: usize,
        signal: broadcast::Sender<()>,
    ) -> ServerResult<Self> {
        let (terminate_tx, terminate_rx) = mpsc::channel(1);
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| Error::ioerror_extra(e, format!("binding to port {port}")))?;
        Ok(Self {
            store: store.clone(),
            listener,
            climit: Arc::new(Semaphore::new(maxcon)),
            signal,
            terminate_tx,
            terminate_rx,
        })
    }
    /// Drop the shutdown plumbing and wait for the live handlers to drain
    pub async fn release_self(self) {
        let Self {
            mut terminate_rx,
            terminate_tx,
            signal,
            ..
        } = self;
        drop(signal);
        drop(terminate_tx);
        let _ = terminate_rx.recv().await;
    }
}

/// The server listener
pub struct Listener {
    pub base: BaseListener,
}

impl Listener {
    pub fn new(base: BaseListener) -> Self {
        Self { base }
    }
    /// Accept an incoming connection
    async fn accept(&mut self) -> IoResult<TcpStream> {
        let backoff = NetBackoff::new();
        loop {
            match self.base.listener.accept().await {
                // We don't need the bindaddr
                Ok((stream, _)) => return Ok(stream),
                Err(e) => {
                    if backoff.should_disconnect() {
                        // Too many retries, goodbye
                        return Err(e);
                    }
                }
            }
            // spin to wait for the backoff duration
            backoff.spin().await;
        }
    }
    /// Run the accept loop
    pub async fn run(&mut self) -> IoResult<()> {
        loop {
            // Take the permit first, but we won't use it right now, which
            // is why we immediately forget it (the handler's drop returns it)
            self.base.climit.acquire().await.unwrap().forget();
            /*
             Ignore accept errors here: a failed accept must not take the
             whole server down, and logging each one would flood the log
             under pressure. The backoff above bounds the retry storm.
            */
            let stream = match self.accept().await {
                Ok(stream) => stream,
                Err(_) => continue,
            };
            let mut chandle = ConnectionHandler::new(
                self.base.store.clone(),
                Connection::new(stream),
                self.base.climit.clone(),
                self.base.signal.subscribe(),
                self.base.terminate_tx.clone(),
            );
            tokio::spawn(async move {
                if let Err(e) = chandle.run().await {
                    log::error!("Error: {}", e);
                }
            });
        }
    }
    /// Signal the port to shut down and only return after the handlers
    /// have drained
    pub async fn finish_with_termsig(self) {
        self.base.release_self().await;
    }
}

/// Initialize the database networking
pub async fn connect(
    host: IpAddr,
    port: u16,
    maxcon: usize,
    store: Corestore,
    signal: broadcast::Sender<()>,
) -> ServerResult<Listener> {
    let base = BaseListener::init(&store, host, port, maxcon, signal).await?;
    let server = Listener::new(base);
    log::info!("Server started on {host}:{port}");
    Ok(server)
}
