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

use crate::config::ConfigurationSet;
use crate::corestore::Corestore;
use crate::dbnet;
use crate::diskstore;
use crate::replication::{self, ReplicationState, Role};
use crate::util::error::{Error, ServerResult};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[cfg(unix)]
use core::{future::Future, pin::Pin, task::Context, task::Poll};
#[cfg(unix)]
use tokio::signal::unix::{signal as fnsignal, Signal, SignalKind};

#[cfg(unix)]
/// Object to bind to unix-specific signals
pub struct UnixTerminationSignal {
    sigterm: Signal,
}

#[cfg(unix)]
impl UnixTerminationSignal {
    pub fn init() -> ServerResult<Self> {
        let sigterm = fnsignal(SignalKind::terminate())
            .map_err(|e| Error::OtherError(format!("failed to bind to signal: {e}")))?;
        Ok(Self { sigterm })
    }
}

#[cfg(unix)]
impl Future for UnixTerminationSignal {
    type Output = Option<()>;

    fn poll(mut self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Self::Output> {
        self.sigterm.poll_recv(ctx)
    }
}

/// Start the server, waiting for incoming connections or a termsig
pub async fn run(cfg: ConfigurationSet) -> ServerResult<()> {
    let role = if cfg.is_follower() {
        Role::Follower
    } else {
        Role::Leader
    };
    let snapshot_path = cfg.snapshot_path();
    let store = match diskstore::load_from_disk(&snapshot_path)? {
        Some(databases) => {
            log::info!("Loaded snapshot from {}", snapshot_path.display());
            Corestore::new(databases, cfg.clone(), ReplicationState::new(role))
        }
        None => {
            log::info!(
                "No snapshot at {}, starting with empty databases",
                snapshot_path.display()
            );
            Corestore::new_empty(cfg.clone(), ReplicationState::new(role))
        }
    };

    // initialize the broadcast channel
    let (signal, _) = broadcast::channel(1);

    // start the listener before dialing any leader, so our own accept
    // socket exists by the time the handshake advertises its port
    let mut server = dbnet::connect(
        cfg.host,
        cfg.port,
        dbnet::MAXIMUM_CONNECTION_LIMIT,
        store.clone(),
        signal.clone(),
    )
    .await?;

    let replication_handle = cfg.replicaof.clone().map(|(leader_host, leader_port)| {
        tokio::spawn(replication::replication_service(
            store.clone(),
            leader_host,
            leader_port,
            cfg.port,
            signal.subscribe(),
        ))
    });

    // bind the ctrlc handler
    let sig = tokio::signal::ctrl_c();

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = server.run() => {}
            result = replication_fate(replication_handle) => { result?; }
            _ = sig => {
                log::info!("Signalling all workers to shut down");
            }
        }
    }
    #[cfg(unix)]
    {
        let sigterm = UnixTerminationSignal::init()?;
        tokio::select! {
            _ = server.run() => {}
            result = replication_fate(replication_handle) => { result?; }
            _ = sig => {
                log::info!("Signalling all workers to shut down");
            }
            _ = sigterm => {
                log::info!("Termination signal received. Shutting down");
            }
        }
    }

    drop(signal);
    server.finish_with_termsig().await;
    Ok(())
}

/// Wait on the replication service if there is one; park forever otherwise
async fn replication_fate(handle: Option<JoinHandle<ServerResult<()>>>) -> ServerResult<()> {
    match handle {
        Some(handle) => match handle.await {
            Ok(result) => result,
            Err(e) => Err(Error::Replication(format!(
                "the replication task aborted: {e}"
            ))),
        },
        None => std::future::pending().await,
    }
}
