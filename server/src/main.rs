/*
 * Created on Tue Mar 15 2022
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

//! # Cardinal
//!
//! The `cardinald` crate (or the `server` folder) is Cardinal's database
//! server. There are several modules within this crate; see the modules for
//! their respective documentation.

use env_logger::Builder;
use libcardinal::{URL, VERSION};
use std::env;
use std::process;

mod actions;
mod arbiter;
mod config;
mod corestore;
mod dbnet;
mod diskstore;
mod protocol;
mod pubsub;
mod queryengine;
mod replication;
mod resp;
mod util;

pub use util::IoResult;

fn main() {
    Builder::new()
        .parse_filters(&env::var("CARDINAL_LOG").unwrap_or_else(|_| "info".to_owned()))
        .init();
    log::info!("Cardinal v{} | {}", VERSION, URL);
    let cfg = match config::get_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            log::error!("{}", util::error::Error::Config(e.to_string()));
            process::exit(0x01);
        }
    };
    if let Some((host, port)) = &cfg.replicaof {
        log::info!("Starting in follower mode, replicating from {host}:{port}");
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("server")
        .enable_all()
        .build()
        .unwrap();
    if let Err(e) = runtime.block_on(arbiter::run(cfg)) {
        log::error!("The server terminated with an error: {e}");
        process::exit(0x01);
    }
    log::info!("Goodbye :)");
}
