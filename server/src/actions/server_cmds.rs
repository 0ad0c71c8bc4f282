/*
 * Created on Thu Apr 07 2022
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

//! Server-surface actions: `PING`, `ECHO`, `CONFIG GET`, `INFO`,
//! `REPLCONF`, `PSYNC`, `WAIT`

use super::{ActionResult, Command};
use crate::corestore::{Corestore, Data};
use crate::dbnet::connection::Connection;
use crate::dbnet::BufferedSocketStream;
use crate::protocol::responses::{groups, usage};
use crate::queryengine::CommandParseError;
use crate::replication::EMPTY_SNAPSHOT;
use crate::resp::Integer64;

pub fn parse_ping(args: Vec<Data>) -> Result<Command, CommandParseError> {
    if !args.is_empty() {
        return Err(CommandParseError::Static(usage::PING));
    }
    Ok(Command::Ping)
}

pub fn parse_echo(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() != 1 {
        return Err(CommandParseError::Static(usage::ECHO));
    }
    Ok(Command::Echo {
        message: args.pop().unwrap(),
    })
}

pub fn parse_config_get(args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.is_empty() {
        return Err(CommandParseError::Static(usage::CONFIG_GET));
    }
    Ok(Command::ConfigGet { params: args })
}

pub fn parse_info(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() > 1 {
        return Err(CommandParseError::Static(usage::INFO));
    }
    Ok(Command::Info {
        section: args.pop(),
    })
}

pub fn parse_replconf(args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.is_empty() {
        return Err(CommandParseError::Static(usage::REPLCONF));
    }
    Ok(Command::ReplConf { args })
}

pub fn parse_psync(args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() != 2 {
        return Err(CommandParseError::Static(usage::PSYNC));
    }
    Ok(Command::Psync { args })
}

pub fn parse_wait(args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() != 2 {
        return Err(CommandParseError::Static(usage::WAIT));
    }
    let numreplicas =
        super::parse_number(&args[0]).ok_or(CommandParseError::Static(usage::WAIT))?;
    let timeout = super::parse_number(&args[1]).ok_or(CommandParseError::Static(usage::WAIT))?;
    Ok(Command::Wait {
        numreplicas,
        timeout,
    })
}

pub async fn ping<C: BufferedSocketStream>(con: &mut Connection<C>) -> ActionResult<()> {
    con.write_raw(groups::PONG).await?;
    Ok(())
}

pub async fn echo<C: BufferedSocketStream>(
    con: &mut Connection<C>,
    message: Data,
) -> ActionResult<()> {
    con.write_bulk(&message).await?;
    Ok(())
}

pub async fn config_get<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    params: Vec<Data>,
) -> ActionResult<()> {
    let mut pairs: Vec<(Data, String)> = Vec::new();
    for param in params {
        let name = String::from_utf8_lossy(&param).into_owned();
        if let Some(value) = store.config().get_param(&name) {
            pairs.push((param, value));
        }
    }
    con.write_array_header(pairs.len() * 2).await?;
    for (name, value) in pairs {
        con.write_bulk(&name).await?;
        con.write_bulk(value.as_bytes()).await?;
    }
    Ok(())
}

pub async fn info<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
) -> ActionResult<()> {
    let replication = store.replication();
    let body = format!(
        "role:{}\r\nmaster_replid:{}\r\nmaster_repl_offset:{}",
        replication.role_str(),
        replication.replid(),
        replication.offset()
    );
    con.write_bulk(body.as_bytes()).await?;
    Ok(())
}

pub async fn replconf<C: BufferedSocketStream>(con: &mut Connection<C>) -> ActionResult<()> {
    con.write_raw(groups::OK).await?;
    Ok(())
}

/// Reply `+FULLRESYNC`, then ship the empty snapshot as a headerless bulk:
/// `$<len>\r\n<bytes>` with no trailing CRLF. The dispatcher promotes the
/// connection into the follower set right after this returns
pub async fn psync<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
) -> ActionResult<()> {
    let replication = store.replication();
    con.write_simple_string(&format!("FULLRESYNC {} 0", replication.replid()))
        .await?;
    let mut header = Vec::with_capacity(16);
    header.push(b'$');
    header.extend_from_slice(&Integer64::from(EMPTY_SNAPSHOT.len()));
    header.extend_from_slice(b"\r\n");
    con.write_raw(&header).await?;
    con.write_raw(&EMPTY_SNAPSHOT).await?;
    Ok(())
}

pub async fn wait<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
) -> ActionResult<()> {
    con.write_integer(store.replication().follower_count() as i64)
        .await?;
    Ok(())
}
