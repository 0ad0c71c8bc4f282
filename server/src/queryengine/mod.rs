/*
 * Created on Fri Apr 08 2022
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

//! # The query engine
//!
//! The bridge between raw argument vectors and actions. [`parse_command`]
//! is the static dispatch table (two-level for the namespaced `CONFIG`
//! family); [`execute`] routes a parsed [`Command`] to its action. The
//! transaction verbs are handled here because they operate on the
//! dispatcher's own state rather than the keyspace.

pub mod transaction;
#[cfg(test)]
mod tests;

use crate::actions::{
    generic, lists, pubsub_cmds, server_cmds, sorted_sets, streams, strings, ActionError,
    ActionResult, Command,
};
use crate::corestore::Data;
use crate::dbnet::{BufferedSocketStream, ConnectionHandler};
use crate::protocol::responses::groups;
use core::future::Future;
use core::pin::Pin;

/// A command that didn't parse
#[derive(Debug, PartialEq)]
pub enum CommandParseError {
    /// A pre-encoded (usage or domain) error to hand to the client
    Static(&'static [u8]),
    /// No such command
    UnknownCommand(String),
    /// No such subcommand under a namespaced command
    UnknownSubcommand(String, String),
}

/// Parse an argument vector into a typed command
///
/// The first argument names the command, case-insensitively; `CONFIG`
/// consumes a second argument as the subcommand.
pub fn parse_command(mut argv: Vec<Data>) -> Result<Command, CommandParseError> {
    let name = argv.remove(0);
    let name = String::from_utf8_lossy(&name).into_owned();
    let args = argv;
    match name.to_uppercase().as_str() {
        "PING" => server_cmds::parse_ping(args),
        "ECHO" => server_cmds::parse_echo(args),
        "SET" => strings::parse_set(args),
        "GET" => strings::parse_get(args),
        "INCR" => strings::parse_incr(args),
        "LPUSH" => lists::parse_lpush(args),
        "RPUSH" => lists::parse_rpush(args),
        "LPOP" => lists::parse_lpop(args),
        "LLEN" => lists::parse_llen(args),
        "LRANGE" => lists::parse_lrange(args),
        "BLPOP" => lists::parse_blpop(args),
        "ZADD" => sorted_sets::parse_zadd(args),
        "ZRANK" => sorted_sets::parse_zrank(args),
        "ZRANGE" => sorted_sets::parse_zrange(args),
        "ZSCORE" => sorted_sets::parse_zscore(args),
        "ZREM" => sorted_sets::parse_zrem(args),
        "ZCARD" => sorted_sets::parse_zcard(args),
        "XADD" => streams::parse_xadd(args),
        "XRANGE" => streams::parse_xrange(args),
        "XREAD" => streams::parse_xread(args),
        "KEYS" => generic::parse_keys(args),
        "TYPE" => generic::parse_type(args),
        "MULTI" => parse_bare(args, Command::Multi),
        "EXEC" => parse_bare(args, Command::Exec),
        "DISCARD" => parse_bare(args, Command::Discard),
        "SUBSCRIBE" => pubsub_cmds::parse_subscribe(args),
        "UNSUBSCRIBE" => pubsub_cmds::parse_unsubscribe(args),
        "PUBLISH" => pubsub_cmds::parse_publish(args),
        "CONFIG" => parse_config(name, args),
        "INFO" => server_cmds::parse_info(args),
        "REPLCONF" => server_cmds::parse_replconf(args),
        "PSYNC" => server_cmds::parse_psync(args),
        "WAIT" => server_cmds::parse_wait(args),
        _ => Err(CommandParseError::UnknownCommand(name)),
    }
}

fn parse_bare(args: Vec<Data>, cmd: Command) -> Result<Command, CommandParseError> {
    if !args.is_empty() {
        let usage = match cmd {
            Command::Multi => crate::protocol::responses::usage::MULTI,
            Command::Exec => crate::protocol::responses::usage::EXEC,
            _ => crate::protocol::responses::usage::DISCARD,
        };
        return Err(CommandParseError::Static(usage));
    }
    Ok(cmd)
}

/// The second dispatch level for the `CONFIG` namespace
fn parse_config(name: String, mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.is_empty() {
        return Err(CommandParseError::UnknownSubcommand(name, String::new()));
    }
    let subcommand = args.remove(0);
    let subcommand = String::from_utf8_lossy(&subcommand).into_owned();
    match subcommand.to_uppercase().as_str() {
        "GET" => server_cmds::parse_config_get(args),
        _ => Err(CommandParseError::UnknownSubcommand(name, subcommand)),
    }
}

/// Execute one command against the handler's connection and store
///
/// The transaction verbs run inline because they drive the dispatcher's
/// own queue; everything else fans out to its action module.
pub async fn execute<C: BufferedSocketStream>(
    handler: &mut ConnectionHandler<C>,
    cmd: Command,
) -> ActionResult<()> {
    match cmd {
        Command::Multi => {
            if !handler.state.txn.start() {
                return Err(ActionError::ActionError(groups::MULTI_NESTED_ERR));
            }
            handler.con.write_raw(groups::OK).await?;
            Ok(())
        }
        Command::Exec => exec(handler).await,
        Command::Discard => {
            if !handler.state.txn.discard() {
                return Err(ActionError::ActionError(groups::DISCARD_WITHOUT_MULTI_ERR));
            }
            handler.con.write_raw(groups::OK).await?;
            Ok(())
        }
        cmd => {
            let (store, con, state) = handler.parts();
            match cmd {
                Command::Ping => server_cmds::ping(con).await,
                Command::Echo { message } => server_cmds::echo(con, message).await,
                Command::Set { key, value, px } => strings::set(store, con, key, value, px).await,
                Command::Get { key } => strings::get(store, con, key).await,
                Command::Incr { key } => strings::incr(store, con, key).await,
                Command::LPush { key, elements } => lists::lpush(store, con, key, elements).await,
                Command::RPush { key, elements } => lists::rpush(store, con, key, elements).await,
                Command::LPop { key, count } => lists::lpop(store, con, key, count).await,
                Command::LLen { key } => lists::llen(store, con, key).await,
                Command::LRange { key, start, stop } => {
                    lists::lrange(store, con, key, start, stop).await
                }
                Command::BLPop { key, timeout } => lists::blpop(store, con, key, timeout).await,
                Command::ZAdd { key, pairs } => sorted_sets::zadd(store, con, key, pairs).await,
                Command::ZRank { key, member } => sorted_sets::zrank(store, con, key, member).await,
                Command::ZRange { key, start, stop } => {
                    sorted_sets::zrange(store, con, key, start, stop).await
                }
                Command::ZScore { key, member } => {
                    sorted_sets::zscore(store, con, key, member).await
                }
                Command::ZRem { key, members } => sorted_sets::zrem(store, con, key, members).await,
                Command::ZCard { key } => sorted_sets::zcard(store, con, key).await,
                Command::XAdd { key, id, fields } => {
                    streams::xadd(store, con, key, id, fields).await
                }
                Command::XRange { key, start, end } => {
                    streams::xrange(store, con, key, start, end).await
                }
                Command::XRead {
                    block_ms,
                    keys,
                    ids,
                } => streams::xread(store, con, block_ms, keys, ids).await,
                Command::Keys { pattern } => generic::keys(store, con, pattern).await,
                Command::Type { key } => generic::type_of(store, con, key).await,
                Command::Subscribe { channel } => {
                    pubsub_cmds::subscribe(store, con, state, channel).await
                }
                Command::Unsubscribe { channel } => {
                    pubsub_cmds::unsubscribe(store, con, state, channel).await
                }
                Command::Publish { channel, message } => {
                    pubsub_cmds::publish(store, con, channel, message).await
                }
                Command::ConfigGet { params } => server_cmds::config_get(store, con, params).await,
                Command::Info { .. } => server_cmds::info(store, con).await,
                Command::ReplConf { .. } => server_cmds::replconf(con).await,
                Command::Psync { .. } => server_cmds::psync(store, con).await,
                Command::Wait { .. } => server_cmds::wait(store, con).await,
                Command::Multi | Command::Exec | Command::Discard => unreachable!(),
            }
        }
    }
}

/// A boxed [`execute`], breaking the `EXEC` → `execute` recursion
fn execute_boxed<'h, C: BufferedSocketStream>(
    handler: &'h mut ConnectionHandler<C>,
    cmd: Command,
) -> Pin<Box<dyn Future<Output = ActionResult<()>> + Send + 'h>> {
    Box::pin(execute(handler, cmd))
}

/// `EXEC`: drain the queue, replying with one array element per queued
/// command. A failing element contributes its error and execution moves
/// on; there is no rollback
async fn exec<C: BufferedSocketStream>(handler: &mut ConnectionHandler<C>) -> ActionResult<()> {
    let Some(queue) = handler.state.txn.take() else {
        return Err(ActionError::ActionError(groups::EXEC_WITHOUT_MULTI_ERR));
    };
    handler.con.write_array_header(queue.len()).await?;
    for queued in queue {
        let wire = queued.is_write().then(|| queued.to_wire());
        match execute_boxed(handler, queued).await {
            Ok(()) => {
                if let Some(frame) = wire {
                    handler.store.replication().propagate_write(&frame);
                }
            }
            Err(ActionError::ActionError(e)) => handler.con.write_raw(e).await?,
            Err(ActionError::IoError(e)) => return Err(ActionError::IoError(e)),
        }
    }
    Ok(())
}
