/*
 * Created on Thu Mar 31 2022
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

//! # Actions
//!
//! Actions are the commands the server speaks: you provide arguments, they
//! mutate or read the keyspace and write a reply. This module holds the
//! closed [`Command`] family and its per-family submodules; parsing lives
//! with each family, dispatch lives in the query engine.

pub mod generic;
pub mod lists;
pub mod pubsub_cmds;
pub mod server_cmds;
pub mod sorted_sets;
pub mod streams;
pub mod strings;

use crate::corestore::Data;
use crate::resp;
use std::io::Error as IoError;
use std::str::FromStr;
use std::time::Duration;

/// A generic result for actions
pub type ActionResult<T> = Result<T, ActionError>;

/// Errors that can occur while running actions
#[derive(Debug)]
pub enum ActionError {
    /// A pre-encoded wire error to send to the client
    ActionError(&'static [u8]),
    IoError(IoError),
}

impl PartialEq for ActionError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::ActionError(a1), Self::ActionError(a2)) => a1 == a2,
            (Self::IoError(ioe1), Self::IoError(ioe2)) => ioe1.to_string() == ioe2.to_string(),
            _ => false,
        }
    }
}

impl From<&'static [u8]> for ActionError {
    fn from(e: &'static [u8]) -> Self {
        Self::ActionError(e)
    }
}

impl From<IoError> for ActionError {
    fn from(e: IoError) -> Self {
        Self::IoError(e)
    }
}

pub fn err<T>(e: &'static [u8]) -> ActionResult<T> {
    Err(ActionError::ActionError(e))
}

/// Parse an argument as a number, without trimming anything
pub fn parse_number<T: FromStr>(arg: &[u8]) -> Option<T> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

/// The closed command family
///
/// Every variant carries its parsed arguments. A command knows whether it
/// mutates (and must be propagated), how to re-encode itself canonically
/// for the replication stream, and what it's called for error texts.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ping,
    Echo { message: Data },
    Set { key: Data, value: Data, px: Option<i64> },
    Get { key: Data },
    Incr { key: Data },
    LPush { key: Data, elements: Vec<Data> },
    RPush { key: Data, elements: Vec<Data> },
    LPop { key: Data, count: Option<usize> },
    LLen { key: Data },
    LRange { key: Data, start: i64, stop: i64 },
    BLPop { key: Data, timeout: Option<Duration> },
    ZAdd { key: Data, pairs: Vec<(f64, Data)> },
    ZRank { key: Data, member: Data },
    ZRange { key: Data, start: i64, stop: i64 },
    ZScore { key: Data, member: Data },
    ZRem { key: Data, members: Vec<Data> },
    ZCard { key: Data },
    XAdd { key: Data, id: Data, fields: Vec<(Data, Data)> },
    XRange { key: Data, start: Data, end: Data },
    XRead { block_ms: Option<u64>, keys: Vec<Data>, ids: Vec<Data> },
    Keys { pattern: Data },
    Type { key: Data },
    Multi,
    Exec,
    Discard,
    Subscribe { channel: Data },
    Unsubscribe { channel: Data },
    Publish { channel: Data, message: Data },
    ConfigGet { params: Vec<Data> },
    Info { section: Option<Data> },
    ReplConf { args: Vec<Data> },
    Psync { args: Vec<Data> },
    Wait { numreplicas: u64, timeout: u64 },
}

impl Command {
    /// The lowercase command name, for error texts
    pub const fn name(&self) -> &'static str {
        match self {
            Command::Ping => "ping",
            Command::Echo { .. } => "echo",
            Command::Set { .. } => "set",
            Command::Get { .. } => "get",
            Command::Incr { .. } => "incr",
            Command::LPush { .. } => "lpush",
            Command::RPush { .. } => "rpush",
            Command::LPop { .. } => "lpop",
            Command::LLen { .. } => "llen",
            Command::LRange { .. } => "lrange",
            Command::BLPop { .. } => "blpop",
            Command::ZAdd { .. } => "zadd",
            Command::ZRank { .. } => "zrank",
            Command::ZRange { .. } => "zrange",
            Command::ZScore { .. } => "zscore",
            Command::ZRem { .. } => "zrem",
            Command::ZCard { .. } => "zcard",
            Command::XAdd { .. } => "xadd",
            Command::XRange { .. } => "xrange",
            Command::XRead { .. } => "xread",
            Command::Keys { .. } => "keys",
            Command::Type { .. } => "type",
            Command::Multi => "multi",
            Command::Exec => "exec",
            Command::Discard => "discard",
            Command::Subscribe { .. } => "subscribe",
            Command::Unsubscribe { .. } => "unsubscribe",
            Command::Publish { .. } => "publish",
            Command::ConfigGet { .. } => "config|get",
            Command::Info { .. } => "info",
            Command::ReplConf { .. } => "replconf",
            Command::Psync { .. } => "psync",
            Command::Wait { .. } => "wait",
        }
    }
    /// Is this a mutator that must be propagated to followers?
    ///
    /// Blocking pops are deliberately not propagated: replaying a `BLPOP`
    /// against a follower's keyspace could park its upstream loop forever.
    pub const fn is_write(&self) -> bool {
        matches!(
            self,
            Command::Set { .. }
                | Command::Incr { .. }
                | Command::LPush { .. }
                | Command::RPush { .. }
                | Command::LPop { .. }
                | Command::ZAdd { .. }
                | Command::ZRem { .. }
                | Command::XAdd { .. }
        )
    }
    /// Is this one of the transaction control verbs that never queue?
    pub const fn is_txn_control(&self) -> bool {
        matches!(self, Command::Multi | Command::Exec | Command::Discard)
    }
    /// May this run on a connection with active subscriptions?
    pub const fn allowed_while_subscribed(&self) -> bool {
        matches!(
            self,
            Command::Subscribe { .. } | Command::Unsubscribe { .. } | Command::Ping
        )
    }
    /// The canonical wire form: an array of bulk strings, exactly as a
    /// client would have sent it
    pub fn to_wire(&self) -> Vec<u8> {
        resp::encode_argv_array(&self.argv())
    }

    fn argv(&self) -> Vec<Data> {
        fn num(n: impl ToString) -> Data {
            Data::from_string(n.to_string())
        }
        let mut argv: Vec<Data> = vec![Data::from_static(self.wire_name())];
        match self {
            Command::Ping | Command::Multi | Command::Exec | Command::Discard => {}
            Command::Echo { message } => argv.push(message.clone()),
            Command::Set { key, value, px } => {
                argv.push(key.clone());
                argv.push(value.clone());
                if let Some(px) = px {
                    argv.push(Data::from_static(b"PX"));
                    argv.push(num(px));
                }
            }
            Command::Get { key }
            | Command::Incr { key }
            | Command::LLen { key }
            | Command::ZCard { key }
            | Command::Type { key } => argv.push(key.clone()),
            Command::LPush { key, elements } | Command::RPush { key, elements } => {
                argv.push(key.clone());
                argv.extend(elements.iter().cloned());
            }
            Command::LPop { key, count } => {
                argv.push(key.clone());
                if let Some(count) = count {
                    argv.push(num(count));
                }
            }
            Command::LRange { key, start, stop } | Command::ZRange { key, start, stop } => {
                argv.push(key.clone());
                argv.push(num(start));
                argv.push(num(stop));
            }
            Command::BLPop { key, timeout } => {
                argv.push(key.clone());
                argv.push(num(timeout.map_or(0.0, |t| t.as_secs_f64())));
            }
            Command::ZAdd { key, pairs } => {
                argv.push(key.clone());
                for (score, member) in pairs {
                    argv.push(Data::from_string(sorted_sets::format_score(*score)));
                    argv.push(member.clone());
                }
            }
            Command::ZRank { key, member } | Command::ZScore { key, member } => {
                argv.push(key.clone());
                argv.push(member.clone());
            }
            Command::ZRem { key, members } => {
                argv.push(key.clone());
                argv.extend(members.iter().cloned());
            }
            Command::XAdd { key, id, fields } => {
                argv.push(key.clone());
                argv.push(id.clone());
                for (field, value) in fields {
                    argv.push(field.clone());
                    argv.push(value.clone());
                }
            }
            Command::XRange { key, start, end } => {
                argv.push(key.clone());
                argv.push(start.clone());
                argv.push(end.clone());
            }
            Command::XRead { block_ms, keys, ids } => {
                if let Some(block_ms) = block_ms {
                    argv.push(Data::from_static(b"BLOCK"));
                    argv.push(num(block_ms));
                }
                argv.push(Data::from_static(b"STREAMS"));
                argv.extend(keys.iter().cloned());
                argv.extend(ids.iter().cloned());
            }
            Command::Keys { pattern } => argv.push(pattern.clone()),
            Command::Subscribe { channel } | Command::Unsubscribe { channel } => {
                argv.push(channel.clone())
            }
            Command::Publish { channel, message } => {
                argv.push(channel.clone());
                argv.push(message.clone());
            }
            Command::ConfigGet { params } => {
                argv.push(Data::from_static(b"GET"));
                argv.extend(params.iter().cloned());
            }
            Command::Info { section } => {
                if let Some(section) = section {
                    argv.push(section.clone());
                }
            }
            Command::ReplConf { args } | Command::Psync { args } => {
                argv.extend(args.iter().cloned())
            }
            Command::Wait {
                numreplicas,
                timeout,
            } => {
                argv.push(num(numreplicas));
                argv.push(num(timeout));
            }
        }
        argv
    }

    const fn wire_name(&self) -> &'static [u8] {
        match self {
            Command::Ping => b"PING",
            Command::Echo { .. } => b"ECHO",
            Command::Set { .. } => b"SET",
            Command::Get { .. } => b"GET",
            Command::Incr { .. } => b"INCR",
            Command::LPush { .. } => b"LPUSH",
            Command::RPush { .. } => b"RPUSH",
            Command::LPop { .. } => b"LPOP",
            Command::LLen { .. } => b"LLEN",
            Command::LRange { .. } => b"LRANGE",
            Command::BLPop { .. } => b"BLPOP",
            Command::ZAdd { .. } => b"ZADD",
            Command::ZRank { .. } => b"ZRANK",
            Command::ZRange { .. } => b"ZRANGE",
            Command::ZScore { .. } => b"ZSCORE",
            Command::ZRem { .. } => b"ZREM",
            Command::ZCard { .. } => b"ZCARD",
            Command::XAdd { .. } => b"XADD",
            Command::XRange { .. } => b"XRANGE",
            Command::XRead { .. } => b"XREAD",
            Command::Keys { .. } => b"KEYS",
            Command::Type { .. } => b"TYPE",
            Command::Multi => b"MULTI",
            Command::Exec => b"EXEC",
            Command::Discard => b"DISCARD",
            Command::Subscribe { .. } => b"SUBSCRIBE",
            Command::Unsubscribe { .. } => b"UNSUBSCRIBE",
            Command::Publish { .. } => b"PUBLISH",
            Command::ConfigGet { .. } => b"CONFIG",
            Command::Info { .. } => b"INFO",
            Command::ReplConf { .. } => b"REPLCONF",
            Command::Psync { .. } => b"PSYNC",
            Command::Wait { .. } => b"WAIT",
        }
    }
}
