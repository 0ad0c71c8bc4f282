/*
 * Created on Fri Apr 01 2022
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

//! List actions: `LPUSH`, `RPUSH`, `LPOP`, `LLEN`, `LRANGE`, `BLPOP`
//!
//! The pushes notify the key's waiters so that a parked `BLPOP` on another
//! connection can complete without polling.

use super::{err, parse_number, ActionResult, Command};
use crate::corestore::database::DbInner;
use crate::corestore::value::{List, Value};
use crate::corestore::{Corestore, Data};
use crate::dbnet::connection::Connection;
use crate::dbnet::BufferedSocketStream;
use crate::protocol::responses::{groups, usage};
use crate::queryengine::CommandParseError;
use std::time::Duration;

pub fn parse_lpush(args: Vec<Data>) -> Result<Command, CommandParseError> {
    let (key, elements) = parse_push_args(args, usage::LPUSH)?;
    Ok(Command::LPush { key, elements })
}

pub fn parse_rpush(args: Vec<Data>) -> Result<Command, CommandParseError> {
    let (key, elements) = parse_push_args(args, usage::RPUSH)?;
    Ok(Command::RPush { key, elements })
}

fn parse_push_args(
    mut args: Vec<Data>,
    usage: &'static [u8],
) -> Result<(Data, Vec<Data>), CommandParseError> {
    if args.len() < 2 {
        return Err(CommandParseError::Static(usage));
    }
    let elements = args.split_off(1);
    Ok((args.pop().unwrap(), elements))
}

pub fn parse_lpop(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    match args.len() {
        1 => Ok(Command::LPop {
            key: args.pop().unwrap(),
            count: None,
        }),
        2 => {
            let count = parse_number(&args[1])
                .ok_or(CommandParseError::Static(groups::NOT_POSITIVE_ERR))?;
            Ok(Command::LPop {
                key: args.swap_remove(0),
                count: Some(count),
            })
        }
        _ => Err(CommandParseError::Static(usage::LPOP)),
    }
}

pub fn parse_llen(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() != 1 {
        return Err(CommandParseError::Static(usage::LLEN));
    }
    Ok(Command::LLen {
        key: args.pop().unwrap(),
    })
}

pub fn parse_lrange(args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() != 3 {
        return Err(CommandParseError::Static(usage::LRANGE));
    }
    let start = parse_number(&args[1]).ok_or(CommandParseError::Static(groups::NOT_AN_INT_ERR))?;
    let stop = parse_number(&args[2]).ok_or(CommandParseError::Static(groups::NOT_AN_INT_ERR))?;
    Ok(Command::LRange {
        key: args.into_iter().next().unwrap(),
        start,
        stop,
    })
}

pub fn parse_blpop(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() != 2 {
        return Err(CommandParseError::Static(usage::BLPOP));
    }
    let secs: f64 =
        parse_number(&args[1]).ok_or(CommandParseError::Static(groups::BAD_TIMEOUT_ERR))?;
    // zero means "wait forever"; anything negative, non-finite or absurd
    // is rejected by the conversion
    let timeout = if secs == 0.0 {
        None
    } else {
        Some(
            Duration::try_from_secs_f64(secs)
                .map_err(|_| CommandParseError::Static(groups::BAD_TIMEOUT_ERR))?,
        )
    };
    Ok(Command::BLPop {
        key: args.swap_remove(0),
        timeout,
    })
}

pub async fn lpush<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
    elements: Vec<Data>,
) -> ActionResult<()> {
    push(store, con, key, elements, true).await
}

pub async fn rpush<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
    elements: Vec<Data>,
) -> ActionResult<()> {
    push(store, con, key, elements, false).await
}

async fn push<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
    elements: Vec<Data>,
    at_head: bool,
) -> ActionResult<()> {
    let len = {
        let mut db = store.default_database().lock().await;
        let len = match db.setdefault_with(&key, || Value::List(List::new())) {
            Value::List(list) => {
                if at_head {
                    list.lpush(elements);
                } else {
                    list.rpush(elements);
                }
                list.len()
            }
            _ => return err(groups::WRONGTYPE_ERR),
        };
        db.notify(&key);
        len
    };
    con.write_integer(len as i64).await?;
    Ok(())
}

pub async fn lpop<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
    count: Option<usize>,
) -> ActionResult<()> {
    enum Popped {
        Missing,
        One(Data),
        Many(Vec<Data>),
    }
    let popped = {
        let mut db = store.default_database().lock().await;
        let popped = match db.get_mut(&key) {
            Some(Value::List(list)) => match count {
                None => list.lpop().map_or(Popped::Missing, Popped::One),
                Some(count) => Popped::Many(list.lpop_count(count)),
            },
            Some(_) => return err(groups::WRONGTYPE_ERR),
            None => Popped::Missing,
        };
        remove_if_drained(&mut db, &key);
        popped
    };
    match popped {
        Popped::Missing if count.is_some() => con.write_raw(groups::NIL_ARRAY).await?,
        Popped::Missing => con.write_raw(groups::NIL_BULK).await?,
        Popped::One(element) => con.write_bulk(&element).await?,
        Popped::Many(elements) => {
            con.write_array_header(elements.len()).await?;
            for element in elements {
                con.write_bulk(&element).await?;
            }
        }
    }
    Ok(())
}

pub async fn llen<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
) -> ActionResult<()> {
    let len = {
        let mut db = store.default_database().lock().await;
        match db.get(&key) {
            Some(Value::List(list)) => list.len(),
            Some(_) => return err(groups::WRONGTYPE_ERR),
            None => 0,
        }
    };
    con.write_integer(len as i64).await?;
    Ok(())
}

pub async fn lrange<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
    start: i64,
    stop: i64,
) -> ActionResult<()> {
    let elements = {
        let mut db = store.default_database().lock().await;
        match db.get(&key) {
            Some(Value::List(list)) => list.get_range(start, stop),
            Some(_) => return err(groups::WRONGTYPE_ERR),
            None => Vec::new(),
        }
    };
    con.write_array_header(elements.len()).await?;
    for element in elements {
        con.write_bulk(&element).await?;
    }
    Ok(())
}

pub async fn blpop<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
    timeout: Option<Duration>,
) -> ActionResult<()> {
    let db = store.default_database();
    let mut guard = db.lock().await;
    // a wrong-typed value is an immediate error, not something to wait out
    if matches!(guard.get(&key), Some(value) if !matches!(value, Value::List(_))) {
        return err(groups::WRONGTYPE_ERR);
    }
    let (guard, popped) = db
        .wait_for(guard, &key, timeout, |inner| {
            let popped = match inner.get_mut(&key) {
                Some(Value::List(list)) => list.lpop(),
                _ => None,
            };
            if popped.is_some() {
                remove_if_drained(inner, &key);
            }
            popped
        })
        .await;
    drop(guard);
    match popped {
        Some(element) => {
            con.write_array_header(2).await?;
            con.write_bulk(&key).await?;
            con.write_bulk(&element).await?;
        }
        None => con.write_raw(groups::NIL_ARRAY).await?,
    }
    Ok(())
}

/// Lists collapse to absent once emptied by a pop
fn remove_if_drained(db: &mut DbInner, key: &Data) {
    if matches!(db.get(key), Some(Value::List(list)) if list.is_empty()) {
        db.remove(key);
    }
}
