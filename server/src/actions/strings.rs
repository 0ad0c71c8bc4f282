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

//! String actions: `SET`, `GET`, `INCR`

use super::{err, parse_number, ActionResult, Command};
use crate::corestore::expiry::Expiry;
use crate::corestore::value::{Str, Value};
use crate::corestore::{Corestore, Data};
use crate::dbnet::connection::Connection;
use crate::dbnet::BufferedSocketStream;
use crate::protocol::responses::{groups, usage};
use crate::queryengine::CommandParseError;

pub fn parse_set(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    match args.len() {
        2 => {
            let value = args.pop().unwrap();
            let key = args.pop().unwrap();
            Ok(Command::Set {
                key,
                value,
                px: None,
            })
        }
        4 if args[2].eq_ignore_ascii_case(b"PX") => {
            let px = parse_number(&args[3])
                .ok_or(CommandParseError::Static(groups::NOT_AN_INT_ERR))?;
            Ok(Command::Set {
                key: args[0].clone(),
                value: args[1].clone(),
                px: Some(px),
            })
        }
        _ => Err(CommandParseError::Static(usage::SET)),
    }
}

pub fn parse_get(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() != 1 {
        return Err(CommandParseError::Static(usage::GET));
    }
    Ok(Command::Get {
        key: args.pop().unwrap(),
    })
}

pub fn parse_incr(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() != 1 {
        return Err(CommandParseError::Static(usage::INCR));
    }
    Ok(Command::Incr {
        key: args.pop().unwrap(),
    })
}

pub async fn set<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
    value: Data,
    px: Option<i64>,
) -> ActionResult<()> {
    {
        let mut db = store.default_database().lock().await;
        let expiry = px.map(Expiry::after_millis);
        db.set(key, Value::Str(Str::new(value.as_ref())), expiry);
    }
    con.write_raw(groups::OK).await?;
    Ok(())
}

pub async fn get<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
) -> ActionResult<()> {
    let value = {
        let mut db = store.default_database().lock().await;
        match db.get(&key) {
            Some(Value::Str(s)) => Some(s.as_bytes().to_vec()),
            Some(_) => return err(groups::WRONGTYPE_ERR),
            None => None,
        }
    };
    match value {
        Some(value) => con.write_bulk(&value).await?,
        None => con.write_raw(groups::NIL_BULK).await?,
    }
    Ok(())
}

pub async fn incr<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
) -> ActionResult<()> {
    let new = {
        let mut db = store.default_database().lock().await;
        match db.setdefault_with(&key, || Value::Str(Str::new(&b"0"[..]))) {
            Value::Str(s) => match s.incr() {
                Ok(new) => new,
                Err(()) => return err(groups::NOT_AN_INT_ERR),
            },
            _ => return err(groups::WRONGTYPE_ERR),
        }
    };
    con.write_integer(new).await?;
    Ok(())
}
