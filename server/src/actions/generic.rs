/*
 * Created on Wed Apr 06 2022
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

//! Generic keyspace actions: `KEYS`, `TYPE`

use super::{ActionResult, Command};
use crate::corestore::{Corestore, Data};
use crate::dbnet::connection::Connection;
use crate::dbnet::BufferedSocketStream;
use crate::protocol::responses::usage;
use crate::queryengine::CommandParseError;
use crate::util::glob_match;

pub fn parse_keys(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() != 1 {
        return Err(CommandParseError::Static(usage::KEYS));
    }
    Ok(Command::Keys {
        pattern: args.pop().unwrap(),
    })
}

pub fn parse_type(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() != 1 {
        return Err(CommandParseError::Static(usage::TYPE));
    }
    Ok(Command::Type {
        key: args.pop().unwrap(),
    })
}

pub async fn keys<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    pattern: Data,
) -> ActionResult<()> {
    let matching: Vec<Data> = {
        let mut db = store.default_database().lock().await;
        db.keys()
            .into_iter()
            .filter(|key| glob_match(&pattern, key))
            .collect()
    };
    con.write_array_header(matching.len()).await?;
    for key in matching {
        con.write_bulk(&key).await?;
    }
    Ok(())
}

pub async fn type_of<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
) -> ActionResult<()> {
    let type_name = {
        let mut db = store.default_database().lock().await;
        db.get(&key).map_or("none", |value| value.type_name())
    };
    con.write_simple_string(type_name).await?;
    Ok(())
}
