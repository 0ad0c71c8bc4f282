/*
 * Created on Tue Apr 05 2022
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

//! Stream actions: `XADD`, `XRANGE`, `XREAD`
//!
//! Entry IDs have three spellings on the wire: fully explicit `ms-seq`,
//! partially auto-generated `ms-*`, and fully auto-generated `*` (which
//! takes the wall clock, clamped so IDs never run backwards). Range bounds
//! have their own spellings (`-`, `+`, bare `ms`) which normalize onto the
//! stream's half-open window primitive.

use super::{err, parse_number, ActionResult, Command};
use crate::corestore::expiry::now_millis;
use crate::corestore::stream::{EntryId, Stream, StreamEntry};
use crate::corestore::value::Value;
use crate::corestore::{Corestore, Data};
use crate::dbnet::connection::Connection;
use crate::dbnet::BufferedSocketStream;
use crate::protocol::responses::{groups, usage};
use crate::queryengine::CommandParseError;
use std::time::Duration;

/// An `XADD` entry-ID argument
enum IdArg {
    /// `*`: both halves from the stream and the wall clock
    Auto,
    /// `<ms>-*`: explicit milliseconds, generated sequence
    AutoSeq(u64),
    /// `<ms>-<seq>`
    Explicit(EntryId),
}

pub fn parse_xadd(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() < 4 || args.len() % 2 != 0 {
        return Err(CommandParseError::Static(usage::XADD));
    }
    let rest = args.split_off(2);
    let id = args.pop().unwrap();
    let key = args.pop().unwrap();
    let mut fields = Vec::with_capacity(rest.len() / 2);
    let mut iter = rest.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        fields.push((field, value));
    }
    Ok(Command::XAdd { key, id, fields })
}

pub fn parse_xrange(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() != 3 {
        return Err(CommandParseError::Static(usage::XRANGE));
    }
    let end = args.pop().unwrap();
    let start = args.pop().unwrap();
    Ok(Command::XRange {
        key: args.pop().unwrap(),
        start,
        end,
    })
}

pub fn parse_xread(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    let block_ms = if args.first().is_some_and(|arg| arg.eq_ignore_ascii_case(b"BLOCK")) {
        if args.len() < 2 {
            return Err(CommandParseError::Static(usage::XREAD));
        }
        let ms = parse_number(&args[1])
            .ok_or(CommandParseError::Static(groups::BAD_TIMEOUT_ERR))?;
        args.drain(..2);
        Some(ms)
    } else {
        None
    };
    if args.len() < 3
        || args.len() % 2 == 0
        || !args[0].eq_ignore_ascii_case(b"STREAMS")
    {
        return Err(CommandParseError::Static(usage::XREAD));
    }
    args.remove(0);
    let ids = args.split_off(args.len() / 2);
    Ok(Command::XRead {
        block_ms,
        keys: args,
        ids,
    })
}

fn parse_id_arg(raw: &[u8]) -> Result<IdArg, &'static [u8]> {
    if raw == b"*" {
        return Ok(IdArg::Auto);
    }
    let raw = std::str::from_utf8(raw).map_err(|_| groups::BAD_STREAM_ID_ERR)?;
    let (ms, seq) = raw.split_once('-').ok_or(groups::BAD_STREAM_ID_ERR)?;
    let ms = ms.parse().map_err(|_| groups::BAD_STREAM_ID_ERR)?;
    if seq == "*" {
        return Ok(IdArg::AutoSeq(ms));
    }
    let seq = seq.parse().map_err(|_| groups::BAD_STREAM_ID_ERR)?;
    Ok(IdArg::Explicit(EntryId::new(ms, seq)))
}

/// An inclusive `XRANGE` start bound
fn parse_range_start(raw: &[u8]) -> Result<EntryId, &'static [u8]> {
    if raw == b"-" {
        return Ok(EntryId::new(0, 1));
    }
    let raw = std::str::from_utf8(raw).map_err(|_| groups::BAD_STREAM_ID_ERR)?;
    match raw.split_once('-') {
        Some((ms, seq)) => {
            let ms = ms.parse().map_err(|_| groups::BAD_STREAM_ID_ERR)?;
            let seq = seq.parse().map_err(|_| groups::BAD_STREAM_ID_ERR)?;
            Ok(EntryId::new(ms, seq))
        }
        None => {
            let ms: u64 = raw.parse().map_err(|_| groups::BAD_STREAM_ID_ERR)?;
            Ok(EntryId::new(ms, u64::from(ms == 0)))
        }
    }
}

/// An `XRANGE` end bound, converted to the exclusive form the stream wants
fn parse_range_end(raw: &[u8], stream: &Stream) -> Result<EntryId, &'static [u8]> {
    if raw == b"+" {
        return Ok(stream.auto_gen_next_id(None));
    }
    let raw = std::str::from_utf8(raw).map_err(|_| groups::BAD_STREAM_ID_ERR)?;
    match raw.split_once('-') {
        Some((ms, seq)) => {
            let ms = ms.parse().map_err(|_| groups::BAD_STREAM_ID_ERR)?;
            let seq: u64 = seq.parse().map_err(|_| groups::BAD_STREAM_ID_ERR)?;
            Ok(EntryId::new(ms, seq.saturating_add(1)))
        }
        None => {
            let ms = raw.parse().map_err(|_| groups::BAD_STREAM_ID_ERR)?;
            Ok(stream.auto_gen_next_id(Some(ms)))
        }
    }
}

/// An `XREAD` position: entries strictly *after* the given ID are returned
fn parse_read_start(raw: &[u8]) -> Result<EntryId, &'static [u8]> {
    let raw = std::str::from_utf8(raw).map_err(|_| groups::BAD_STREAM_ID_ERR)?;
    let (ms, seq) = raw.split_once('-').ok_or(groups::BAD_STREAM_ID_ERR)?;
    let ms = ms.parse().map_err(|_| groups::BAD_STREAM_ID_ERR)?;
    let seq: u64 = seq.parse().map_err(|_| groups::BAD_STREAM_ID_ERR)?;
    Ok(EntryId::new(ms, seq.saturating_add(1)))
}

pub async fn xadd<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
    id: Data,
    fields: Vec<(Data, Data)>,
) -> ActionResult<()> {
    let id_arg = match parse_id_arg(&id) {
        Ok(id_arg) => id_arg,
        Err(e) => return err(e),
    };
    let entry_id = {
        let mut db = store.default_database().lock().await;
        let stream = match db.setdefault_with(&key, || Value::Stream(Stream::new())) {
            Value::Stream(stream) => stream,
            _ => return err(groups::WRONGTYPE_ERR),
        };
        let entry_id = match id_arg {
            // clamp to the stream tail so a clock step backwards can't
            // break monotonicity
            IdArg::Auto => {
                let now = now_millis().max(0) as u64;
                let ms = stream.last_id().map_or(now, |last| now.max(last.ms));
                stream.auto_gen_next_id(Some(ms))
            }
            IdArg::AutoSeq(ms) => stream.auto_gen_next_id(Some(ms)),
            IdArg::Explicit(entry_id) => entry_id,
        };
        if entry_id <= EntryId::ZERO {
            return err(groups::STREAM_ID_ZERO_ERR);
        }
        if stream.add(entry_id, fields).is_err() {
            return err(groups::STREAM_ID_SMALL_ERR);
        }
        db.notify(&key);
        entry_id
    };
    con.write_bulk(entry_id.to_string().as_bytes()).await?;
    Ok(())
}

pub async fn xrange<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
    start: Data,
    end: Data,
) -> ActionResult<()> {
    let entries = {
        let mut db = store.default_database().lock().await;
        match db.get(&key) {
            Some(Value::Stream(stream)) => {
                let start = match parse_range_start(&start) {
                    Ok(start) => start,
                    Err(e) => return err(e),
                };
                let end = match parse_range_end(&end, stream) {
                    Ok(end) => end,
                    Err(e) => return err(e),
                };
                stream.get_range(start, end).to_vec()
            }
            Some(_) => return err(groups::WRONGTYPE_ERR),
            None => Vec::new(),
        }
    };
    write_entries(con, &entries).await?;
    Ok(())
}

pub async fn xread<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    block_ms: Option<u64>,
    keys: Vec<Data>,
    ids: Vec<Data>,
) -> ActionResult<()> {
    match block_ms {
        Some(block_ms) => xread_block(store, con, block_ms, keys, ids).await,
        None => xread_now(store, con, keys, ids).await,
    }
}

async fn xread_now<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    keys: Vec<Data>,
    ids: Vec<Data>,
) -> ActionResult<()> {
    let mut matched: Vec<(Data, Vec<StreamEntry>)> = Vec::new();
    {
        let mut db = store.default_database().lock().await;
        for (key, id) in keys.into_iter().zip(ids.iter()) {
            let start = match parse_read_start(id) {
                Ok(start) => start,
                Err(e) => return err(e),
            };
            match db.get(&key) {
                Some(Value::Stream(stream)) => {
                    let entries = stream.read(start);
                    if !entries.is_empty() {
                        let entries = entries.to_vec();
                        matched.push((key, entries));
                    }
                }
                Some(_) => return err(groups::WRONGTYPE_ERR),
                None => continue,
            }
        }
    }
    if matched.is_empty() {
        con.write_raw(groups::NIL_BULK).await?;
        return Ok(());
    }
    con.write_array_header(matched.len()).await?;
    for (key, entries) in matched {
        write_key_and_entries(con, &key, &entries).await?;
    }
    Ok(())
}

/// The blocking form parks on the first key until its stream grows past
/// the requested position or the timeout elapses
async fn xread_block<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    block_ms: u64,
    keys: Vec<Data>,
    ids: Vec<Data>,
) -> ActionResult<()> {
    let (key, id) = match (keys.into_iter().next(), ids.into_iter().next()) {
        (Some(key), Some(id)) => (key, id),
        _ => return err(usage::XREAD),
    };
    let db = store.default_database();
    let mut guard = db.lock().await;
    let start = match guard.get(&key) {
        None => EntryId::new(0, 1),
        Some(Value::Stream(stream)) => {
            if id.as_ref() == b"$" {
                // "whatever the tail is right now"
                stream.auto_gen_next_id(None)
            } else {
                match parse_read_start(&id) {
                    Ok(start) => start,
                    Err(e) => return err(e),
                }
            }
        }
        Some(_) => return err(groups::WRONGTYPE_ERR),
    };
    let timeout = (block_ms > 0).then(|| Duration::from_millis(block_ms));
    let (guard, entries) = db
        .wait_for(guard, &key, timeout, |inner| match inner.get(&key) {
            Some(Value::Stream(stream)) => {
                let entries = stream.read(start);
                if entries.is_empty() {
                    None
                } else {
                    Some(entries.to_vec())
                }
            }
            _ => None,
        })
        .await;
    drop(guard);
    match entries {
        Some(entries) => {
            con.write_array_header(1).await?;
            write_key_and_entries(con, &key, &entries).await?;
        }
        None => con.write_raw(groups::NIL_BULK).await?,
    }
    Ok(())
}

/// `[[id, [f, v, ...]], ...]`
async fn write_entries<C: BufferedSocketStream>(
    con: &mut Connection<C>,
    entries: &[StreamEntry],
) -> crate::util::IoResult<()> {
    con.write_array_header(entries.len()).await?;
    for entry in entries {
        con.write_array_header(2).await?;
        con.write_bulk(entry.id.to_string().as_bytes()).await?;
        con.write_array_header(entry.fields.len() * 2).await?;
        for (field, value) in &entry.fields {
            con.write_bulk(field).await?;
            con.write_bulk(value).await?;
        }
    }
    Ok(())
}

/// `[key, [entries...]]`
async fn write_key_and_entries<C: BufferedSocketStream>(
    con: &mut Connection<C>,
    key: &Data,
    entries: &[StreamEntry],
) -> crate::util::IoResult<()> {
    con.write_array_header(2).await?;
    con.write_bulk(key).await?;
    write_entries(con, entries).await?;
    Ok(())
}
