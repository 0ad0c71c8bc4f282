/*
 * Created on Mon Apr 04 2022
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

//! Sorted set actions: `ZADD`, `ZRANK`, `ZRANGE`, `ZSCORE`, `ZREM`, `ZCARD`

use super::{err, parse_number, ActionResult, Command};
use crate::corestore::sorted_set::SortedSet;
use crate::corestore::value::Value;
use crate::corestore::{Corestore, Data};
use crate::dbnet::connection::Connection;
use crate::dbnet::BufferedSocketStream;
use crate::protocol::responses::{groups, usage};
use crate::queryengine::CommandParseError;

pub fn parse_zadd(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() < 3 || args.len() % 2 == 0 {
        return Err(CommandParseError::Static(usage::ZADD));
    }
    let rest = args.split_off(1);
    let mut pairs = Vec::with_capacity(rest.len() / 2);
    let mut iter = rest.into_iter();
    while let (Some(score), Some(member)) = (iter.next(), iter.next()) {
        let score: f64 =
            parse_number(&score).ok_or(CommandParseError::Static(groups::NOT_A_FLOAT_ERR))?;
        if score.is_nan() {
            return Err(CommandParseError::Static(groups::NOT_A_FLOAT_ERR));
        }
        pairs.push((score, member));
    }
    Ok(Command::ZAdd {
        key: args.pop().unwrap(),
        pairs,
    })
}

pub fn parse_zrank(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() != 2 {
        return Err(CommandParseError::Static(usage::ZRANK));
    }
    let member = args.pop().unwrap();
    Ok(Command::ZRank {
        key: args.pop().unwrap(),
        member,
    })
}

pub fn parse_zrange(args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() != 3 {
        return Err(CommandParseError::Static(usage::ZRANGE));
    }
    let start = parse_number(&args[1]).ok_or(CommandParseError::Static(groups::NOT_AN_INT_ERR))?;
    let stop = parse_number(&args[2]).ok_or(CommandParseError::Static(groups::NOT_AN_INT_ERR))?;
    Ok(Command::ZRange {
        key: args.into_iter().next().unwrap(),
        start,
        stop,
    })
}

pub fn parse_zscore(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() != 2 {
        return Err(CommandParseError::Static(usage::ZSCORE));
    }
    let member = args.pop().unwrap();
    Ok(Command::ZScore {
        key: args.pop().unwrap(),
        member,
    })
}

pub fn parse_zrem(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() < 2 {
        return Err(CommandParseError::Static(usage::ZREM));
    }
    let members = args.split_off(1);
    Ok(Command::ZRem {
        key: args.pop().unwrap(),
        members,
    })
}

pub fn parse_zcard(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() != 1 {
        return Err(CommandParseError::Static(usage::ZCARD));
    }
    Ok(Command::ZCard {
        key: args.pop().unwrap(),
    })
}

/// Render a score the way the wire surface expects: integral scores lose
/// the trailing `.0`, the rest keep their shortest decimal form
pub fn format_score(score: f64) -> String {
    if score.is_infinite() {
        return if score > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    if score.fract() == 0.0 && score.abs() < 1e17 {
        return (score as i64).to_string();
    }
    score.to_string()
}

pub async fn zadd<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
    pairs: Vec<(f64, Data)>,
) -> ActionResult<()> {
    let added = {
        let mut db = store.default_database().lock().await;
        match db.setdefault_with(&key, || Value::Zset(SortedSet::new())) {
            Value::Zset(zset) => zset.add(pairs),
            _ => return err(groups::WRONGTYPE_ERR),
        }
    };
    con.write_integer(added as i64).await?;
    Ok(())
}

pub async fn zrank<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
    member: Data,
) -> ActionResult<()> {
    let rank = {
        let mut db = store.default_database().lock().await;
        match db.get(&key) {
            Some(Value::Zset(zset)) => zset.rank(&member),
            Some(_) => return err(groups::WRONGTYPE_ERR),
            None => None,
        }
    };
    match rank {
        Some(rank) => con.write_integer(rank as i64).await?,
        None => con.write_raw(groups::NIL_BULK).await?,
    }
    Ok(())
}

pub async fn zrange<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
    start: i64,
    stop: i64,
) -> ActionResult<()> {
    let members = {
        let mut db = store.default_database().lock().await;
        match db.get(&key) {
            Some(Value::Zset(zset)) => zset.range(start, stop),
            Some(_) => return err(groups::WRONGTYPE_ERR),
            None => Vec::new(),
        }
    };
    con.write_array_header(members.len()).await?;
    for member in members {
        con.write_bulk(&member).await?;
    }
    Ok(())
}

pub async fn zscore<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
    member: Data,
) -> ActionResult<()> {
    let score = {
        let mut db = store.default_database().lock().await;
        match db.get(&key) {
            Some(Value::Zset(zset)) => zset.score(&member),
            Some(_) => return err(groups::WRONGTYPE_ERR),
            None => None,
        }
    };
    match score {
        Some(score) => con.write_bulk(format_score(score).as_bytes()).await?,
        None => con.write_raw(groups::NIL_BULK).await?,
    }
    Ok(())
}

pub async fn zrem<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
    members: Vec<Data>,
) -> ActionResult<()> {
    let removed = {
        let mut db = store.default_database().lock().await;
        let removed = match db.get_mut(&key) {
            Some(Value::Zset(zset)) => {
                zset.remove(members.iter().map(|member| member.as_ref()))
            }
            Some(_) => return err(groups::WRONGTYPE_ERR),
            None => 0,
        };
        // a sorted set emptied by removal collapses to absent
        if matches!(db.get(&key), Some(Value::Zset(zset)) if zset.is_empty()) {
            db.remove(&key);
        }
        removed
    };
    con.write_integer(removed as i64).await?;
    Ok(())
}

pub async fn zcard<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    key: Data,
) -> ActionResult<()> {
    let len = {
        let mut db = store.default_database().lock().await;
        match db.get(&key) {
            Some(Value::Zset(zset)) => zset.len(),
            Some(_) => return err(groups::WRONGTYPE_ERR),
            None => 0,
        }
    };
    con.write_integer(len as i64).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::format_score;

    #[test]
    fn score_formatting() {
        assert_eq!(format_score(1.0), "1");
        assert_eq!(format_score(-3.0), "-3");
        assert_eq!(format_score(1.5), "1.5");
        assert_eq!(format_score(f64::INFINITY), "inf");
        assert_eq!(format_score(f64::NEG_INFINITY), "-inf");
    }
}
