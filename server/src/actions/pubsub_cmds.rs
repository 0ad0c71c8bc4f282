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

//! Pub/sub actions: `SUBSCRIBE`, `UNSUBSCRIBE`, `PUBLISH`
//!
//! Subscription state lives in two places on purpose: the registry (so
//! publishers can find the subscriber's frame channel) and the connection
//! state (so the dispatcher can enforce subscribed-mode command
//! restrictions and count this connection's subscriptions).

use super::{ActionResult, Command};
use crate::corestore::{Corestore, Data};
use crate::dbnet::connection::Connection;
use crate::dbnet::{BufferedSocketStream, ConnectionState};
use crate::protocol::responses::usage;
use crate::queryengine::CommandParseError;

pub fn parse_subscribe(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() != 1 {
        return Err(CommandParseError::Static(usage::SUBSCRIBE));
    }
    Ok(Command::Subscribe {
        channel: args.pop().unwrap(),
    })
}

pub fn parse_unsubscribe(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() != 1 {
        return Err(CommandParseError::Static(usage::UNSUBSCRIBE));
    }
    Ok(Command::Unsubscribe {
        channel: args.pop().unwrap(),
    })
}

pub fn parse_publish(mut args: Vec<Data>) -> Result<Command, CommandParseError> {
    if args.len() != 2 {
        return Err(CommandParseError::Static(usage::PUBLISH));
    }
    let message = args.pop().unwrap();
    Ok(Command::Publish {
        channel: args.pop().unwrap(),
        message,
    })
}

pub async fn subscribe<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    state: &mut ConnectionState,
    channel: Data,
) -> ActionResult<()> {
    state.subscriptions.insert(channel.clone());
    store
        .pubsub()
        .subscribe(channel.clone(), state.id, state.sink.clone());
    con.write_array_header(3).await?;
    con.write_bulk(b"subscribe").await?;
    con.write_bulk(&channel).await?;
    con.write_integer(state.subscriptions.len() as i64).await?;
    Ok(())
}

pub async fn unsubscribe<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    state: &mut ConnectionState,
    channel: Data,
) -> ActionResult<()> {
    state.subscriptions.remove(&channel);
    store.pubsub().unsubscribe(&channel, state.id);
    con.write_array_header(3).await?;
    con.write_bulk(b"unsubscribe").await?;
    con.write_bulk(&channel).await?;
    con.write_integer(state.subscriptions.len() as i64).await?;
    Ok(())
}

pub async fn publish<C: BufferedSocketStream>(
    store: &Corestore,
    con: &mut Connection<C>,
    channel: Data,
    message: Data,
) -> ActionResult<()> {
    let receivers = store.pubsub().publish(&channel, &message);
    con.write_integer(receivers as i64).await?;
    Ok(())
}
