/*
 * Created on Fri Mar 25 2022
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

//! # The pub/sub registry
//!
//! A process-wide channel → subscriber mapping. The registry never touches
//! sockets itself: each subscriber is the sending half of the owning
//! connection task's frame channel, and the task writes delivered frames
//! out in its own run loop. The registry mutex is independent of every
//! database mutex and is never held across a suspension point; publishing
//! snapshots the subscriber list first, so subscribing or unsubscribing
//! mid-delivery is safe.

use crate::corestore::Data;
use crate::resp;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;

/// The identity of a live connection, used to key subscriber sets
pub type ConnId = u64;

/// A pre-encoded frame pushed at a connection task
pub type PushedFrame = Vec<u8>;

#[derive(Default)]
pub struct PubSubRegistry {
    channels: Mutex<HashMap<Data, HashMap<ConnId, UnboundedSender<PushedFrame>>>>,
}

impl PubSubRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn subscribe(&self, channel: Data, id: ConnId, sink: UnboundedSender<PushedFrame>) {
        self.channels
            .lock()
            .entry(channel)
            .or_default()
            .insert(id, sink);
    }
    pub fn unsubscribe(&self, channel: &[u8], id: ConnId) {
        let mut channels = self.channels.lock();
        if let Some(subscribers) = channels.get_mut(channel) {
            subscribers.remove(&id);
            if subscribers.is_empty() {
                channels.remove(channel);
            }
        }
    }
    /// Drop every subscription a (closing) connection holds
    pub fn unsubscribe_all(&self, id: ConnId) {
        let mut channels = self.channels.lock();
        channels.retain(|_, subscribers| {
            subscribers.remove(&id);
            !subscribers.is_empty()
        });
    }
    pub fn subscriber_count(&self, channel: &[u8]) -> usize {
        self.channels
            .lock()
            .get(channel)
            .map_or(0, |subscribers| subscribers.len())
    }
    /// Deliver `message` to every subscriber of `channel`
    ///
    /// Returns the number of subscribers the message was handed to. A
    /// subscriber whose task has gone away is pruned on the spot.
    pub fn publish(&self, channel: &[u8], message: &[u8]) -> usize {
        let frame = encode_message_frame(channel, message);
        let subscribers: Vec<(ConnId, UnboundedSender<PushedFrame>)> = match self
            .channels
            .lock()
            .get(channel)
        {
            Some(subscribers) => subscribers
                .iter()
                .map(|(id, sink)| (*id, sink.clone()))
                .collect(),
            None => return 0,
        };
        let mut delivered = 0;
        for (id, sink) in subscribers {
            if sink.send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                self.unsubscribe(channel, id);
            }
        }
        delivered
    }
}

/// `*3\r\n$7\r\nmessage\r\n$<|ch|>\r\n<ch>\r\n$<|msg|>\r\n<msg>\r\n`
fn encode_message_frame(channel: &[u8], message: &[u8]) -> PushedFrame {
    let mut frame = Vec::with_capacity(32 + channel.len() + message.len());
    resp::write_array_header(&mut frame, 3);
    resp::write_bulk_string(&mut frame, b"message");
    resp::write_bulk_string(&mut frame, channel);
    resp::write_bulk_string(&mut frame, message);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn message_frame_encoding() {
        assert_eq!(
            encode_message_frame(b"ch", b"msg"),
            b"*3\r\n$7\r\nmessage\r\n$2\r\nch\r\n$3\r\nmsg\r\n"
        );
    }

    #[test]
    fn publish_reaches_every_subscriber() {
        let registry = PubSubRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.subscribe(Data::from_static(b"news"), 1, tx1);
        registry.subscribe(Data::from_static(b"news"), 2, tx2);
        assert_eq!(registry.publish(b"news", b"hello"), 2);
        assert_eq!(rx1.try_recv().unwrap(), rx2.try_recv().unwrap());
    }

    #[test]
    fn publish_to_empty_channel() {
        let registry = PubSubRegistry::new();
        assert_eq!(registry.publish(b"void", b"hello"), 0);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let registry = PubSubRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.subscribe(Data::from_static(b"news"), 1, tx);
        registry.unsubscribe(b"news", 1);
        assert_eq!(registry.publish(b"news", b"hello"), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dead_subscribers_are_pruned() {
        let registry = PubSubRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.subscribe(Data::from_static(b"news"), 1, tx);
        drop(rx);
        assert_eq!(registry.publish(b"news", b"hello"), 0);
        assert_eq!(registry.subscriber_count(b"news"), 0);
    }

    #[test]
    fn unsubscribe_all_clears_connection() {
        let registry = PubSubRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.subscribe(Data::from_static(b"a"), 7, tx.clone());
        registry.subscribe(Data::from_static(b"b"), 7, tx);
        registry.unsubscribe_all(7);
        assert_eq!(registry.subscriber_count(b"a"), 0);
        assert_eq!(registry.subscriber_count(b"b"), 0);
    }
}
