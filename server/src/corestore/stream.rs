/*
 * Created on Tue Mar 22 2022
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

use super::Data;
use std::fmt;

/// A stream entry ID: a `(ms, seq)` pair, totally ordered lexicographically
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId {
    pub ms: u64,
    pub seq: u64,
}

impl EntryId {
    pub const ZERO: EntryId = EntryId { ms: 0, seq: 0 };
    pub const fn new(ms: u64, seq: u64) -> Self {
        EntryId { ms, seq }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// One appended entry: an ID plus its field/value pairs in argument order
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: EntryId,
    pub fields: Vec<(Data, Data)>,
}

/// An append-only sequence of entries, strictly increasing by ID
///
/// The per-`ms` maximum sequence number is tracked so that partially and
/// fully auto-generated IDs can be handed out in constant time.
#[derive(Debug, Default)]
pub struct Stream {
    entries: Vec<StreamEntry>,
    max_seq: std::collections::HashMap<u64, u64>,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn last_id(&self) -> Option<EntryId> {
        self.entries.last().map(|entry| entry.id)
    }
    /// Append an entry
    ///
    /// Fails if `id` doesn't top the current last entry; the `> (0,0)` check
    /// belongs to the caller because its error is a distinct reply.
    pub fn add(&mut self, id: EntryId, fields: Vec<(Data, Data)>) -> Result<(), ()> {
        if self.last_id().is_some_and(|last| id <= last) {
            return Err(());
        }
        let max_seq = self.max_seq.entry(id.ms).or_insert(id.seq);
        if *max_seq < id.seq {
            *max_seq = id.seq;
        }
        self.entries.push(StreamEntry { id, fields });
        Ok(())
    }
    /// The next ID the stream would auto-generate
    ///
    /// With no `ms`, this is one past the current tail: `(last.ms,
    /// last.seq + 1)`, or `(0, 1)` on an empty stream. With an explicit
    /// `ms`, it is `(ms, max_seq[ms] + 1)` if that millisecond has been
    /// seen, else `(ms, 0)`; except `(0, 1)` since `0-0` is unusable.
    pub fn auto_gen_next_id(&self, ms: Option<u64>) -> EntryId {
        match ms {
            None => match self.last_id() {
                Some(last) => EntryId::new(last.ms, last.seq.saturating_add(1)),
                None => EntryId::new(0, 1),
            },
            Some(ms) => match self.max_seq.get(&ms) {
                Some(max_seq) => EntryId::new(ms, max_seq.saturating_add(1)),
                None => EntryId::new(ms, u64::from(ms == 0)),
            },
        }
    }
    /// Entries in the half-open window `[start, end)`
    pub fn get_range(&self, start: EntryId, end: EntryId) -> &[StreamEntry] {
        let lo = self.entries.partition_point(|entry| entry.id < start);
        let hi = self.entries.partition_point(|entry| entry.id < end);
        &self.entries[lo..hi]
    }
    /// The suffix of entries with `id >= start`
    pub fn read(&self, start: EntryId) -> &[StreamEntry] {
        let lo = self.entries.partition_point(|entry| entry.id < start);
        &self.entries[lo..]
    }
}
