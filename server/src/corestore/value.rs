/*
 * Created on Mon Mar 21 2022
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

//! The typed values a key can hold

use super::sorted_set::SortedSet;
use super::stream::Stream;
use super::Data;
use std::collections::VecDeque;

/// A stored value: a tagged union over every kind the keyspace supports
#[derive(Debug)]
pub enum Value {
    Str(Str),
    List(List),
    Zset(SortedSet),
    Stream(Stream),
}

impl Value {
    /// The type name reported by `TYPE`
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Zset(_) => "zset",
            Value::Stream(_) => "stream",
        }
    }
}

/// A mutable binary-safe byte string
#[derive(Debug, PartialEq, Eq)]
pub struct Str {
    bytes: Vec<u8>,
}

impl Str {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Str {
            bytes: bytes.into(),
        }
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
    /// Increment the stored integer by one and return the new value
    ///
    /// The current bytes must parse as a signed 64-bit decimal integer in
    /// full (no prefix, no suffix). On failure nothing is mutated.
    pub fn incr(&mut self) -> Result<i64, ()> {
        let current = std::str::from_utf8(&self.bytes)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or(())?;
        let new = current.checked_add(1).ok_or(())?;
        self.bytes = new.to_string().into_bytes();
        Ok(new)
    }
}

/// An ordered sequence of byte strings
#[derive(Debug, Default)]
pub struct List {
    elements: VecDeque<Data>,
}

impl List {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.elements.len()
    }
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
    /// Prepend, last argument first, so the final argument lands at index 0
    pub fn lpush(&mut self, elements: impl IntoIterator<Item = Data>) {
        for element in elements {
            self.elements.push_front(element);
        }
    }
    /// Append in argument order
    pub fn rpush(&mut self, elements: impl IntoIterator<Item = Data>) {
        self.elements.extend(elements);
    }
    /// Pop a single element off the head
    pub fn lpop(&mut self) -> Option<Data> {
        self.elements.pop_front()
    }
    /// Pop up to `count` elements off the head
    pub fn lpop_count(&mut self, count: usize) -> Vec<Data> {
        let count = count.min(self.elements.len());
        self.elements.drain(..count).collect()
    }
    /// The closed interval `[start, stop]` with signed indexing
    ///
    /// Negative indices count from the tail (`-1` is the last element).
    /// Out-of-range bounds clamp; an empty window yields an empty vector.
    pub fn get_range(&self, start: i64, stop: i64) -> Vec<Data> {
        let len = self.elements.len() as i64;
        let start = normalize_index(start, len).max(0);
        let stop = normalize_index(stop, len).min(len - 1);
        if start > stop {
            return Vec::new();
        }
        self.elements
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect()
    }
}

/// Map a signed index onto `[i64::MIN, len)`, counting negatives from the end
pub(super) fn normalize_index(index: i64, len: i64) -> i64 {
    if index < 0 {
        index + len
    } else {
        index
    }
}
