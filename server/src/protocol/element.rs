/*
 * Created on Fri Mar 18 2022
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

use crate::corestore::Data;

/// A single decoded wire value
///
/// This is the full reply universe: requests only ever use the
/// array-of-bulks subset, but the replication handshake reads arbitrary
/// replies off the upstream link, so the decoder handles all of them.
#[derive(Debug, PartialEq, Clone)]
pub enum Element {
    /// `+<str>\r\n`
    SimpleString(String),
    /// `-<str>\r\n`
    SimpleError(String),
    /// `:<int>\r\n`
    Integer(i64),
    /// `$<len>\r\n<bytes>\r\n`
    BulkString(Data),
    /// `*<n>\r\n<element>×n`
    Array(Vec<Element>),
    /// `$-1\r\n`
    NullBulkString,
    /// `*-1\r\n`
    NullArray,
}

impl Element {
    /// Convert a top-level element into a command argument vector
    ///
    /// Commands are always arrays of bulk strings; anything else at the
    /// command boundary is a protocol error, signalled here by `None`.
    pub fn into_argv(self) -> Option<Vec<Data>> {
        let elements = match self {
            Element::Array(elements) => elements,
            _ => return None,
        };
        let mut argv = Vec::with_capacity(elements.len());
        for element in elements {
            match element {
                Element::BulkString(bulk) => argv.push(bulk),
                _ => return None,
            }
        }
        if argv.is_empty() {
            return None;
        }
        Some(argv)
    }
}
