/*
 * Created on Sun Mar 20 2022
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

//! Utilities for encoding responses
//!
//! These are append-style writers over a plain byte buffer. Connections use
//! them through their own write methods; the pub/sub registry, the
//! replication propagation path and the test suite build whole frames with
//! them directly. A bulk payload is never routed through an intermediate
//! string: the length header goes out, then the payload bytes, then the
//! terminator.

use std::ops::Deref;

const CRLF: &[u8] = b"\r\n";

/// A 64-bit integer in its decimal ASCII form, formatted on the stack
pub struct Integer64 {
    buf: [u8; 20],
    init_at: usize,
}

impl Integer64 {
    pub fn init(mut int: u64) -> Self {
        let mut buf = [0u8; 20];
        let mut pos = buf.len();
        loop {
            pos -= 1;
            buf[pos] = b'0' + (int % 10) as u8;
            int /= 10;
            if int == 0 {
                break;
            }
        }
        Integer64 { buf, init_at: pos }
    }
}

impl From<usize> for Integer64 {
    fn from(int: usize) -> Self {
        Self::init(int as u64)
    }
}

impl Deref for Integer64 {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.buf[self.init_at..]
    }
}

/// `+<str>\r\n`
pub fn write_simple_string(buf: &mut Vec<u8>, string: &str) {
    buf.push(b'+');
    buf.extend_from_slice(string.as_bytes());
    buf.extend_from_slice(CRLF);
}

/// `-<str>\r\n`
pub fn write_simple_error(buf: &mut Vec<u8>, string: &str) {
    buf.push(b'-');
    buf.extend_from_slice(string.as_bytes());
    buf.extend_from_slice(CRLF);
}

/// `:<int>\r\n`
pub fn write_integer(buf: &mut Vec<u8>, int: i64) {
    buf.push(b':');
    if int < 0 {
        buf.push(b'-');
        buf.extend_from_slice(&Integer64::init(int.unsigned_abs()));
    } else {
        buf.extend_from_slice(&Integer64::init(int as u64));
    }
    buf.extend_from_slice(CRLF);
}

/// `$<len>\r\n<bytes>\r\n`
pub fn write_bulk_string(buf: &mut Vec<u8>, payload: &[u8]) {
    buf.push(b'$');
    buf.extend_from_slice(&Integer64::from(payload.len()));
    buf.extend_from_slice(CRLF);
    buf.extend_from_slice(payload);
    buf.extend_from_slice(CRLF);
}

/// `$-1\r\n`
pub fn write_null_bulk_string(buf: &mut Vec<u8>) {
    buf.extend_from_slice(b"$-1\r\n");
}

/// `*<n>\r\n` (the elements follow on their own)
pub fn write_array_header(buf: &mut Vec<u8>, len: usize) {
    buf.push(b'*');
    buf.extend_from_slice(&Integer64::from(len));
    buf.extend_from_slice(CRLF);
}

/// `*-1\r\n`
pub fn write_null_array(buf: &mut Vec<u8>) {
    buf.extend_from_slice(b"*-1\r\n");
}

/// Encode an argument vector as an array of bulk strings
///
/// This is the canonical re-encoding used for write propagation and the
/// replication handshake.
pub fn encode_argv_array<T: AsRef<[u8]>>(args: &[T]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32);
    write_array_header(&mut buf, args.len());
    for arg in args {
        write_bulk_string(&mut buf, arg.as_ref());
    }
    buf
}
