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

//! # The protocol module
//!
//! This module provides deserialization primitives for the RESP wire format.
//! The [`Parser`] works off a plain byte slice (usually a connection's read
//! buffer) and decodes exactly one tagged value, reporting how many bytes it
//! consumed so that the caller can advance its buffer. A parse never blocks:
//! if the buffer ends mid-frame the parser returns [`ParseError::NotEnough`]
//! and the caller reads more bytes off the socket and retries.

mod element;
pub mod responses;

pub use element::Element;

use crate::corestore::Data;

/// The query (element + the number of bytes to advance the buffer by)
pub type ElementWithAdvance = (Element, usize);

#[derive(Debug, PartialEq)]
/// Errors that can happen while parsing a frame
pub enum ParseError {
    /// The buffer ended before the frame did; read more and retry
    NotEnough,
    /// The buffer is empty (nothing to parse at all)
    Empty,
    /// A tag or terminator wasn't where the grammar says it should be
    UnexpectedByte,
    /// A length or integer wasn't decimal ASCII
    DatatypeParseFailure,
}

/// The RESP parser
///
/// This parser is a cursor over a borrowed byte slice. It never copies
/// payload bytes until a full frame has been validated.
pub struct Parser<'a> {
    buffer: &'a [u8],
    cursor: usize,
}

impl<'a> Parser<'a> {
    pub const fn new(buffer: &'a [u8]) -> Self {
        Parser { buffer, cursor: 0 }
    }

    /// Decode exactly one tagged value from the buffer
    pub fn parse(buffer: &'a [u8]) -> Result<ElementWithAdvance, ParseError> {
        if buffer.is_empty() {
            return Err(ParseError::Empty);
        }
        let mut parser = Parser::new(buffer);
        let element = parser.parse_element()?;
        Ok((element, parser.cursor))
    }

    /// The number of bytes remaining past the cursor
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    fn next_byte(&mut self) -> Result<u8, ParseError> {
        match self.buffer.get(self.cursor) {
            Some(byte) => {
                self.cursor += 1;
                Ok(*byte)
            }
            None => Err(ParseError::NotEnough),
        }
    }

    /// Read up to (and excluding) the next CRLF, advancing past it
    fn read_line(&mut self) -> Result<&'a [u8], ParseError> {
        let start = self.cursor;
        let mut pos = start;
        while pos < self.buffer.len() {
            if self.buffer[pos] == b'\r' {
                if pos + 1 == self.buffer.len() {
                    return Err(ParseError::NotEnough);
                }
                if self.buffer[pos + 1] != b'\n' {
                    return Err(ParseError::UnexpectedByte);
                }
                self.cursor = pos + 2;
                return Ok(&self.buffer[start..pos]);
            }
            pos += 1;
        }
        Err(ParseError::NotEnough)
    }

    /// Read exactly `count` payload bytes followed by a CRLF terminator
    fn read_exact_with_crlf(&mut self, count: usize) -> Result<&'a [u8], ParseError> {
        if self.remaining() < count + 2 {
            return Err(ParseError::NotEnough);
        }
        let start = self.cursor;
        let end = start + count;
        if self.buffer[end] != b'\r' || self.buffer[end + 1] != b'\n' {
            return Err(ParseError::UnexpectedByte);
        }
        self.cursor = end + 2;
        Ok(&self.buffer[start..end])
    }

    /// Parse a decimal ASCII line into a signed 64-bit integer
    fn parse_into_i64(bytes: &[u8]) -> Result<i64, ParseError> {
        if bytes.is_empty() {
            return Err(ParseError::DatatypeParseFailure);
        }
        let (neg, digits) = match bytes[0] {
            b'-' => (true, &bytes[1..]),
            _ => (false, bytes),
        };
        if digits.is_empty() {
            return Err(ParseError::DatatypeParseFailure);
        }
        let mut int = 0i64;
        for dig in digits {
            let dig = dig.wrapping_sub(48);
            if dig > 9 {
                return Err(ParseError::DatatypeParseFailure);
            }
            int = int
                .checked_mul(10)
                .and_then(|int| int.checked_add(i64::from(dig)))
                .ok_or(ParseError::DatatypeParseFailure)?;
        }
        Ok(if neg { -int } else { int })
    }

    fn parse_element(&mut self) -> Result<Element, ParseError> {
        match self.next_byte()? {
            b'+' => {
                let line = self.read_line()?;
                Ok(Element::SimpleString(
                    String::from_utf8_lossy(line).into_owned(),
                ))
            }
            b'-' => {
                let line = self.read_line()?;
                Ok(Element::SimpleError(
                    String::from_utf8_lossy(line).into_owned(),
                ))
            }
            b':' => {
                let line = self.read_line()?;
                Ok(Element::Integer(Self::parse_into_i64(line)?))
            }
            b'$' => {
                let len = Self::parse_into_i64(self.read_line()?)?;
                match len {
                    -1 => Ok(Element::NullBulkString),
                    len if len >= 0 => {
                        let payload = self.read_exact_with_crlf(len as usize)?;
                        Ok(Element::BulkString(Data::copy_from_slice(payload)))
                    }
                    _ => Err(ParseError::UnexpectedByte),
                }
            }
            b'*' => {
                let len = Self::parse_into_i64(self.read_line()?)?;
                match len {
                    -1 => Ok(Element::NullArray),
                    len if len >= 0 => {
                        let mut elements = Vec::with_capacity(len as usize);
                        for _ in 0..len {
                            elements.push(self.parse_element()?);
                        }
                        Ok(Element::Array(elements))
                    }
                    _ => Err(ParseError::UnexpectedByte),
                }
            }
            _ => Err(ParseError::UnexpectedByte),
        }
    }
}

/// Parse a top-level frame into a command argument vector
///
/// Fails with [`ParseError::UnexpectedByte`] if the frame decodes fine but
/// isn't a non-empty array of bulk strings.
pub fn parse_argv(buffer: &[u8]) -> Result<(Vec<Data>, usize), ParseError> {
    let (element, advance) = Parser::parse(buffer)?;
    match element.into_argv() {
        Some(argv) => Ok((argv, advance)),
        None => Err(ParseError::UnexpectedByte),
    }
}
