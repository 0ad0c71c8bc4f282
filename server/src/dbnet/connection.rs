/*
 * Created on Sat Apr 09 2022
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

//! # Connections
//!
//! A [`Connection`] owns one byte stream: a read buffer that frames are
//! parsed out of incrementally, and a buffered writer that replies are
//! staged into (the dispatcher flushes once per command). Setting the
//! connection *quiet* suppresses every reply write; the follower's
//! upstream link runs that way, with [`Connection::write_raw_forced`] as
//! the single escape hatch for `REPLCONF ACK`.

use super::{BufferedSocketStream, QueryResult};
use crate::protocol::{self, Element, ParseError, Parser};
use crate::resp::Integer64;
use crate::util::IoResult;
use bytes::{Buf, BytesMut};
use libcardinal::BUF_CAP;
use std::io::{Error as IoError, ErrorKind};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};

pub struct Connection<C> {
    /// the stream, wrapped in a write buffer
    pub(super) stream: BufWriter<C>,
    /// the incremental read buffer
    buffer: BytesMut,
    /// when set, reply writes are dropped on the floor
    quiet: bool,
}

impl<C: BufferedSocketStream> Connection<C> {
    pub fn new(stream: C) -> Self {
        Connection {
            stream: BufWriter::new(stream),
            buffer: BytesMut::with_capacity(BUF_CAP),
            quiet: false,
        }
    }
    pub fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }

    /// Read one command (an array of bulk strings) off the stream
    ///
    /// Pipelined frames already sitting in the buffer are consumed before
    /// the socket is touched again. The advance count is reported so the
    /// replica link can account offsets.
    pub async fn read_query(&mut self) -> IoResult<QueryResult> {
        loop {
            match protocol::parse_argv(&self.buffer) {
                Ok((argv, advance)) => {
                    self.buffer.advance(advance);
                    return Ok(QueryResult::Q((argv, advance)));
                }
                Err(ParseError::NotEnough) | Err(ParseError::Empty) => {}
                Err(_) => return Ok(QueryResult::ProtocolError),
            }
            if !self.fill_buffer().await? {
                // an EOF mid-frame is a normal termination too, unlike a
                // decode failure
                return Ok(QueryResult::Disconnected);
            }
        }
    }

    /// Read one reply element of any shape (the handshake path)
    ///
    /// `None` means the peer closed cleanly between frames.
    pub async fn read_element(&mut self) -> IoResult<Option<(Element, usize)>> {
        loop {
            match Parser::parse(&self.buffer) {
                Ok((element, advance)) => {
                    self.buffer.advance(advance);
                    return Ok(Some((element, advance)));
                }
                Err(ParseError::NotEnough) | Err(ParseError::Empty) => {}
                Err(_) => return Err(IoError::from(ErrorKind::InvalidData)),
            }
            if !self.fill_buffer().await? {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(IoError::from(ErrorKind::ConnectionReset))
                };
            }
        }
    }

    /// Read the snapshot bulk a leader sends after `PSYNC`: one `$`, a
    /// decimal length, CRLF, then exactly that many bytes with *no*
    /// trailing CRLF
    pub async fn read_snapshot_payload(&mut self) -> IoResult<Vec<u8>> {
        loop {
            if let Some((payload, advance)) = Self::try_parse_snapshot(&self.buffer)? {
                self.buffer.advance(advance);
                return Ok(payload);
            }
            if !self.fill_buffer().await? {
                return Err(IoError::from(ErrorKind::UnexpectedEof));
            }
        }
    }

    fn try_parse_snapshot(buffer: &[u8]) -> IoResult<Option<(Vec<u8>, usize)>> {
        if buffer.is_empty() {
            return Ok(None);
        }
        if buffer[0] != b'$' {
            return Err(IoError::from(ErrorKind::InvalidData));
        }
        let Some(lf) = buffer.iter().position(|b| *b == b'\n') else {
            return Ok(None);
        };
        if lf < 2 || buffer[lf - 1] != b'\r' {
            return Err(IoError::from(ErrorKind::InvalidData));
        }
        let len: usize = std::str::from_utf8(&buffer[1..lf - 1])
            .ok()
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| IoError::from(ErrorKind::InvalidData))?;
        let body_start = lf + 1;
        if buffer.len() < body_start + len {
            return Ok(None);
        }
        Ok(Some((
            buffer[body_start..body_start + len].to_vec(),
            body_start + len,
        )))
    }

    /// Pull more bytes off the socket; false means EOF
    async fn fill_buffer(&mut self) -> IoResult<bool> {
        Ok(self.stream.read_buf(&mut self.buffer).await? != 0)
    }

    pub async fn write_raw(&mut self, bytes: &[u8]) -> IoResult<()> {
        if self.quiet {
            return Ok(());
        }
        self.stream.write_all(bytes).await
    }
    /// Write even on a quiet connection (`REPLCONF ACK` and pushed frames)
    pub async fn write_raw_forced(&mut self, bytes: &[u8]) -> IoResult<()> {
        self.stream.write_all(bytes).await
    }
    pub async fn write_simple_string(&mut self, string: &str) -> IoResult<()> {
        if self.quiet {
            return Ok(());
        }
        self.stream.write_all(&[b'+']).await?;
        self.stream.write_all(string.as_bytes()).await?;
        self.stream.write_all(b"\r\n").await
    }
    pub async fn write_integer(&mut self, int: i64) -> IoResult<()> {
        if self.quiet {
            return Ok(());
        }
        self.stream.write_all(&[b':']).await?;
        if int < 0 {
            self.stream.write_all(&[b'-']).await?;
        }
        self.stream
            .write_all(&Integer64::init(int.unsigned_abs()))
            .await?;
        self.stream.write_all(b"\r\n").await
    }
    /// The length header goes out, then the payload, then the terminator;
    /// the payload is never staged through an intermediate string
    pub async fn write_bulk(&mut self, payload: &[u8]) -> IoResult<()> {
        if self.quiet {
            return Ok(());
        }
        self.stream.write_all(&[b'$']).await?;
        self.stream
            .write_all(&Integer64::from(payload.len()))
            .await?;
        self.stream.write_all(b"\r\n").await?;
        self.stream.write_all(payload).await?;
        self.stream.write_all(b"\r\n").await
    }
    pub async fn write_array_header(&mut self, len: usize) -> IoResult<()> {
        if self.quiet {
            return Ok(());
        }
        self.stream.write_all(&[b'*']).await?;
        self.stream.write_all(&Integer64::from(len)).await?;
        self.stream.write_all(b"\r\n").await
    }
    pub async fn flush(&mut self) -> IoResult<()> {
        self.stream.flush().await
    }
}
