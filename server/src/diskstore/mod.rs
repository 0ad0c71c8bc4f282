/*
 * Created on Thu Mar 24 2022
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

//! # The disk store
//!
//! This module decodes the on-disk snapshot (dump) format into a vector of
//! databases at startup. The server never writes this file back: mutations
//! live and die in memory.
//!
//! The format is the classic dump layout: a 9-byte magic, then a stream of
//! opcode-tagged sections until the EOF opcode, followed by an 8-byte
//! CRC-64 trailer (a zero trailer means checksumming was disabled by the
//! producer and is accepted as-is).

use crate::corestore::database::{Database, ExpiringValue};
use crate::corestore::expiry::Expiry;
use crate::corestore::value::{Str, Value};
use crate::corestore::{Data, DATABASE_COUNT};
use crate::util::error::{Error, ServerResult};
use crc::Crc;
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::Path;

/// The magic every loadable snapshot must open with
pub const SNAPSHOT_MAGIC: &[u8] = b"REDIS0011";

const CRC64: Crc<u64> = Crc::<u64>::new(&crc::CRC_64_REDIS);

// section opcodes
const OPCODE_AUX: u8 = 0xFA;
const OPCODE_RESIZEDB: u8 = 0xFB;
const OPCODE_EXPIRETIMEMS: u8 = 0xFC;
const OPCODE_EXPIRETIME: u8 = 0xFD;
const OPCODE_SELECTDB: u8 = 0xFE;
const OPCODE_EOF: u8 = 0xFF;
// value types
const VALUE_TYPE_STRING: u8 = 0;

#[derive(Debug, PartialEq, Eq)]
/// Everything that can go wrong while decoding a snapshot. All of these are
/// fatal at startup if the file exists on disk
pub enum SnapshotError {
    /// The byte stream ended inside a section
    UnexpectedEof,
    /// The file doesn't open with [`SNAPSHOT_MAGIC`]
    BadMagic,
    /// A length prefix was found where only a string may be encoded
    BadLength,
    /// A value type other than the string type
    UnsupportedValueType(u8),
    /// An LZF-compressed or unknown special string encoding
    UnsupportedStringEncoding(u8),
    /// SELECTDB pointed past the fixed database vector
    BadDatabaseIndex(usize),
    /// The CRC-64 trailer doesn't match the decoded bytes
    ChecksumMismatch,
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof => write!(f, "unexpected end of snapshot"),
            Self::BadMagic => write!(f, "bad magic (not a dump file?)"),
            Self::BadLength => write!(f, "expected a length but got a string encoding"),
            Self::UnsupportedValueType(vt) => write!(f, "unsupported value type {vt}"),
            Self::UnsupportedStringEncoding(enc) => {
                write!(f, "unsupported string encoding {enc}")
            }
            Self::BadDatabaseIndex(index) => write!(f, "database index {index} out of range"),
            Self::ChecksumMismatch => write!(f, "checksum mismatch"),
        }
    }
}

/// Read `<dir>/<dbfilename>` into a database vector
///
/// A missing file is not an error: the caller starts with empty databases.
/// A file that exists but doesn't decode is.
pub fn load_from_disk(path: &Path) -> ServerResult<Option<Vec<Database>>> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::ioerror_extra(e, format!("reading {}", path.display()))),
    };
    let databases = decode_snapshot(&raw)?;
    Ok(Some(databases))
}

/// Decode a full snapshot byte stream
pub fn decode_snapshot(raw: &[u8]) -> Result<Vec<Database>, SnapshotError> {
    let mut decoder = SnapshotDecoder::new(raw);
    decoder.decode()?;
    Ok(decoder
        .databases
        .into_iter()
        .map(Database::with_contents)
        .collect())
}

struct SnapshotDecoder<'a> {
    raw: &'a [u8],
    cursor: usize,
    databases: Vec<HashMap<Data, ExpiringValue>>,
    db_index: usize,
}

impl<'a> SnapshotDecoder<'a> {
    fn new(raw: &'a [u8]) -> Self {
        SnapshotDecoder {
            raw,
            cursor: 0,
            databases: (0..DATABASE_COUNT).map(|_| HashMap::new()).collect(),
            db_index: 0,
        }
    }

    fn decode(&mut self) -> Result<(), SnapshotError> {
        if self.read_exact(SNAPSHOT_MAGIC.len())? != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        loop {
            match self.read_byte()? {
                OPCODE_AUX => {
                    self.read_string()?;
                    self.read_string()?;
                }
                OPCODE_RESIZEDB => {
                    // table size hints; we size nothing ahead of time
                    self.read_length()?;
                    self.read_length()?;
                }
                OPCODE_EXPIRETIMEMS => {
                    let ms = i64::from_le_bytes(self.read_array::<8>()?);
                    let value_type = self.read_byte()?;
                    self.kvpair(value_type, Some(Expiry::at_unix_millis(ms)))?;
                }
                OPCODE_EXPIRETIME => {
                    let secs = i64::from(u32::from_le_bytes(self.read_array::<4>()?));
                    let value_type = self.read_byte()?;
                    self.kvpair(value_type, Some(Expiry::at_unix_seconds(secs)))?;
                }
                OPCODE_SELECTDB => {
                    let index = self.read_length()?;
                    if index >= DATABASE_COUNT {
                        return Err(SnapshotError::BadDatabaseIndex(index));
                    }
                    self.db_index = index;
                }
                OPCODE_EOF => return self.verify_checksum(),
                value_type => self.kvpair(value_type, None)?,
            }
        }
    }

    fn kvpair(&mut self, value_type: u8, expiry: Option<Expiry>) -> Result<(), SnapshotError> {
        let key = self.read_string()?;
        let value = match value_type {
            VALUE_TYPE_STRING => Value::Str(Str::new(self.read_string()?.as_ref())),
            other => return Err(SnapshotError::UnsupportedValueType(other)),
        };
        // a key that expired while sitting on disk is silently dropped
        if expiry.is_some_and(|expiry| expiry.has_passed()) {
            return Ok(());
        }
        self.databases[self.db_index].insert(key, ExpiringValue::new(value, expiry));
        Ok(())
    }

    fn verify_checksum(&mut self) -> Result<(), SnapshotError> {
        let body_end = self.cursor;
        let stored = u64::from_le_bytes(self.read_array::<8>()?);
        if stored != 0 && CRC64.checksum(&self.raw[..body_end]) != stored {
            return Err(SnapshotError::ChecksumMismatch);
        }
        Ok(())
    }

    /// Decode one length prefix. The top two bits of the first byte select
    /// the family: 6-bit inline, 14-bit big-endian, or a four-byte
    /// big-endian length; the string-encoding family is not a length
    fn read_length(&mut self) -> Result<usize, SnapshotError> {
        let first = self.read_byte()?;
        let (msbs, lsbs) = (first >> 6, first & 0x3f);
        match msbs {
            0b00 => Ok(lsbs as usize),
            0b01 => Ok(((lsbs as usize) << 8) | self.read_byte()? as usize),
            0b10 => Ok(u32::from_be_bytes(self.read_array::<4>()?) as usize),
            _ => Err(SnapshotError::BadLength),
        }
    }

    /// Decode one string: either a length-prefixed blob or one of the
    /// special integer encodings rendered as decimal ASCII
    fn read_string(&mut self) -> Result<Data, SnapshotError> {
        let first = self.read_byte()?;
        let (msbs, lsbs) = (first >> 6, first & 0x3f);
        if msbs == 0b11 {
            let int = match lsbs {
                0 => i64::from(self.read_byte()? as i8),
                1 => i64::from(i16::from_le_bytes(self.read_array::<2>()?)),
                2 => i64::from(i32::from_le_bytes(self.read_array::<4>()?)),
                other => return Err(SnapshotError::UnsupportedStringEncoding(other)),
            };
            return Ok(Data::from_string(int.to_string()));
        }
        let length = match msbs {
            0b00 => lsbs as usize,
            0b01 => ((lsbs as usize) << 8) | self.read_byte()? as usize,
            _ => u32::from_be_bytes(self.read_array::<4>()?) as usize,
        };
        Ok(Data::copy_from_slice(self.read_exact(length)?))
    }

    fn read_byte(&mut self) -> Result<u8, SnapshotError> {
        let byte = *self.raw.get(self.cursor).ok_or(SnapshotError::UnexpectedEof)?;
        self.cursor += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, count: usize) -> Result<&'a [u8], SnapshotError> {
        if self.raw.len() - self.cursor < count {
            return Err(SnapshotError::UnexpectedEof);
        }
        let slice = &self.raw[self.cursor..self.cursor + count];
        self.cursor += count;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], SnapshotError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_exact(N)?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corestore::expiry::now_millis;

    /// A minimal snapshot writer. Only the tests need one: the server
    /// itself never persists
    #[derive(Default)]
    struct SnapshotEncoder {
        buf: Vec<u8>,
    }

    impl SnapshotEncoder {
        fn new() -> Self {
            let mut enc = Self::default();
            enc.buf.extend_from_slice(SNAPSHOT_MAGIC);
            enc
        }
        fn length(&mut self, len: usize) {
            if len < 64 {
                self.buf.push(len as u8);
            } else if len < 16384 {
                self.buf.push(0b0100_0000 | (len >> 8) as u8);
                self.buf.push(len as u8);
            } else {
                self.buf.push(0b1000_0000);
                self.buf.extend_from_slice(&(len as u32).to_be_bytes());
            }
        }
        fn string(&mut self, bytes: &[u8]) {
            self.length(bytes.len());
            self.buf.extend_from_slice(bytes);
        }
        fn aux(&mut self, key: &[u8], value: &[u8]) {
            self.buf.push(OPCODE_AUX);
            self.string(key);
            self.string(value);
        }
        fn selectdb(&mut self, index: usize) {
            self.buf.push(OPCODE_SELECTDB);
            self.length(index);
        }
        fn resizedb(&mut self, size: usize, expires: usize) {
            self.buf.push(OPCODE_RESIZEDB);
            self.length(size);
            self.length(expires);
        }
        fn kv(&mut self, key: &[u8], value: &[u8]) {
            self.buf.push(VALUE_TYPE_STRING);
            self.string(key);
            self.string(value);
        }
        fn kv_expiring_ms(&mut self, key: &[u8], value: &[u8], at_ms: i64) {
            self.buf.push(OPCODE_EXPIRETIMEMS);
            self.buf.extend_from_slice(&at_ms.to_le_bytes());
            self.kv(key, value);
        }
        fn int_string(&mut self, value: i32) {
            self.buf.push(0b1100_0000 | 2);
            self.buf.extend_from_slice(&value.to_le_bytes());
        }
        fn finish(mut self) -> Vec<u8> {
            self.buf.push(OPCODE_EOF);
            let crc = CRC64.checksum(&self.buf);
            self.buf.extend_from_slice(&crc.to_le_bytes());
            self.buf
        }
    }

    fn get_string(databases: &mut [Database], index: usize, key: &[u8]) -> Option<Vec<u8>> {
        match databases[index].get_mut().get(key) {
            Some(Value::Str(s)) => Some(s.as_bytes().to_vec()),
            Some(_) => panic!("wrong type on load"),
            None => None,
        }
    }

    #[test]
    fn empty_snapshot() {
        let raw = SnapshotEncoder::new().finish();
        let databases = decode_snapshot(&raw).unwrap();
        assert_eq!(databases.len(), DATABASE_COUNT);
    }

    #[test]
    fn zero_trailer_is_accepted() {
        let mut raw = SNAPSHOT_MAGIC.to_vec();
        raw.push(OPCODE_EOF);
        raw.extend_from_slice(&[0u8; 8]);
        assert!(decode_snapshot(&raw).is_ok());
    }

    #[test]
    fn bad_magic() {
        assert_eq!(
            decode_snapshot(b"REDIS9999\xff\0\0\0\0\0\0\0\0").unwrap_err(),
            SnapshotError::BadMagic
        );
    }

    #[test]
    fn truncated_stream() {
        let raw = SnapshotEncoder::new().finish();
        assert_eq!(
            decode_snapshot(&raw[..raw.len() - 4]).unwrap_err(),
            SnapshotError::UnexpectedEof
        );
    }

    #[test]
    fn checksum_mismatch_is_fatal() {
        let mut raw = SnapshotEncoder::new().finish();
        let last = raw.len() - 1;
        raw[last] ^= 0xaa;
        assert_eq!(
            decode_snapshot(&raw).unwrap_err(),
            SnapshotError::ChecksumMismatch
        );
    }

    #[test]
    fn kvpairs_aux_and_selectdb() {
        let mut enc = SnapshotEncoder::new();
        enc.aux(b"redis-ver", b"7.2.0");
        enc.resizedb(2, 0);
        enc.kv(b"foo", b"bar");
        enc.selectdb(3);
        enc.kv(b"baz", b"quux");
        let mut databases = decode_snapshot(&enc.finish()).unwrap();
        assert_eq!(get_string(&mut databases, 0, b"foo").unwrap(), b"bar");
        assert_eq!(get_string(&mut databases, 3, b"baz").unwrap(), b"quux");
        assert!(get_string(&mut databases, 0, b"baz").is_none());
    }

    #[test]
    fn expired_on_load_is_dropped() {
        let mut enc = SnapshotEncoder::new();
        enc.kv_expiring_ms(b"dead", b"x", 1);
        enc.kv_expiring_ms(b"alive", b"y", now_millis() + 60_000);
        let mut databases = decode_snapshot(&enc.finish()).unwrap();
        assert!(get_string(&mut databases, 0, b"dead").is_none());
        assert_eq!(get_string(&mut databases, 0, b"alive").unwrap(), b"y");
    }

    #[test]
    fn length_families() {
        let mut enc = SnapshotEncoder::new();
        let long_key = vec![b'k'; 300]; // forces the 14-bit family
        let huge_val = vec![b'v'; 20_000]; // forces the 32-bit family
        enc.kv(&long_key, &huge_val);
        let mut databases = decode_snapshot(&enc.finish()).unwrap();
        assert_eq!(get_string(&mut databases, 0, &long_key).unwrap(), huge_val);
    }

    #[test]
    fn integer_string_encodings() {
        let mut enc = SnapshotEncoder::new();
        enc.buf.push(VALUE_TYPE_STRING);
        enc.string(b"counter");
        enc.int_string(-12345);
        let mut databases = decode_snapshot(&enc.finish()).unwrap();
        assert_eq!(get_string(&mut databases, 0, b"counter").unwrap(), b"-12345");
    }

    #[test]
    fn one_byte_int_string() {
        let mut enc = SnapshotEncoder::new();
        enc.buf.push(VALUE_TYPE_STRING);
        enc.string(b"small");
        enc.buf.push(0b1100_0000);
        enc.buf.push(42);
        let mut databases = decode_snapshot(&enc.finish()).unwrap();
        assert_eq!(get_string(&mut databases, 0, b"small").unwrap(), b"42");
    }

    #[test]
    fn lzf_strings_are_rejected() {
        let mut enc = SnapshotEncoder::new();
        enc.buf.push(VALUE_TYPE_STRING);
        enc.string(b"key");
        enc.buf.push(0b1100_0000 | 3);
        assert_eq!(
            decode_snapshot(&enc.finish()).unwrap_err(),
            SnapshotError::UnsupportedStringEncoding(3)
        );
    }

    #[test]
    fn unknown_value_type_is_fatal() {
        let mut enc = SnapshotEncoder::new();
        enc.buf.push(9); // a set, which the loader doesn't speak
        enc.string(b"key");
        enc.string(b"value");
        assert_eq!(
            decode_snapshot(&enc.finish()).unwrap_err(),
            SnapshotError::UnsupportedValueType(9)
        );
    }

    #[test]
    fn selectdb_out_of_range() {
        let mut enc = SnapshotEncoder::new();
        enc.selectdb(16);
        assert_eq!(
            decode_snapshot(&enc.finish()).unwrap_err(),
            SnapshotError::BadDatabaseIndex(16)
        );
    }

    #[test]
    fn arbitrary_binary_payloads_round_trip() {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let blob: Vec<u8> = (0..512).map(|_| rng.gen()).collect();
        let mut enc = SnapshotEncoder::new();
        enc.kv(b"blob", &blob);
        let mut databases = decode_snapshot(&enc.finish()).unwrap();
        assert_eq!(get_string(&mut databases, 0, b"blob").unwrap(), blob);
    }

    #[test]
    fn set_sequence_round_trips() {
        // the moral equivalent of replaying `SET k<i> v<i>` and dumping
        let pairs: Vec<(Vec<u8>, Vec<u8>)> = (0..100)
            .map(|i| {
                (
                    format!("key-{i}").into_bytes(),
                    format!("value-{i}").into_bytes(),
                )
            })
            .collect();
        let mut enc = SnapshotEncoder::new();
        for (key, value) in &pairs {
            enc.kv(key, value);
        }
        let mut databases = decode_snapshot(&enc.finish()).unwrap();
        for (key, value) in &pairs {
            assert_eq!(&get_string(&mut databases, 0, key).unwrap(), value);
        }
    }
}
