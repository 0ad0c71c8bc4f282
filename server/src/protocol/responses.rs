/*
 * Created on Sat Mar 19 2022
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

//! Pre-encoded responses
//!
//! These are responses that we know beforehand, so we don't pay for encoding
//! them on every reply.

pub mod groups {
    //! Response groups which are shared across actions

    /// `+OK`
    pub const OK: &[u8] = b"+OK\r\n";
    /// `+PONG`
    pub const PONG: &[u8] = b"+PONG\r\n";
    /// Reply to a command enqueued into an active transaction
    pub const QUEUED: &[u8] = b"+QUEUED\r\n";
    /// The distinguished null bulk string
    pub const NIL_BULK: &[u8] = b"$-1\r\n";
    /// The distinguished null array
    pub const NIL_ARRAY: &[u8] = b"*-1\r\n";
    /// An array with no elements
    pub const EMPTY_ARRAY: &[u8] = b"*0\r\n";
    /// An operation was attempted against a value of the wrong kind
    pub const WRONGTYPE_ERR: &[u8] =
        b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n";
    /// The stored bytes don't parse as a signed 64-bit decimal integer
    pub const NOT_AN_INT_ERR: &[u8] = b"-ERR value is not an integer or out of range\r\n";
    /// A score argument didn't parse as a 64-bit float
    pub const NOT_A_FLOAT_ERR: &[u8] = b"-ERR value is not a valid float\r\n";
    /// A timeout argument didn't parse or was negative
    pub const BAD_TIMEOUT_ERR: &[u8] = b"-ERR timeout is not a float or out of range\r\n";
    /// A count argument was negative or didn't parse
    pub const NOT_POSITIVE_ERR: &[u8] = b"-ERR value is out of range, must be positive\r\n";
    /// An explicit stream entry ID was not of the form `ms-seq`
    pub const BAD_STREAM_ID_ERR: &[u8] =
        b"-ERR Invalid stream ID specified as stream command argument\r\n";
    /// The explicit stream entry ID was `0-0`
    pub const STREAM_ID_ZERO_ERR: &[u8] =
        b"-ERR The ID specified in XADD must be greater than 0-0\r\n";
    /// The explicit stream entry ID didn't top the stream
    pub const STREAM_ID_SMALL_ERR: &[u8] =
        b"-ERR The ID specified in XADD is equal or smaller than the target stream top item\r\n";
    /// `MULTI` was called inside an active transaction
    pub const MULTI_NESTED_ERR: &[u8] = b"-ERR MULTI calls can not be nested\r\n";
    /// `EXEC` was called with no active transaction
    pub const EXEC_WITHOUT_MULTI_ERR: &[u8] = b"-ERR EXEC without MULTI\r\n";
    /// `DISCARD` was called with no active transaction
    pub const DISCARD_WITHOUT_MULTI_ERR: &[u8] = b"-ERR DISCARD without MULTI\r\n";
}

pub mod usage {
    //! Syntax error responses, one per command, formed from the command usage

    pub const PING: &[u8] = b"-ERR PING command syntax: PING\r\n";
    pub const ECHO: &[u8] = b"-ERR ECHO command syntax: ECHO message\r\n";
    pub const SET: &[u8] = b"-ERR SET command syntax: SET key value [PX milliseconds]\r\n";
    pub const GET: &[u8] = b"-ERR GET command syntax: GET key\r\n";
    pub const INCR: &[u8] = b"-ERR INCR command syntax: INCR key\r\n";
    pub const LPUSH: &[u8] = b"-ERR LPUSH command syntax: LPUSH key value [value ...]\r\n";
    pub const RPUSH: &[u8] = b"-ERR RPUSH command syntax: RPUSH key value [value ...]\r\n";
    pub const LPOP: &[u8] = b"-ERR LPOP command syntax: LPOP key [count]\r\n";
    pub const LLEN: &[u8] = b"-ERR LLEN command syntax: LLEN key\r\n";
    pub const LRANGE: &[u8] = b"-ERR LRANGE command syntax: LRANGE key start stop\r\n";
    pub const BLPOP: &[u8] = b"-ERR BLPOP command syntax: BLPOP key timeout\r\n";
    pub const ZADD: &[u8] =
        b"-ERR ZADD command syntax: ZADD key score member [score member ...]\r\n";
    pub const ZRANK: &[u8] = b"-ERR ZRANK command syntax: ZRANK key member\r\n";
    pub const ZRANGE: &[u8] = b"-ERR ZRANGE command syntax: ZRANGE key start stop\r\n";
    pub const ZSCORE: &[u8] = b"-ERR ZSCORE command syntax: ZSCORE key member\r\n";
    pub const ZREM: &[u8] = b"-ERR ZREM command syntax: ZREM key member [member ...]\r\n";
    pub const ZCARD: &[u8] = b"-ERR ZCARD command syntax: ZCARD key\r\n";
    pub const XADD: &[u8] =
        b"-ERR XADD command syntax: XADD key id field value [field value ...]\r\n";
    pub const XRANGE: &[u8] = b"-ERR XRANGE command syntax: XRANGE key start end\r\n";
    pub const XREAD: &[u8] =
        b"-ERR XREAD command syntax: XREAD [BLOCK milliseconds] STREAMS key [key ...] id [id ...]\r\n";
    pub const KEYS: &[u8] = b"-ERR KEYS command syntax: KEYS pattern\r\n";
    pub const TYPE: &[u8] = b"-ERR TYPE command syntax: TYPE key\r\n";
    pub const MULTI: &[u8] = b"-ERR MULTI command syntax: MULTI\r\n";
    pub const EXEC: &[u8] = b"-ERR EXEC command syntax: EXEC\r\n";
    pub const DISCARD: &[u8] = b"-ERR DISCARD command syntax: DISCARD\r\n";
    pub const SUBSCRIBE: &[u8] = b"-ERR SUBSCRIBE command syntax: SUBSCRIBE channel\r\n";
    pub const UNSUBSCRIBE: &[u8] = b"-ERR UNSUBSCRIBE command syntax: UNSUBSCRIBE channel\r\n";
    pub const PUBLISH: &[u8] = b"-ERR PUBLISH command syntax: PUBLISH channel message\r\n";
    pub const CONFIG_GET: &[u8] =
        b"-ERR CONFIG GET command syntax: CONFIG GET parameter [parameter ...]\r\n";
    pub const INFO: &[u8] = b"-ERR INFO command syntax: INFO [section]\r\n";
    pub const REPLCONF: &[u8] = b"-ERR REPLCONF command syntax: REPLCONF option value\r\n";
    pub const PSYNC: &[u8] = b"-ERR PSYNC command syntax: PSYNC replicationid offset\r\n";
    pub const WAIT: &[u8] = b"-ERR WAIT command syntax: WAIT numreplicas timeout\r\n";
}
