/*
 * Created on Tue Apr 12 2022
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

//! End-to-end tests: real frames in, real frames out, through a live
//! handler task on a duplex pair

use crate::corestore::value::Value;
use crate::util::test_utils::{assert_reply, read_exactly, TestServer};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::sleep;

#[tokio::test]
async fn ping_and_echo() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(&mut con, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
    assert_reply(&mut con, b"*2\r\n$4\r\nECHO\r\n$3\r\nhey\r\n", b"$3\r\nhey\r\n").await;
}

#[tokio::test]
async fn set_get_and_missing() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(
        &mut con,
        b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n",
        b"+OK\r\n",
    )
    .await;
    assert_reply(&mut con, b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n", b"$3\r\nbar\r\n").await;
    assert_reply(&mut con, b"*2\r\n$3\r\nGET\r\n$7\r\nmissing\r\n", b"$-1\r\n").await;
}

#[tokio::test]
async fn set_with_px_expires() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(
        &mut con,
        b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nPX\r\n$2\r\n40\r\n",
        b"+OK\r\n",
    )
    .await;
    assert_reply(&mut con, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", b"$1\r\nv\r\n").await;
    sleep(Duration::from_millis(60)).await;
    assert_reply(&mut con, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", b"$-1\r\n").await;
}

#[tokio::test]
async fn incr_fresh_existing_and_bad() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(&mut con, b"*2\r\n$4\r\nINCR\r\n$1\r\nx\r\n", b":1\r\n").await;
    assert_reply(&mut con, b"*2\r\n$4\r\nINCR\r\n$1\r\nx\r\n", b":2\r\n").await;
    assert_reply(
        &mut con,
        b"*3\r\n$3\r\nSET\r\n$1\r\nn\r\n$3\r\nabc\r\n",
        b"+OK\r\n",
    )
    .await;
    assert_reply(
        &mut con,
        b"*2\r\n$4\r\nINCR\r\n$1\r\nn\r\n",
        b"-ERR value is not an integer or out of range\r\n",
    )
    .await;
}

#[tokio::test]
async fn list_push_range_pop() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(
        &mut con,
        b"*5\r\n$5\r\nRPUSH\r\n$1\r\nl\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n",
        b":3\r\n",
    )
    .await;
    assert_reply(&mut con, b"*2\r\n$4\r\nLLEN\r\n$1\r\nl\r\n", b":3\r\n").await;
    assert_reply(
        &mut con,
        b"*4\r\n$6\r\nLRANGE\r\n$1\r\nl\r\n$1\r\n0\r\n$2\r\n-1\r\n",
        b"*3\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n",
    )
    .await;
    // normalized start > stop is an empty array
    assert_reply(
        &mut con,
        b"*4\r\n$6\r\nLRANGE\r\n$1\r\nl\r\n$1\r\n1\r\n$1\r\n0\r\n",
        b"*0\r\n",
    )
    .await;
    assert_reply(
        &mut con,
        b"*3\r\n$4\r\nLPOP\r\n$1\r\nl\r\n$1\r\n2\r\n",
        b"*2\r\n$1\r\na\r\n$1\r\nb\r\n",
    )
    .await;
}

#[tokio::test]
async fn lpop_on_missing_and_emptied_keys() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(&mut con, b"*2\r\n$4\r\nLPOP\r\n$1\r\nq\r\n", b"$-1\r\n").await;
    assert_reply(
        &mut con,
        b"*3\r\n$5\r\nRPUSH\r\n$1\r\nq\r\n$1\r\na\r\n",
        b":1\r\n",
    )
    .await;
    assert_reply(&mut con, b"*2\r\n$4\r\nLPOP\r\n$1\r\nq\r\n", b"$1\r\na\r\n").await;
    // the emptied list must collapse to an absent key
    assert_reply(&mut con, b"*2\r\n$4\r\nTYPE\r\n$1\r\nq\r\n", b"+none\r\n").await;
}

#[tokio::test]
async fn lpush_ordering() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(
        &mut con,
        b"*4\r\n$5\r\nLPUSH\r\n$1\r\nl\r\n$1\r\na\r\n$1\r\nb\r\n",
        b":2\r\n",
    )
    .await;
    // the last pushed argument lands at index 0
    assert_reply(
        &mut con,
        b"*4\r\n$6\r\nLRANGE\r\n$1\r\nl\r\n$1\r\n0\r\n$2\r\n-1\r\n",
        b"*2\r\n$1\r\nb\r\n$1\r\na\r\n",
    )
    .await;
}

#[tokio::test]
async fn wrongtype_errors() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(
        &mut con,
        b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n",
        b"+OK\r\n",
    )
    .await;
    assert_reply(
        &mut con,
        b"*3\r\n$5\r\nLPUSH\r\n$1\r\nk\r\n$1\r\nx\r\n",
        b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n",
    )
    .await;
    assert_reply(
        &mut con,
        b"*2\r\n$4\r\nLLEN\r\n$1\r\nk\r\n",
        b"-WRONGTYPE Operation against a key holding the wrong kind of value\r\n",
    )
    .await;
}

#[tokio::test]
async fn transaction_happy_path() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(&mut con, b"*1\r\n$5\r\nMULTI\r\n", b"+OK\r\n").await;
    assert_reply(&mut con, b"*2\r\n$4\r\nINCR\r\n$1\r\nx\r\n", b"+QUEUED\r\n").await;
    assert_reply(&mut con, b"*2\r\n$4\r\nINCR\r\n$1\r\nx\r\n", b"+QUEUED\r\n").await;
    assert_reply(&mut con, b"*1\r\n$4\r\nEXEC\r\n", b"*2\r\n:1\r\n:2\r\n").await;
}

#[tokio::test]
async fn transaction_control_errors() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(&mut con, b"*1\r\n$4\r\nEXEC\r\n", b"-ERR EXEC without MULTI\r\n").await;
    assert_reply(
        &mut con,
        b"*1\r\n$7\r\nDISCARD\r\n",
        b"-ERR DISCARD without MULTI\r\n",
    )
    .await;
    assert_reply(&mut con, b"*1\r\n$5\r\nMULTI\r\n", b"+OK\r\n").await;
    assert_reply(
        &mut con,
        b"*1\r\n$5\r\nMULTI\r\n",
        b"-ERR MULTI calls can not be nested\r\n",
    )
    .await;
    assert_reply(&mut con, b"*1\r\n$7\r\nDISCARD\r\n", b"+OK\r\n").await;
    // the discarded queue must not run
    assert_reply(&mut con, b"*1\r\n$4\r\nEXEC\r\n", b"-ERR EXEC without MULTI\r\n").await;
}

#[tokio::test]
async fn transaction_errors_do_not_abort_the_queue() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(&mut con, b"*1\r\n$5\r\nMULTI\r\n", b"+OK\r\n").await;
    assert_reply(
        &mut con,
        b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n",
        b"+QUEUED\r\n",
    )
    .await;
    assert_reply(
        &mut con,
        b"*3\r\n$5\r\nLPUSH\r\n$1\r\nk\r\n$1\r\nx\r\n",
        b"+QUEUED\r\n",
    )
    .await;
    assert_reply(&mut con, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", b"+QUEUED\r\n").await;
    assert_reply(
        &mut con,
        b"*1\r\n$4\r\nEXEC\r\n",
        b"*3\r\n+OK\r\n-WRONGTYPE Operation against a key holding the wrong kind of value\r\n$1\r\nv\r\n",
    )
    .await;
}

#[tokio::test]
async fn blpop_wakes_on_push_from_another_connection() {
    let server = TestServer::new();
    let mut a = server.connect();
    let mut b = server.connect();
    a.write_all(b"*3\r\n$5\r\nBLPOP\r\n$1\r\nq\r\n$1\r\n0\r\n")
        .await
        .unwrap();
    // give A a moment to park on the key
    sleep(Duration::from_millis(50)).await;
    assert_reply(
        &mut b,
        b"*3\r\n$5\r\nLPUSH\r\n$1\r\nq\r\n$1\r\nv\r\n",
        b":1\r\n",
    )
    .await;
    let got = read_exactly(&mut a, b"*2\r\n$1\r\nq\r\n$1\r\nv\r\n".len()).await;
    assert_eq!(got, b"*2\r\n$1\r\nq\r\n$1\r\nv\r\n");
    // and the consumed value is gone
    assert_reply(&mut b, b"*2\r\n$4\r\nTYPE\r\n$1\r\nq\r\n", b"+none\r\n").await;
}

#[tokio::test]
async fn blpop_times_out_with_null_array() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(
        &mut con,
        b"*3\r\n$5\r\nBLPOP\r\n$1\r\nq\r\n$3\r\n0.1\r\n",
        b"*-1\r\n",
    )
    .await;
}

#[tokio::test]
async fn sorted_set_order_and_lookups() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(
        &mut con,
        b"*8\r\n$4\r\nZADD\r\n$1\r\nz\r\n$1\r\n1\r\n$1\r\na\r\n$1\r\n2\r\n$1\r\nb\r\n$1\r\n1\r\n$1\r\nc\r\n",
        b":3\r\n",
    )
    .await;
    // ascending (score, member): a (1), c (1), b (2)
    assert_reply(
        &mut con,
        b"*4\r\n$6\r\nZRANGE\r\n$1\r\nz\r\n$1\r\n0\r\n$2\r\n-1\r\n",
        b"*3\r\n$1\r\na\r\n$1\r\nc\r\n$1\r\nb\r\n",
    )
    .await;
    assert_reply(&mut con, b"*3\r\n$5\r\nZRANK\r\n$1\r\nz\r\n$1\r\nb\r\n", b":2\r\n").await;
    assert_reply(
        &mut con,
        b"*3\r\n$6\r\nZSCORE\r\n$1\r\nz\r\n$1\r\nb\r\n",
        b"$1\r\n2\r\n",
    )
    .await;
    assert_reply(&mut con, b"*2\r\n$5\r\nZCARD\r\n$1\r\nz\r\n", b":3\r\n").await;
    assert_reply(
        &mut con,
        b"*4\r\n$4\r\nZREM\r\n$1\r\nz\r\n$1\r\na\r\n$1\r\nq\r\n",
        b":1\r\n",
    )
    .await;
    assert_reply(&mut con, b"*2\r\n$5\r\nZCARD\r\n$1\r\nz\r\n", b":2\r\n").await;
    // removing the rest collapses the key
    assert_reply(
        &mut con,
        b"*4\r\n$4\r\nZREM\r\n$1\r\nz\r\n$1\r\nb\r\n$1\r\nc\r\n",
        b":2\r\n",
    )
    .await;
    assert_reply(&mut con, b"*2\r\n$4\r\nTYPE\r\n$1\r\nz\r\n", b"+none\r\n").await;
}

#[tokio::test]
async fn xadd_id_rules() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(
        &mut con,
        b"*5\r\n$4\r\nXADD\r\n$1\r\ns\r\n$3\r\n1-1\r\n$1\r\nf\r\n$1\r\nv\r\n",
        b"$3\r\n1-1\r\n",
    )
    .await;
    assert_reply(
        &mut con,
        b"*5\r\n$4\r\nXADD\r\n$1\r\ns\r\n$3\r\n1-1\r\n$1\r\nf\r\n$1\r\nv\r\n",
        b"-ERR The ID specified in XADD is equal or smaller than the target stream top item\r\n",
    )
    .await;
    assert_reply(
        &mut con,
        b"*5\r\n$4\r\nXADD\r\n$1\r\ns\r\n$3\r\n0-0\r\n$1\r\nf\r\n$1\r\nv\r\n",
        b"-ERR The ID specified in XADD must be greater than 0-0\r\n",
    )
    .await;
    // partial auto-generation picks the next sequence for that ms
    assert_reply(
        &mut con,
        b"*5\r\n$4\r\nXADD\r\n$1\r\ns\r\n$3\r\n1-*\r\n$1\r\nf\r\n$1\r\nv\r\n",
        b"$3\r\n1-2\r\n",
    )
    .await;
    assert_reply(&mut con, b"*2\r\n$4\r\nTYPE\r\n$1\r\ns\r\n", b"+stream\r\n").await;
}

#[tokio::test]
async fn xrange_windows() {
    let server = TestServer::new();
    let mut con = server.connect();
    for id in [&b"1-1"[..], b"1-2", b"2-1"] {
        let mut frame = Vec::new();
        frame.extend_from_slice(b"*5\r\n$4\r\nXADD\r\n$1\r\ns\r\n$3\r\n");
        frame.extend_from_slice(id);
        frame.extend_from_slice(b"\r\n$1\r\nf\r\n$1\r\nv\r\n");
        con.write_all(&frame).await.unwrap();
        let header = read_exactly(&mut con, 4).await;
        assert_eq!(&header[..2], b"$3");
        read_exactly(&mut con, 5).await; // the id body + crlf
    }
    // a bare ms start/end covers that whole millisecond
    assert_reply(
        &mut con,
        b"*4\r\n$6\r\nXRANGE\r\n$1\r\ns\r\n$1\r\n1\r\n$1\r\n1\r\n",
        b"*2\r\n*2\r\n$3\r\n1-1\r\n*2\r\n$1\r\nf\r\n$1\r\nv\r\n*2\r\n$3\r\n1-2\r\n*2\r\n$1\r\nf\r\n$1\r\nv\r\n",
    )
    .await;
    // - and + span everything
    assert_reply(
        &mut con,
        b"*4\r\n$6\r\nXRANGE\r\n$1\r\ns\r\n$1\r\n-\r\n$1\r\n+\r\n",
        b"*3\r\n*2\r\n$3\r\n1-1\r\n*2\r\n$1\r\nf\r\n$1\r\nv\r\n*2\r\n$3\r\n1-2\r\n*2\r\n$1\r\nf\r\n$1\r\nv\r\n*2\r\n$3\r\n2-1\r\n*2\r\n$1\r\nf\r\n$1\r\nv\r\n",
    )
    .await;
    assert_reply(
        &mut con,
        b"*4\r\n$6\r\nXRANGE\r\n$7\r\nnostream\r\n$1\r\n-\r\n$1\r\n+\r\n",
        b"*0\r\n",
    )
    .await;
}

#[tokio::test]
async fn xread_returns_strictly_newer_entries() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(
        &mut con,
        b"*5\r\n$4\r\nXADD\r\n$1\r\ns\r\n$3\r\n1-1\r\n$1\r\nf\r\n$1\r\nv\r\n",
        b"$3\r\n1-1\r\n",
    )
    .await;
    assert_reply(
        &mut con,
        b"*5\r\n$4\r\nXADD\r\n$1\r\ns\r\n$3\r\n1-2\r\n$1\r\nf\r\n$1\r\nv\r\n",
        b"$3\r\n1-2\r\n",
    )
    .await;
    assert_reply(
        &mut con,
        b"*4\r\n$5\r\nXREAD\r\n$7\r\nSTREAMS\r\n$1\r\ns\r\n$3\r\n1-1\r\n",
        b"*1\r\n*2\r\n$1\r\ns\r\n*1\r\n*2\r\n$3\r\n1-2\r\n*2\r\n$1\r\nf\r\n$1\r\nv\r\n",
    )
    .await;
    // nothing newer than the tail
    assert_reply(
        &mut con,
        b"*4\r\n$5\r\nXREAD\r\n$7\r\nSTREAMS\r\n$1\r\ns\r\n$3\r\n1-2\r\n",
        b"$-1\r\n",
    )
    .await;
}

#[tokio::test]
async fn xread_block_wakes_on_xadd() {
    let server = TestServer::new();
    let mut a = server.connect();
    let mut b = server.connect();
    a.write_all(b"*6\r\n$5\r\nXREAD\r\n$5\r\nBLOCK\r\n$1\r\n0\r\n$7\r\nSTREAMS\r\n$1\r\ns\r\n$1\r\n$\r\n")
        .await
        .unwrap();
    sleep(Duration::from_millis(50)).await;
    assert_reply(
        &mut b,
        b"*5\r\n$4\r\nXADD\r\n$1\r\ns\r\n$3\r\n1-1\r\n$1\r\nf\r\n$1\r\nv\r\n",
        b"$3\r\n1-1\r\n",
    )
    .await;
    let expected = b"*1\r\n*2\r\n$1\r\ns\r\n*1\r\n*2\r\n$3\r\n1-1\r\n*2\r\n$1\r\nf\r\n$1\r\nv\r\n";
    let got = read_exactly(&mut a, expected.len()).await;
    assert_eq!(got, expected);
}

#[tokio::test]
async fn xread_block_times_out_with_null_bulk() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(
        &mut con,
        b"*6\r\n$5\r\nXREAD\r\n$5\r\nBLOCK\r\n$3\r\n100\r\n$7\r\nSTREAMS\r\n$1\r\ns\r\n$1\r\n$\r\n",
        b"$-1\r\n",
    )
    .await;
}

#[tokio::test]
async fn keys_and_type() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(
        &mut con,
        b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n",
        b"+OK\r\n",
    )
    .await;
    assert_reply(
        &mut con,
        b"*3\r\n$3\r\nSET\r\n$3\r\nbaz\r\n$3\r\nqux\r\n",
        b"+OK\r\n",
    )
    .await;
    assert_reply(
        &mut con,
        b"*2\r\n$4\r\nKEYS\r\n$2\r\nf*\r\n",
        b"*1\r\n$3\r\nfoo\r\n",
    )
    .await;
    assert_reply(&mut con, b"*2\r\n$4\r\nTYPE\r\n$3\r\nfoo\r\n", b"+string\r\n").await;
    assert_reply(&mut con, b"*2\r\n$4\r\nTYPE\r\n$2\r\nzz\r\n", b"+none\r\n").await;
}

#[tokio::test]
async fn config_get_surface() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(
        &mut con,
        b"*3\r\n$6\r\nCONFIG\r\n$3\r\nGET\r\n$3\r\ndir\r\n",
        b"*2\r\n$3\r\ndir\r\n$2\r\n./\r\n",
    )
    .await;
    // unknown parameters are skipped, recognised ones still listed
    assert_reply(
        &mut con,
        b"*4\r\n$6\r\nCONFIG\r\n$3\r\nGET\r\n$7\r\nunknown\r\n$10\r\ndbfilename\r\n",
        b"*2\r\n$10\r\ndbfilename\r\n$8\r\ndump.rdb\r\n",
    )
    .await;
    assert_reply(
        &mut con,
        b"*3\r\n$6\r\nCONFIG\r\n$3\r\nFOO\r\n$3\r\ndir\r\n",
        b"-ERR unknown subcommand 'FOO' for 'CONFIG'\r\n",
    )
    .await;
}

#[tokio::test]
async fn info_reports_replication_state() {
    let server = TestServer::new();
    let mut con = server.connect();
    con.write_all(b"*2\r\n$4\r\nINFO\r\n$11\r\nreplication\r\n")
        .await
        .unwrap();
    // role:master\r\n (13) + master_replid:<40>\r\n (56) +
    // master_repl_offset:0 (20) = 89 payload bytes
    let header = read_exactly(&mut con, 5).await;
    assert_eq!(header, b"$89\r\n");
    let body = read_exactly(&mut con, 91).await;
    assert!(body.starts_with(b"role:master\r\nmaster_replid:"));
    assert!(body.ends_with(b"master_repl_offset:0\r\n"));
}

#[tokio::test]
async fn pubsub_fan_out_and_restrictions() {
    let server = TestServer::new();
    let mut a = server.connect();
    let mut b = server.connect();
    assert_reply(
        &mut a,
        b"*2\r\n$9\r\nSUBSCRIBE\r\n$4\r\nnews\r\n",
        b"*3\r\n$9\r\nsubscribe\r\n$4\r\nnews\r\n:1\r\n",
    )
    .await;
    assert_reply(
        &mut b,
        b"*3\r\n$7\r\nPUBLISH\r\n$4\r\nnews\r\n$2\r\nhi\r\n",
        b":1\r\n",
    )
    .await;
    let expected = b"*3\r\n$7\r\nmessage\r\n$4\r\nnews\r\n$2\r\nhi\r\n";
    let got = read_exactly(&mut a, expected.len()).await;
    assert_eq!(got, expected);
    // ordinary commands are locked out while subscribed
    assert_reply(
        &mut a,
        b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n",
        b"-ERR Can't execute 'get': only (P|S)SUBSCRIBE / (P|S)UNSUBSCRIBE / PING / QUIT / RESET are allowed in this context\r\n",
    )
    .await;
    assert_reply(&mut a, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
    assert_reply(
        &mut a,
        b"*2\r\n$11\r\nUNSUBSCRIBE\r\n$4\r\nnews\r\n",
        b"*3\r\n$11\r\nunsubscribe\r\n$4\r\nnews\r\n:0\r\n",
    )
    .await;
    assert_reply(&mut a, b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n", b"$-1\r\n").await;
    // nobody is listening any more
    assert_reply(
        &mut b,
        b"*3\r\n$7\r\nPUBLISH\r\n$4\r\nnews\r\n$2\r\nhi\r\n",
        b":0\r\n",
    )
    .await;
}

#[tokio::test]
async fn psync_promotes_and_writes_propagate() {
    let server = TestServer::new();
    let mut follower = server.connect();
    let mut client = server.connect();
    follower
        .write_all(b"*3\r\n$5\r\nPSYNC\r\n$1\r\n?\r\n$2\r\n-1\r\n")
        .await
        .unwrap();
    // +FULLRESYNC <40 hex> 0\r\n
    let fullresync = read_exactly(&mut follower, 56).await;
    assert!(fullresync.starts_with(b"+FULLRESYNC "));
    assert!(fullresync.ends_with(b" 0\r\n"));
    // the snapshot bulk: $18\r\n + 18 bytes, no trailing CRLF
    let header = read_exactly(&mut follower, 5).await;
    assert_eq!(header, b"$18\r\n");
    let snapshot = read_exactly(&mut follower, 18).await;
    assert!(snapshot.starts_with(b"REDIS0011"));
    // let the promotion land before issuing writes
    sleep(Duration::from_millis(50)).await;
    assert_reply(
        &mut client,
        b"*3\r\n$4\r\nWAIT\r\n$1\r\n0\r\n$3\r\n100\r\n",
        b":1\r\n",
    )
    .await;
    assert_reply(
        &mut client,
        b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n",
        b"+OK\r\n",
    )
    .await;
    assert_reply(&mut client, b"*2\r\n$4\r\nINCR\r\n$1\r\nc\r\n", b":1\r\n").await;
    // the follower receives byte-exact canonical encodings, in order
    let expected = b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n*2\r\n$4\r\nINCR\r\n$1\r\nc\r\n";
    let got = read_exactly(&mut follower, expected.len()).await;
    assert_eq!(got, expected);
    // reads are not propagated
    assert_reply(&mut client, b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n", b"$3\r\nbar\r\n").await;
    assert_reply(&mut client, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
    assert_reply(&mut client, b"*2\r\n$4\r\nINCR\r\n$1\r\nc\r\n", b":2\r\n").await;
    let expected = b"*2\r\n$4\r\nINCR\r\n$1\r\nc\r\n";
    let got = read_exactly(&mut follower, expected.len()).await;
    assert_eq!(got, expected);
}

#[tokio::test]
async fn replica_link_executes_quietly_and_acks() {
    let server = TestServer::new();
    let mut leader = server.connect_replica_link();
    leader
        .write_all(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n")
        .await
        .unwrap();
    // the only bytes ever coming back are ACKs; the offset counts the 31
    // bytes of the SET frame processed before the GETACK
    leader
        .write_all(b"*3\r\n$8\r\nREPLCONF\r\n$6\r\nGETACK\r\n$1\r\n*\r\n")
        .await
        .unwrap();
    let expected = b"*3\r\n$8\r\nREPLCONF\r\n$3\r\nACK\r\n$2\r\n31\r\n";
    let got = read_exactly(&mut leader, expected.len()).await;
    assert_eq!(got, expected);
    // the write really landed
    let mut guard = server.store.default_database().lock().await;
    match guard.get(b"foo") {
        Some(Value::Str(s)) => assert_eq!(s.as_bytes(), b"bar"),
        other => panic!("expected the upstream SET to apply, got {other:?}"),
    }
}

#[tokio::test]
async fn pipelined_frames_are_served_in_order() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(
        &mut con,
        b"*1\r\n$4\r\nPING\r\n*2\r\n$4\r\nECHO\r\n$2\r\nhi\r\n",
        b"+PONG\r\n$2\r\nhi\r\n",
    )
    .await;
}

#[tokio::test]
async fn unknown_commands_and_protocol_errors() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(
        &mut con,
        b"*1\r\n$5\r\nBOGUS\r\n",
        b"-ERR unknown command 'BOGUS'\r\n",
    )
    .await;
    // a malformed frame closes the connection without a reply
    con.write_all(b"!what\r\n").await.unwrap();
    let mut buf = [0u8; 16];
    assert_eq!(con.read(&mut buf).await.unwrap(), 0);
}

#[tokio::test]
async fn arity_errors_carry_usage() {
    let server = TestServer::new();
    let mut con = server.connect();
    assert_reply(
        &mut con,
        b"*1\r\n$3\r\nGET\r\n",
        b"-ERR GET command syntax: GET key\r\n",
    )
    .await;
    assert_reply(
        &mut con,
        b"*2\r\n$6\r\nLRANGE\r\n$1\r\nl\r\n",
        b"-ERR LRANGE command syntax: LRANGE key start stop\r\n",
    )
    .await;
}
