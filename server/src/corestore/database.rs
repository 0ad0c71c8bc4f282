/*
 * Created on Wed Mar 23 2022
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

//! # The database monitor
//!
//! One [`Database`] is one keyspace guarded by one mutex, plus a sparse
//! per-key waiter table. Mutators acquire the lock, mutate, notify and
//! release; blocking readers park on the key's waiter while the lock is
//! dropped and come back with it re-held. [`Database::wait_for`] registers
//! interest in the waiter *before* releasing the lock and re-runs its check
//! with the lock re-held, so a wakeup can never slip between the check and
//! the park.

use super::expiry::Expiry;
use super::value::Value;
use super::Data;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, Notify};
use tokio::time::{self, Instant};

/// A stored value paired with its optional expiry deadline
///
/// The value is logically present iff there is no deadline or the deadline
/// hasn't passed.
#[derive(Debug)]
pub struct ExpiringValue {
    pub value: Value,
    pub expiry: Option<Expiry>,
}

impl ExpiringValue {
    pub const fn new(value: Value, expiry: Option<Expiry>) -> Self {
        ExpiringValue { value, expiry }
    }
    fn is_expired(&self) -> bool {
        self.expiry.is_some_and(|expiry| expiry.has_passed())
    }
}

/// One keyspace and its waiter table, both behind the database mutex
#[derive(Debug, Default)]
pub struct DbInner {
    keymap: HashMap<Data, ExpiringValue>,
    waiters: HashMap<Data, Arc<Notify>>,
}

impl DbInner {
    /// Get the value at `key` if it is logically present
    ///
    /// An expired entry is removed here, which is the only eviction path.
    pub fn get(&mut self, key: &[u8]) -> Option<&Value> {
        if self.evict_if_expired(key) {
            return None;
        }
        self.keymap.get(key).map(|entry| &entry.value)
    }
    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Value> {
        if self.evict_if_expired(key) {
            return None;
        }
        self.keymap.get_mut(key).map(|entry| &mut entry.value)
    }
    pub fn set(&mut self, key: Data, value: Value, expiry: Option<Expiry>) {
        self.keymap.insert(key, ExpiringValue::new(value, expiry));
    }
    /// Return the value at `key`, installing `default()` first if absent
    pub fn setdefault_with(
        &mut self,
        key: &Data,
        default: impl FnOnce() -> Value,
    ) -> &mut Value {
        self.evict_if_expired(key);
        &mut self
            .keymap
            .entry(key.clone())
            .or_insert_with(|| ExpiringValue::new(default(), None))
            .value
    }
    /// Remove `key`, returning whether it was logically present
    pub fn remove(&mut self, key: &[u8]) -> bool {
        let was_expired = self.evict_if_expired(key);
        let was_present = self.keymap.remove(key).is_some();
        // a deleted key's waiter can go too, unless someone is parked on it
        if let Some(notify) = self.waiters.get(key) {
            if Arc::strong_count(notify) == 1 {
                self.waiters.remove(key);
            }
        }
        was_present && !was_expired
    }
    /// All logically present keys, evicting expired entries on the way
    pub fn keys(&mut self) -> Vec<Data> {
        let expired: Vec<Data> = self
            .keymap
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            self.keymap.remove(&key);
        }
        self.keymap.keys().cloned().collect()
    }
    pub fn len(&self) -> usize {
        self.keymap.len()
    }
    /// Wake every task parked on `key`
    ///
    /// Call after any mutation that may satisfy a waiter (list pushes,
    /// stream appends).
    pub fn notify(&mut self, key: &[u8]) {
        if let Some(notify) = self.waiters.get(key) {
            notify.notify_waiters();
        }
    }

    fn evict_if_expired(&mut self, key: &[u8]) -> bool {
        match self.keymap.get(key) {
            Some(entry) if entry.is_expired() => {
                self.keymap.remove(key);
                true
            }
            _ => false,
        }
    }
    fn waiter(&mut self, key: &Data) -> Arc<Notify> {
        self.waiters
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }
    fn gc_waiter(&mut self, key: &[u8], handle: &Arc<Notify>) {
        // the table's reference plus ours means nobody else is parked
        if Arc::strong_count(handle) <= 2 {
            self.waiters.remove(key);
        }
    }
}

/// A single keyed database with exclusive access and per-key wakeups
#[derive(Debug, Default)]
pub struct Database {
    mtx: Mutex<DbInner>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_contents(keymap: HashMap<Data, ExpiringValue>) -> Self {
        Database {
            mtx: Mutex::new(DbInner {
                keymap,
                waiters: HashMap::new(),
            }),
        }
    }
    /// Take exclusive access. Every read and write goes through this guard
    pub async fn lock(&self) -> MutexGuard<'_, DbInner> {
        self.mtx.lock().await
    }
    /// Direct access to the keyspace without locking, for contexts that
    /// own the database exclusively (startup and tests)
    pub fn get_mut(&mut self) -> &mut DbInner {
        self.mtx.get_mut()
    }
    /// Park until `check` succeeds for `key` or the timeout elapses
    ///
    /// Takes the held guard, runs `check` under it, and if unsatisfied
    /// atomically releases the lock and waits for a [`DbInner::notify`] on
    /// `key`. On wakeup the lock is re-acquired and `check` re-run. On
    /// timeout the check is *not* retried; `None` timeout waits forever.
    /// The returned guard is always held, so the caller can keep operating
    /// on the keyspace before replying.
    pub async fn wait_for<'a, T>(
        &'a self,
        mut guard: MutexGuard<'a, DbInner>,
        key: &Data,
        timeout: Option<Duration>,
        mut check: impl FnMut(&mut DbInner) -> Option<T>,
    ) -> (MutexGuard<'a, DbInner>, Option<T>) {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            if let Some(hit) = check(&mut guard) {
                return (guard, Some(hit));
            }
            let notify = guard.waiter(key);
            let notified = notify.notified();
            tokio::pin!(notified);
            // register interest before dropping the lock; this closes the
            // lost-wakeup window between unlock and park
            notified.as_mut().enable();
            drop(guard);
            let woke = match deadline {
                Some(deadline) => time::timeout_at(deadline, notified).await.is_ok(),
                None => {
                    notified.await;
                    true
                }
            };
            guard = self.mtx.lock().await;
            guard.gc_waiter(key, &notify);
            if !woke {
                return (guard, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corestore::value::{Str, Value};

    fn data(bytes: &'static [u8]) -> Data {
        Data::from_static(bytes)
    }

    fn string_value(bytes: &'static [u8]) -> Value {
        Value::Str(Str::new(bytes))
    }

    #[tokio::test]
    async fn get_set_and_remove() {
        let db = Database::new();
        let mut guard = db.lock().await;
        assert!(guard.get(b"foo").is_none());
        guard.set(data(b"foo"), string_value(b"bar"), None);
        assert!(matches!(guard.get(b"foo"), Some(Value::Str(_))));
        assert!(guard.remove(b"foo"));
        assert!(!guard.remove(b"foo"));
    }

    #[tokio::test]
    async fn expired_entries_are_evicted_on_read() {
        let db = Database::new();
        let mut guard = db.lock().await;
        guard.set(
            data(b"gone"),
            string_value(b"x"),
            Some(Expiry::after_millis(-10)),
        );
        guard.set(data(b"kept"), string_value(b"y"), None);
        assert!(guard.get(b"gone").is_none());
        // the expired entry must actually be removed, not just hidden
        assert_eq!(guard.len(), 1);
        assert_eq!(guard.keys(), vec![data(b"kept")]);
    }

    #[tokio::test]
    async fn setdefault_returns_existing() {
        let db = Database::new();
        let mut guard = db.lock().await;
        guard.set(data(b"k"), string_value(b"old"), None);
        let value = guard.setdefault_with(&data(b"k"), || string_value(b"new"));
        match value {
            Value::Str(s) => assert_eq!(s.as_bytes(), b"old"),
            _ => panic!("wrong type"),
        }
    }

    #[tokio::test]
    async fn setdefault_installs_on_expired() {
        let db = Database::new();
        let mut guard = db.lock().await;
        guard.set(
            data(b"k"),
            string_value(b"old"),
            Some(Expiry::after_millis(-10)),
        );
        let value = guard.setdefault_with(&data(b"k"), || string_value(b"new"));
        match value {
            Value::Str(s) => assert_eq!(s.as_bytes(), b"new"),
            _ => panic!("wrong type"),
        }
    }

    #[tokio::test]
    async fn waiter_wakes_on_notify() {
        let db = std::sync::Arc::new(Database::new());
        let waiter_db = db.clone();
        let waiter = tokio::spawn(async move {
            let guard = waiter_db.lock().await;
            let (_guard, hit) = waiter_db
                .wait_for(guard, &data(b"q"), None, |inner| {
                    inner.get(b"q").map(|_| ())
                })
                .await;
            hit.is_some()
        });
        // give the waiter a moment to park
        tokio::time::sleep(Duration::from_millis(50)).await;
        {
            let mut guard = db.lock().await;
            guard.set(data(b"q"), string_value(b"v"), None);
            guard.notify(b"q");
        }
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn waiter_times_out() {
        let db = Database::new();
        let guard = db.lock().await;
        let start = std::time::Instant::now();
        let (_guard, hit) = db
            .wait_for(
                guard,
                &data(b"nothing"),
                Some(Duration::from_millis(30)),
                |inner| inner.get(b"nothing").map(|_| ()),
            )
            .await;
        assert!(hit.is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn waiter_table_is_garbage_collected() {
        let db = Database::new();
        let guard = db.lock().await;
        let (guard, _) = db
            .wait_for(
                guard,
                &data(b"k"),
                Some(Duration::from_millis(5)),
                |_| Option::<()>::None,
            )
            .await;
        assert!(guard.waiters.is_empty());
    }
}
