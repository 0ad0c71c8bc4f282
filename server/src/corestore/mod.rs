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

//! # The core store
//!
//! This module is the in-memory engine: the [`Data`] blob type, the typed
//! values, the per-database monitor and the shared [`Corestore`] handle that
//! every connection task clones.

pub mod database;
pub mod expiry;
pub mod sorted_set;
pub mod stream;
pub mod value;

use crate::config::ConfigurationSet;
use crate::pubsub::PubSubRegistry;
use crate::replication::ReplicationState;
use bytes::Bytes;
use database::Database;
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// The number of databases every server instance holds
pub const DATABASE_COUNT: usize = 16;

/// A wrapper for `Bytes`
///
/// Keys, values, channel names and command arguments are all `Data`: cheap
/// to clone and never interpreted as UTF-8 unless a command demands it.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Default)]
pub struct Data {
    /// The blob of data
    blob: Bytes,
}

impl Data {
    pub const fn from_static(blob: &'static [u8]) -> Self {
        Data {
            blob: Bytes::from_static(blob),
        }
    }
    pub fn copy_from_slice(blob: &[u8]) -> Self {
        Data {
            blob: Bytes::copy_from_slice(blob),
        }
    }
    pub fn from_string(val: String) -> Self {
        Data {
            blob: Bytes::from(val.into_bytes()),
        }
    }
    pub fn into_bytes(self) -> Bytes {
        self.blob
    }
}

impl Deref for Data {
    type Target = [u8];
    fn deref(&self) -> &<Self>::Target {
        &self.blob
    }
}

impl Borrow<[u8]> for Data {
    fn borrow(&self) -> &[u8] {
        self.blob.borrow()
    }
}

impl AsRef<[u8]> for Data {
    fn as_ref(&self) -> &[u8] {
        &self.blob
    }
}

impl From<Bytes> for Data {
    fn from(blob: Bytes) -> Self {
        Data { blob }
    }
}

impl From<Vec<u8>> for Data {
    fn from(blob: Vec<u8>) -> Self {
        Data {
            blob: Bytes::from(blob),
        }
    }
}

impl PartialEq<[u8]> for Data {
    fn eq(&self, oth: &[u8]) -> bool {
        self.blob.eq(oth)
    }
}

impl PartialEq<&[u8]> for Data {
    fn eq(&self, oth: &&[u8]) -> bool {
        self.blob.eq(oth)
    }
}

impl PartialEq<str> for Data {
    fn eq(&self, oth: &str) -> bool {
        self.blob.eq(oth.as_bytes())
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.blob))
    }
}

/// An atomic reference to the shared in-memory engine
///
/// Cloning a `Corestore` is intentionally cheap: one clone is handed to
/// every connection task and to the replication service.
#[derive(Clone)]
pub struct Corestore {
    shared: Arc<Shared>,
}

struct Shared {
    /// the databases, indexed 0..[`DATABASE_COUNT`]
    databases: Vec<Database>,
    /// the read-only configuration bag
    config: ConfigurationSet,
    /// replication role and propagation state
    replication: ReplicationState,
    /// the process-wide channel registry
    pubsub: PubSubRegistry,
}

impl Corestore {
    pub fn new(
        databases: Vec<Database>,
        config: ConfigurationSet,
        replication: ReplicationState,
    ) -> Self {
        assert_eq!(databases.len(), DATABASE_COUNT);
        Corestore {
            shared: Arc::new(Shared {
                databases,
                config,
                replication,
                pubsub: PubSubRegistry::new(),
            }),
        }
    }
    /// A store with empty databases (also the missing-snapshot startup path)
    pub fn new_empty(config: ConfigurationSet, replication: ReplicationState) -> Self {
        let databases = (0..DATABASE_COUNT).map(|_| Database::new()).collect();
        Self::new(databases, config, replication)
    }
    pub fn database(&self, index: usize) -> &Database {
        &self.shared.databases[index]
    }
    /// The database every fresh connection operates on
    pub fn default_database(&self) -> &Database {
        &self.shared.databases[0]
    }
    pub fn config(&self) -> &ConfigurationSet {
        &self.shared.config
    }
    pub fn replication(&self) -> &ReplicationState {
        &self.shared.replication
    }
    pub fn pubsub(&self) -> &PubSubRegistry {
        &self.shared.pubsub
    }
}
