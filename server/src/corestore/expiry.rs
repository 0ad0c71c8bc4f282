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

use chrono::Utc;

/// The current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// An absolute expiry deadline on the wall clock
///
/// Deadlines come from two places: `now + delta` for the `PX` option and
/// absolute Unix timestamps read out of a snapshot file. There is no
/// background sweeper; a key holding a passed deadline is evicted lazily on
/// the next read-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    deadline_ms: i64,
}

impl Expiry {
    /// Deadline `delta_ms` milliseconds from now (the `PX` flag)
    pub fn after_millis(delta_ms: i64) -> Self {
        Expiry {
            deadline_ms: now_millis().saturating_add(delta_ms),
        }
    }
    /// Deadline at an absolute Unix timestamp in seconds (`EXPIRETIME`)
    pub const fn at_unix_seconds(secs: i64) -> Self {
        Expiry {
            deadline_ms: secs * 1000,
        }
    }
    /// Deadline at an absolute Unix timestamp in milliseconds (`EXPIRETIMEMS`)
    pub const fn at_unix_millis(ms: i64) -> Self {
        Expiry { deadline_ms: ms }
    }
    /// Has this deadline passed as of a fresh "now"?
    pub fn has_passed(&self) -> bool {
        now_millis() >= self.deadline_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_deadline_has_not_passed() {
        assert!(!Expiry::after_millis(60_000).has_passed());
    }

    #[test]
    fn past_deadline_has_passed() {
        assert!(Expiry::after_millis(-1).has_passed());
        assert!(Expiry::at_unix_seconds(1).has_passed());
        assert!(Expiry::at_unix_millis(1_000).has_passed());
    }
}
