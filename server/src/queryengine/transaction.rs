/*
 * Created on Fri Apr 08 2022
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

use crate::actions::Command;

/// A connection's transaction slot
///
/// Either inactive (no queue at all) or active with a queue that may be
/// empty. The *dispatcher* decides what gets enqueued; this type only
/// guards the state transitions.
#[derive(Debug, Default, PartialEq)]
pub enum TransactionSlot {
    #[default]
    Inactive,
    Queued(Vec<Command>),
}

impl TransactionSlot {
    pub const fn new() -> Self {
        TransactionSlot::Inactive
    }
    pub const fn is_active(&self) -> bool {
        matches!(self, TransactionSlot::Queued(_))
    }
    /// `MULTI`: returns false if a transaction is already active
    pub fn start(&mut self) -> bool {
        if self.is_active() {
            return false;
        }
        *self = TransactionSlot::Queued(Vec::new());
        true
    }
    /// Push a command onto the active queue
    ///
    /// Only the dispatcher calls this, and only after checking
    /// [`Self::is_active`]; anything else is an internal invariant
    /// violation, not a client-reachable state.
    pub fn enqueue(&mut self, cmd: Command) {
        match self {
            TransactionSlot::Queued(queue) => queue.push(cmd),
            TransactionSlot::Inactive => unreachable!("enqueue without an active transaction"),
        }
    }
    /// `EXEC`: take the queue, going inactive. `None` if nothing was active
    pub fn take(&mut self) -> Option<Vec<Command>> {
        match std::mem::take(self) {
            TransactionSlot::Queued(queue) => Some(queue),
            TransactionSlot::Inactive => None,
        }
    }
    /// `DISCARD`: returns false if nothing was active
    pub fn discard(&mut self) -> bool {
        self.take().is_some()
    }
}
