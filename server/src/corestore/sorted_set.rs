/*
 * Created on Tue Mar 22 2022
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

use super::value::normalize_index;
use super::Data;
use std::collections::HashMap;

/// A member → score mapping with a derived canonical ordering
///
/// The canonical order is ascending by `(score, member)` with a bytewise
/// lexicographic tie-break on the member. It is a total function of the
/// current contents; no sort state is kept between operations.
#[derive(Debug, Default)]
pub struct SortedSet {
    scores: HashMap<Data, f64>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.scores.len()
    }
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
    /// Upsert the given pairs, returning how many members are new
    pub fn add(&mut self, pairs: impl IntoIterator<Item = (f64, Data)>) -> usize {
        let mut new = 0;
        for (score, member) in pairs {
            if self.scores.insert(member, score).is_none() {
                new += 1;
            }
        }
        new
    }
    /// The 0-based position of `member` in the canonical order
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        self.scores.get(member)?;
        self.ordered_members()
            .iter()
            .position(|(_, m)| m.as_ref() == member)
    }
    /// Members of the closed interval `[start, stop]` of the canonical
    /// order, with the same signed-index semantics as list ranges
    pub fn range(&self, start: i64, stop: i64) -> Vec<Data> {
        let ordered = self.ordered_members();
        let len = ordered.len() as i64;
        let start = normalize_index(start, len).max(0);
        let stop = normalize_index(stop, len).min(len - 1);
        if start > stop {
            return Vec::new();
        }
        ordered[start as usize..=stop as usize]
            .iter()
            .map(|(_, member)| (*member).clone())
            .collect()
    }
    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }
    /// Remove the given members, returning how many were actually present
    pub fn remove<'a>(&mut self, members: impl IntoIterator<Item = &'a [u8]>) -> usize {
        members
            .into_iter()
            .filter(|member| self.scores.remove(*member).is_some())
            .count()
    }

    fn ordered_members(&self) -> Vec<(f64, &Data)> {
        let mut ordered: Vec<(f64, &Data)> = self
            .scores
            .iter()
            .map(|(member, score)| (*score, member))
            .collect();
        ordered.sort_unstable_by(|(sa, ma), (sb, mb)| {
            sa.total_cmp(sb).then_with(|| ma.as_ref().cmp(mb.as_ref()))
        });
        ordered
    }
}
