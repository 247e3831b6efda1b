/**
 * AlsReco
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Result type used to find the top-k users or items via a binary heap
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct ScoredIndex {
    pub index: usize,
    pub score: f32,
}

/// Ordering for our max-heap: the worst candidate must end up on top so that it can be replaced.
/// Lower scores are worse, for equal scores the larger index is worse. `total_cmp` gives us a
/// total order on floats, NaN scores rank above everything else.
fn cmp_worse_first(a: &ScoredIndex, b: &ScoredIndex) -> Ordering {
    b.score.total_cmp(&a.score)
        .then_with(|| a.index.cmp(&b.index))
}

impl Eq for ScoredIndex {}

impl Ord for ScoredIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_worse_first(self, other)
    }
}

impl PartialOrd for ScoredIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(cmp_worse_first(self, other))
    }
}

/// The `k` best candidates, sorted by descending score and ascending index on ties.
pub fn top_k<I>(candidates: I, k: usize) -> Vec<ScoredIndex>
    where I: IntoIterator<Item=ScoredIndex> {

    if k == 0 {
        return Vec::new();
    }

    let candidates = candidates.into_iter();

    // k is caller input and may be far larger than the candidate set
    let mut heap = BinaryHeap::with_capacity(k.min(candidates.size_hint().0));

    for candidate in candidates {
        if heap.len() < k {
            heap.push(candidate);
        } else if let Some(mut top) = heap.peek_mut() {
            if candidate < *top {
                *top = candidate;
            }
        }
    }

    heap.into_sorted_vec()
}
