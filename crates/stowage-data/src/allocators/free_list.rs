// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Ordered table of free byte intervals with first-fit placement.

use std::collections::BTreeMap;
use stowage_core::gpu::MergePolicy;

/// The free intervals of a fixed-capacity region, keyed by offset.
///
/// Intervals never overlap and are never empty. Adjacent free intervals may
/// coexist as separate entries when the [`MergePolicy`] does not coalesce them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeList {
    capacity: u64,
    intervals: BTreeMap<u64, u64>,
    policy: MergePolicy,
}

impl FreeList {
    /// Creates a free list where the whole `[0, capacity)` region is free.
    pub fn new(capacity: u64, policy: MergePolicy) -> Self {
        let mut intervals = BTreeMap::new();
        if capacity > 0 {
            intervals.insert(0, capacity);
        }
        Self {
            capacity,
            intervals,
            policy,
        }
    }

    /// Size of the managed region in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// The coalescing rule applied by [`release`](Self::release).
    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Offset of the first interval, in ascending offset order, that can hold `size` bytes.
    ///
    /// An interval exactly `size` long fits; [`allocate`](Self::allocate) then consumes it whole.
    pub fn first_fit(&self, size: u64) -> Option<u64> {
        self.intervals
            .iter()
            .find(|(_, &len)| len >= size)
            .map(|(&offset, _)| offset)
    }

    /// Reserves `size` bytes at the first fitting interval and returns their offset.
    ///
    /// The chosen interval `(offset, len)` is replaced by `(offset + size, len - size)`,
    /// or removed when it is consumed entirely.
    pub fn allocate(&mut self, size: u64) -> Option<u64> {
        let offset = self.first_fit(size)?;
        let len = self.intervals.remove(&offset)?;
        if len > size {
            self.intervals.insert(offset + size, len - size);
        }
        Some(offset)
    }

    /// Returns `[offset, offset + size)` to the free list.
    ///
    /// A free interval starting exactly at `offset + size` is absorbed. A free interval
    /// ending exactly at `offset` is absorbed only under [`MergePolicy::Both`].
    pub fn release(&mut self, offset: u64, size: u64) {
        debug_assert!(offset + size <= self.capacity, "release past end of region");
        debug_assert!(
            self.overlapping(offset, size).is_none(),
            "released range overlaps a free interval"
        );

        let mut start = offset;
        let mut len = size;

        if let Some(next) = self.intervals.remove(&(offset + size)) {
            len += next;
        }

        if self.policy == MergePolicy::Both {
            let left = self
                .intervals
                .range(..offset)
                .next_back()
                .map(|(&o, &l)| (o, l));
            if let Some((left_offset, left_len)) = left {
                if left_offset + left_len == offset {
                    self.intervals.remove(&left_offset);
                    start = left_offset;
                    len += left_len;
                }
            }
        }

        self.intervals.insert(start, len);
    }

    /// Iterates `(offset, length)` pairs in ascending offset order.
    pub fn intervals(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.intervals.iter().map(|(&o, &l)| (o, l))
    }

    /// Number of free intervals.
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Returns `true` when no byte is free.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Length of the largest free interval, 0 when full.
    pub fn largest(&self) -> u64 {
        self.intervals.values().copied().max().unwrap_or(0)
    }

    /// Total number of free bytes.
    pub fn total_free(&self) -> u64 {
        self.intervals.values().sum()
    }

    fn overlapping(&self, offset: u64, size: u64) -> Option<(u64, u64)> {
        self.intervals()
            .find(|&(o, l)| o < offset + size && offset < o + l)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(list: &FreeList) -> Vec<(u64, u64)> {
        list.intervals().collect()
    }

    #[test]
    fn new_list_is_one_interval() {
        let list = FreeList::new(1024, MergePolicy::RightOnly);
        assert_eq!(collect(&list), vec![(0, 1024)]);
        assert_eq!(list.total_free(), 1024);

        let empty = FreeList::new(0, MergePolicy::RightOnly);
        assert!(empty.is_empty());
        assert_eq!(empty.largest(), 0);
    }

    #[test]
    fn allocate_shrinks_chosen_interval() {
        let mut list = FreeList::new(1024, MergePolicy::RightOnly);
        assert_eq!(list.allocate(100), Some(0));
        assert_eq!(list.allocate(200), Some(100));
        assert_eq!(list.allocate(50), Some(300));
        assert_eq!(collect(&list), vec![(350, 674)]);
    }

    #[test]
    fn exact_fit_consumes_interval() {
        let mut list = FreeList::new(256, MergePolicy::RightOnly);
        assert_eq!(list.allocate(256), Some(0));
        assert!(list.is_empty());
        assert_eq!(list.allocate(1), None);
    }

    #[test]
    fn first_fit_scans_in_offset_order() {
        let mut list = FreeList::new(1000, MergePolicy::RightOnly);
        let a = list.allocate(100).unwrap();
        let _b = list.allocate(100).unwrap();
        let c = list.allocate(300).unwrap();
        let _d = list.allocate(100).unwrap();
        list.release(c, 300);
        list.release(a, 100);

        // (0,100) comes first but is too small; (200,300) is the first fit.
        assert_eq!(list.first_fit(150), Some(200));
        // Smaller requests take the lowest offset.
        assert_eq!(list.first_fit(80), Some(0));
        // An exact fit is taken ahead of a later, larger interval.
        assert_eq!(list.first_fit(100), Some(0));
        assert_eq!(list.allocate(100), Some(0));
        assert_eq!(collect(&list), vec![(200, 300), (600, 400)]);
    }

    #[test]
    fn release_merges_right_neighbour_only() {
        let mut list = FreeList::new(300, MergePolicy::RightOnly);
        let a = list.allocate(100).unwrap();
        let b = list.allocate(100).unwrap();
        // Remaining: (200, 100)

        // Freeing B absorbs the tail interval on its right.
        list.release(b, 100);
        assert_eq!(collect(&list), vec![(100, 200)]);

        // Freeing A absorbs B's interval on its right.
        list.release(a, 100);
        assert_eq!(collect(&list), vec![(0, 300)]);
    }

    #[test]
    fn release_leaves_left_neighbour_separate() {
        let mut list = FreeList::new(300, MergePolicy::RightOnly);
        let a = list.allocate(100).unwrap();
        let b = list.allocate(100).unwrap();
        let _c = list.allocate(100).unwrap();

        list.release(a, 100);
        list.release(b, 100);
        assert_eq!(collect(&list), vec![(0, 100), (100, 100)]);
        assert_eq!(list.largest(), 100);
    }

    #[test]
    fn both_policy_merges_left_and_right() {
        let mut list = FreeList::new(300, MergePolicy::Both);
        let a = list.allocate(100).unwrap();
        let b = list.allocate(100).unwrap();
        let c = list.allocate(100).unwrap();

        list.release(a, 100);
        list.release(c, 100);
        list.release(b, 100);
        assert_eq!(collect(&list), vec![(0, 300)]);
    }
}
