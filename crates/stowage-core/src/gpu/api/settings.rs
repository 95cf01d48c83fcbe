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

//! Configuration for a device-local arena.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard ceiling on the size of a staging buffer, whatever the caller requests.
pub const STAGING_CAPACITY_CEILING: u64 = 200_000_000;

/// Staging size used when the caller does not pick one.
pub const DEFAULT_STAGING_CAPACITY: u64 = 10_000_000;

/// How long `commit` waits for the previous batch before giving up.
pub const DEFAULT_FENCE_TIMEOUT: Duration = Duration::from_nanos(999_999_999);

/// How a freed range is coalesced with its neighbours in the free list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MergePolicy {
    /// Only a free interval starting right after the freed range is absorbed.
    /// A free interval ending right before it is left as a separate entry.
    #[default]
    RightOnly,
    /// Both neighbours are absorbed when they are free.
    Both,
}

/// Settings used to build a `FreeListArena`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaSettings {
    /// Debug label, used as a prefix for every backend resource.
    pub label: String,
    /// Size of the device-local region in bytes.
    pub capacity: u64,
    /// Requested staging size in bytes, clamped to [`STAGING_CAPACITY_CEILING`].
    pub staging_capacity: u64,
    /// Bounded wait applied to the transfer fence.
    pub fence_timeout: Duration,
    /// Coalescing rule applied by `remove`.
    pub merge_policy: MergePolicy,
}

impl ArenaSettings {
    /// Settings for an arena of `capacity` bytes with every other field defaulted.
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// The staging size that will actually be allocated.
    pub fn effective_staging_capacity(&self) -> u64 {
        self.staging_capacity.min(STAGING_CAPACITY_CEILING)
    }
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            label: "Arena".to_owned(),
            capacity: 64 * 1024 * 1024,
            staging_capacity: DEFAULT_STAGING_CAPACITY,
            fence_timeout: DEFAULT_FENCE_TIMEOUT,
            merge_policy: MergePolicy::RightOnly,
        }
    }
}
