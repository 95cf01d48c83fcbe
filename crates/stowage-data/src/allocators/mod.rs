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

//! Allocators for device-resident memory.
//!
//! ```text
//!   stage()                        commit()
//!  ┌────────┐  bump write   ┌──────────────┐  batched copy + barrier  ┌───────────────┐
//!  │  CPU   │ ────────────▶ │ StagingArea  │ ───────────────────────▶ │ device buffer │
//!  └────────┘               └──────────────┘   (TransferChannel)      └───────────────┘
//!                                                                      placement: FreeList
//! ```

mod arena;
mod channel;
mod free_list;
mod instance;
mod staging;
mod typed;
mod view;

pub use self::arena::{ArenaStats, CommitReport, Element, FreeListArena, PendingUpload};
pub use self::channel::TransferChannel;
pub use self::free_list::FreeList;
pub use self::instance::Instance;
pub use self::staging::StagingArea;
pub use self::typed::{ElementRange, TypedArena};
pub use self::view::ArenaView;

/// Rounds `size` up to the next multiple of `alignment` (`alignment >= 1`).
pub(crate) fn align_up(size: u64, alignment: u64) -> u64 {
    size.div_ceil(alignment) * alignment
}

/// Least common multiple of two non-zero values.
pub(crate) fn lcm(a: u64, b: u64) -> u64 {
    let (mut x, mut y) = (a, b);
    while y != 0 {
        (x, y) = (y, x % y);
    }
    a / x * b
}

#[cfg(test)]
mod tests {
    use super::{align_up, lcm};

    #[test]
    fn lcm_of_stride_and_alignment() {
        assert_eq!(lcm(12, 8), 24);
        assert_eq!(lcm(64, 8), 64);
        assert_eq!(lcm(1, 8), 8);
        assert_eq!(lcm(7, 1), 7);
    }

    #[test]
    fn align_up_rounds_to_multiple() {
        assert_eq!(align_up(50, 1), 50);
        assert_eq!(align_up(50, 8), 56);
        assert_eq!(align_up(56, 8), 56);
        assert_eq!(align_up(0, 4), 0);
    }
}
