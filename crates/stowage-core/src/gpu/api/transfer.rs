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

//! Opaque handles and command structures for buffer-to-buffer transfers.

use super::buffer::BufferId;

/// An opaque handle to a fence signaled by the device when a submission completes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FenceId(pub u64);

/// An opaque handle to a command pool/buffer pair bound to a transfer-capable queue.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TransferQueueId(pub u64);

/// Outcome of a bounded wait on a fence.
///
/// Device errors are reported through the `Err` side of the surrounding `Result`,
/// so success, timeout and failure stay distinct.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FenceStatus {
    /// The fence was signaled before the timeout elapsed.
    Signaled,
    /// The timeout elapsed first.
    Timeout,
}

/// A single copy from a source buffer range to a destination buffer range.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CopyRegion {
    /// Byte offset in the source buffer.
    pub src_offset: u64,
    /// Byte offset in the destination buffer.
    pub dst_offset: u64,
    /// Number of bytes to copy.
    pub size: u64,
}

/// The memory dependency recorded after the copy command.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum MemoryBarrier {
    /// No barrier; later commands may observe partial writes.
    None,
    /// All transfer writes become visible to every later stage before any
    /// dependent read executes.
    #[default]
    Full,
}

/// A batch of copy regions between two buffers, recorded as one command.
#[derive(Debug, Clone)]
pub struct CopyBatch<'a> {
    /// An optional debug label for the recorded command buffer.
    pub label: Option<&'a str>,
    /// The buffer copied from.
    pub source: BufferId,
    /// The buffer copied into.
    pub destination: BufferId,
    /// The regions to copy, recorded in order.
    pub regions: &'a [CopyRegion],
    /// The barrier appended after the copy.
    pub barrier: MemoryBarrier,
}

impl CopyBatch<'_> {
    /// Total number of bytes moved by the batch.
    pub fn total_bytes(&self) -> u64 {
        self.regions.iter().map(|r| r.size).sum()
    }
}
