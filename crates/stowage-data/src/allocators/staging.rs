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

//! Host-mapped scratch buffer for outbound blobs.

use std::sync::Arc;
use stowage_core::gpu::{
    ArenaError, BufferDescriptor, BufferId, ResourceError, TransferDevice,
    STAGING_CAPACITY_CEILING,
};
use stowage_core::DeletionQueue;

/// A bounded, persistently mapped upload buffer with a bump cursor.
///
/// The cursor only moves forward. It is rewound solely by an explicit
/// [`reset`](Self::reset), never as a side effect of an upload.
#[derive(Debug)]
pub struct StagingArea {
    device: Arc<dyn TransferDevice>,
    buffer: BufferId,
    capacity: u64,
    cursor: u64,
}

impl StagingArea {
    /// Creates a staging buffer of `min(requested, STAGING_CAPACITY_CEILING)` bytes.
    ///
    /// Its release is registered on `deletions`.
    pub fn new(
        device: &Arc<dyn TransferDevice>,
        label: &str,
        requested: u64,
        deletions: &mut DeletionQueue,
    ) -> Result<Self, ResourceError> {
        let capacity = requested.min(STAGING_CAPACITY_CEILING);
        if capacity < requested {
            log::warn!(
                "StagingArea '{label}': requested {requested} bytes, clamped to {capacity} bytes"
            );
        }

        let buffer = device.create_buffer(&BufferDescriptor::staging(
            format!("{label} Staging"),
            capacity,
        ))?;

        let release_device = Arc::clone(device);
        deletions.push("staging buffer", move || {
            if let Err(e) = release_device.destroy_buffer(buffer) {
                log::warn!("Failed to destroy staging buffer {buffer:?}: {e}");
            }
        });

        log::debug!("StagingArea '{label}': {capacity} bytes, buffer {buffer:?}");
        Ok(Self {
            device: Arc::clone(device),
            buffer,
            capacity,
            cursor: 0,
        })
    }

    /// The backing buffer, used as the copy source.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Effective capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes consumed since creation or the last reset.
    pub fn used(&self) -> u64 {
        self.cursor
    }

    /// Bytes still available to [`push`](Self::push).
    pub fn remaining(&self) -> u64 {
        self.capacity - self.cursor
    }

    /// Copies `bytes` into the mapped region at `offset`.
    ///
    /// The caller guarantees `offset + bytes.len() <= capacity`.
    pub fn write(&self, bytes: &[u8], offset: u64) -> Result<(), ResourceError> {
        self.device.write_mapped(self.buffer, offset, bytes)
    }

    /// Writes `bytes` at the cursor and advances it by `reserve` bytes.
    ///
    /// `reserve` is at least `bytes.len()`; the extra bytes are padding. Returns the
    /// staging offset of the write. On `CapacityExceeded` nothing is written.
    pub fn push(&mut self, name: &str, bytes: &[u8], reserve: u64) -> Result<u64, ArenaError> {
        debug_assert!(reserve >= bytes.len() as u64);
        if self.cursor + reserve > self.capacity {
            return Err(ArenaError::CapacityExceeded {
                name: name.to_owned(),
                requested: reserve,
                used: self.cursor,
                capacity: self.capacity,
            });
        }

        let offset = self.cursor;
        self.write(bytes, offset)?;
        self.cursor += reserve;
        Ok(offset)
    }

    /// Rewinds the cursor to the start of the buffer.
    ///
    /// Any staged bytes that have not been copied yet are overwritten by later pushes.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}
