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

//! Defines data structures related to GPU buffer resources.

use bitflags::bitflags;
use std::borrow::Cow;

bitflags! {
    /// A set of flags describing the allowed usages of a [`BufferId`].
    ///
    /// The backend uses them, together with [`MemoryLocation`], to pick the
    /// memory type of the allocation and to validate copies at submission time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// The buffer can be used as the source of a copy operation.
        const COPY_SRC = 1 << 0;
        /// The buffer can be used as the destination of a copy operation.
        const COPY_DST = 1 << 1;
        /// The buffer can be bound as a storage buffer (read/write access from shaders).
        const STORAGE = 1 << 2;
    }
}

/// Where the memory backing a buffer lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MemoryLocation {
    /// Host-visible memory that stays mapped for the lifetime of the buffer.
    /// Used for staging writes from the CPU.
    HostMapped,
    /// Device-local memory, only reachable from the CPU through copies.
    #[default]
    DeviceLocal,
}

/// A descriptor used to create a [`BufferId`].
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label for the buffer.
    pub label: Option<Cow<'a, str>>,
    /// The total size of the buffer in bytes.
    pub size: u64,
    /// A bitmask of [`BufferUsage`] flags describing how the buffer will be used.
    pub usage: BufferUsage,
    /// Whether the buffer is host-mappable or device-local.
    pub location: MemoryLocation,
}

impl<'a> BufferDescriptor<'a> {
    /// Descriptor for a persistently mapped upload buffer.
    pub fn staging(label: impl Into<Cow<'a, str>>, size: u64) -> Self {
        Self {
            label: Some(label.into()),
            size,
            usage: BufferUsage::COPY_SRC | BufferUsage::STORAGE,
            location: MemoryLocation::HostMapped,
        }
    }

    /// Descriptor for a device-local copy destination readable from shaders.
    pub fn device_local(label: impl Into<Cow<'a, str>>, size: u64) -> Self {
        Self {
            label: Some(label.into()),
            size,
            usage: BufferUsage::COPY_DST | BufferUsage::COPY_SRC | BufferUsage::STORAGE,
            location: MemoryLocation::DeviceLocal,
        }
    }
}

/// An opaque handle to a GPU buffer resource.
///
/// This ID is returned by [`TransferDevice::create_buffer`](crate::gpu::TransferDevice::create_buffer)
/// and is used to reference the buffer in all subsequent operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub usize);

/// A stable device-side address (or backend handle) of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceAddress(pub u64);

impl DeviceAddress {
    /// Returns the address advanced by `offset` bytes.
    pub const fn offset(self, offset: u64) -> Self {
        Self(self.0 + offset)
    }
}
