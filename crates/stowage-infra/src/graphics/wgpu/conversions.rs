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

use stowage_core::gpu::{BufferUsage, MemoryLocation};

/// A trait for converting stowage API types into their `wgpu` equivalents.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into a WGPU-compatible type.
    fn into_wgpu(self) -> T;
}

impl IntoWgpu<wgpu::BufferUsages> for BufferUsage {
    fn into_wgpu(self) -> wgpu::BufferUsages {
        let mut usages = wgpu::BufferUsages::empty();
        if self.contains(BufferUsage::COPY_SRC) {
            usages |= wgpu::BufferUsages::COPY_SRC;
        }
        if self.contains(BufferUsage::COPY_DST) {
            usages |= wgpu::BufferUsages::COPY_DST;
        }
        if self.contains(BufferUsage::STORAGE) {
            usages |= wgpu::BufferUsages::STORAGE;
        }
        usages
    }
}

/// The `wgpu` usages for a buffer at `location`.
///
/// `MAP_WRITE` may only be combined with `COPY_SRC`, so a host-mapped buffer
/// keeps no other usage.
pub(crate) fn buffer_usages(usage: BufferUsage, location: MemoryLocation) -> wgpu::BufferUsages {
    match location {
        MemoryLocation::HostMapped => wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC,
        MemoryLocation::DeviceLocal => usage.into_wgpu(),
    }
}
