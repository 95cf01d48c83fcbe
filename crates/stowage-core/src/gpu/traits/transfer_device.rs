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

use crate::gpu::api::*;
use crate::gpu::error::ResourceError;
use std::fmt::Debug;
use std::time::Duration;

/// The device capabilities an arena needs: buffers, fences, and a transfer queue.
pub trait TransferDevice: Send + Sync + Debug + 'static {
    /// Creates a new buffer.
    /// ## Arguments
    /// * `descriptor` - Size, usage and [`MemoryLocation`] of the buffer.
    /// ## Returns
    /// A `Result` containing the ID of the created buffer or an error if the creation fails.
    /// A [`MemoryLocation::HostMapped`] buffer is mapped when this returns.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Destroys a buffer.
    /// ## Arguments
    /// * `id` - The ID of the buffer to be destroyed.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Returns the stable device-side address of a buffer.
    /// ## Arguments
    /// * `id` - The ID of the buffer.
    fn buffer_address(&self, id: BufferId) -> Result<DeviceAddress, ResourceError>;

    /// Copies `data` into the mapped memory of a host-mapped buffer.
    /// ## Arguments
    /// * `id` - The ID of the buffer to write to.
    /// * `offset` - The offset in the buffer where the data will be written.
    /// * `data` - The bytes to write.
    /// ## Errors
    /// * `ResourceError::NotMappable` - If the buffer is device-local.
    /// * `ResourceError::OutOfBounds` - If the write runs past the end of the buffer.
    fn write_mapped(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Granularity, in bytes, that copy offsets, copy sizes and mapped writes must respect.
    fn copy_alignment(&self) -> u64 {
        1
    }

    /// Creates a fence.
    /// ## Arguments
    /// * `signaled` - Whether the fence starts in the signaled state.
    fn create_fence(&self, signaled: bool) -> Result<FenceId, ResourceError>;

    /// Destroys a fence.
    fn destroy_fence(&self, id: FenceId) -> Result<(), ResourceError>;

    /// Returns a fence to the unsignaled state.
    fn reset_fence(&self, id: FenceId) -> Result<(), ResourceError>;

    /// Blocks until the fence is signaled or `timeout` elapses.
    /// ## Returns
    /// `Ok(FenceStatus::Signaled)`, `Ok(FenceStatus::Timeout)`, or an error when the
    /// device itself failed.
    fn wait_fence(&self, id: FenceId, timeout: Duration) -> Result<FenceStatus, ResourceError>;

    /// Creates a command pool and command buffer bound to a transfer-capable queue.
    /// ## Arguments
    /// * `label` - An optional label for the queue's command buffers.
    fn create_transfer_queue(&self, label: Option<&str>) -> Result<TransferQueueId, ResourceError>;

    /// Destroys a transfer queue created by [`create_transfer_queue`](Self::create_transfer_queue).
    fn destroy_transfer_queue(&self, id: TransferQueueId) -> Result<(), ResourceError>;

    /// Records `batch` as a single copy command followed by its barrier, submits it on
    /// `queue`, and arranges for `fence` to be signaled once the device has executed it.
    ///
    /// Returns as soon as the work is submitted; completion is observed through the fence.
    fn submit_copies(
        &self,
        queue: TransferQueueId,
        batch: &CopyBatch,
        fence: FenceId,
    ) -> Result<(), ResourceError>;
}
