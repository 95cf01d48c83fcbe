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

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use stowage_core::gpu::{
    BufferDescriptor, BufferId, CopyBatch, CopyRegion, DeviceAddress, FenceId, FenceStatus,
    MemoryBarrier, MemoryLocation, ResourceError, TransferDevice, TransferQueueId,
};

use super::context::WgpuTransferContext;
use super::conversions::buffer_usages;

/// Bounded wait applied to map requests, which `wgpu` resolves only while polled.
const MAP_TIMEOUT: Duration = Duration::from_secs(5);
/// `wgpu` does not expose buffer device addresses; handles are synthesized from here.
const ADDRESS_BASE: u64 = 0x1000_0000;

#[derive(Debug)]
pub(crate) struct WgpuBufferEntry {
    pub(crate) wgpu_buffer: Arc<wgpu::Buffer>,
    pub(crate) size: u64,
    location: MemoryLocation,
    address: DeviceAddress,
    /// Whether the host currently holds the mapping. Only host-mapped buffers
    /// are ever mapped.
    mapped: bool,
}

/// The internal, non-clonable state of the WgpuTransferDevice.
#[derive(Debug)]
pub struct WgpuTransferDeviceInternal {
    context: WgpuTransferContext,
    buffers: Mutex<HashMap<BufferId, WgpuBufferEntry>>,
    fences: Mutex<HashMap<FenceId, Arc<AtomicBool>>>,
    queues: Mutex<HashMap<TransferQueueId, String>>,

    next_buffer_id: AtomicUsize,
    next_fence_id: AtomicU64,
    next_queue_id: AtomicU64,
    next_address: AtomicU64,
}

/// A clonable, thread-safe handle to a `wgpu` device used for transfers.
///
/// Fences are flags set from `Queue::on_submitted_work_done`; waiting on one polls
/// the device until the flag flips or the timeout elapses. Host-mapped buffers are
/// created mapped, unmapped when a submission reads them, and mapped again on the
/// next host write, which therefore waits for the copy that was reading them.
#[derive(Clone, Debug)]
pub struct WgpuTransferDevice {
    internal: Arc<WgpuTransferDeviceInternal>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, ResourceError> {
    mutex
        .lock()
        .map_err(|e| ResourceError::BackendError(format!("Mutex poisoned ({what}): {e}")))
}

impl WgpuTransferDevice {
    pub fn new(context: WgpuTransferContext) -> Self {
        Self {
            internal: Arc::new(WgpuTransferDeviceInternal {
                context,
                buffers: Mutex::new(HashMap::new()),
                fences: Mutex::new(HashMap::new()),
                queues: Mutex::new(HashMap::new()),
                next_buffer_id: AtomicUsize::new(0),
                next_fence_id: AtomicU64::new(0),
                next_queue_id: AtomicU64::new(0),
                next_address: AtomicU64::new(ADDRESS_BASE),
            }),
        }
    }

    /// The context this device was built from.
    pub fn context(&self) -> &WgpuTransferContext {
        &self.internal.context
    }

    /// Retrieves a reference-counted pointer to the internal WGPU buffer.
    /// Returns `None` if the ID is invalid.
    pub fn get_wgpu_buffer(&self, id: BufferId) -> Option<Arc<wgpu::Buffer>> {
        let buffers = self.internal.buffers.lock().ok()?;
        buffers.get(&id).map(|entry| Arc::clone(&entry.wgpu_buffer))
    }

    /// Processes pending callbacks (map requests, work-done notifications) without blocking.
    pub fn poll_device_non_blocking(&self) -> Result<(), ResourceError> {
        self.internal
            .context
            .device
            .poll(wgpu::PollType::Poll)
            .map(|_| ())
            .map_err(|e| ResourceError::BackendError(format!("Failed to poll device: {e:?}")))
    }

    /// Copies a buffer back to the host and returns its bytes.
    ///
    /// Blocks until every earlier submission and the read-back copy have completed.
    /// The buffer must have been created with `COPY_SRC` usage.
    pub fn read_buffer(&self, id: BufferId) -> Result<Vec<u8>, ResourceError> {
        let (source, size) = {
            let buffers = lock(&self.internal.buffers, "buffers")?;
            let entry = buffers.get(&id).ok_or(ResourceError::NotFound)?;
            (Arc::clone(&entry.wgpu_buffer), entry.size)
        };
        let device = &self.internal.context.device;
        let padded = source.size();

        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Stowage Readback"),
            size: padded,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Stowage Readback Copy"),
        });
        encoder.copy_buffer_to_buffer(&source, 0, &readback, 0, padded);
        self.internal
            .context
            .queue
            .submit(std::iter::once(encoder.finish()));

        self.map_blocking(&readback, wgpu::MapMode::Read)?;
        let bytes = readback.slice(..).get_mapped_range()[..size as usize].to_vec();
        readback.unmap();
        Ok(bytes)
    }

    /// Requests a mapping of the whole buffer and polls until it resolves.
    fn map_blocking(&self, buffer: &wgpu::Buffer, mode: wgpu::MapMode) -> Result<(), ResourceError> {
        let state: Arc<Mutex<Option<Result<(), wgpu::BufferAsyncError>>>> =
            Arc::new(Mutex::new(None));
        let state_for_callback = Arc::clone(&state);
        buffer.slice(..).map_async(mode, move |result| {
            if let Ok(mut slot) = state_for_callback.lock() {
                *slot = Some(result);
            }
        });

        let deadline = Instant::now() + MAP_TIMEOUT;
        loop {
            self.poll_device_non_blocking()?;
            if let Some(result) = lock(&state, "map state")?.take() {
                return result.map_err(|e| {
                    ResourceError::BackendError(format!("WGPU map_async failed: {e:?}"))
                });
            }
            if Instant::now() >= deadline {
                return Err(ResourceError::FenceTimeout {
                    timeout: MAP_TIMEOUT,
                });
            }
            std::thread::yield_now();
        }
    }

    /// Rounds `size` up to `COPY_BUFFER_ALIGNMENT`, which mapped and copied sizes
    /// must be multiples of, and rejects it if it exceeds the device's buffer limit.
    fn allocation_size(size: u64, max_buffer_size: u64) -> Result<u64, ResourceError> {
        let allocated =
            size.max(1).div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT;
        if allocated > max_buffer_size {
            return Err(ResourceError::BackendError(format!(
                "Buffer of {size} bytes exceeds the device limit of {max_buffer_size} bytes"
            )));
        }
        Ok(allocated)
    }

    fn check_region(region: &CopyRegion, src_size: u64, dst_size: u64) -> Result<(), ResourceError> {
        let alignment = wgpu::COPY_BUFFER_ALIGNMENT;
        if region.src_offset % alignment != 0
            || region.dst_offset % alignment != 0
            || region.size % alignment != 0
        {
            return Err(ResourceError::BackendError(format!(
                "Copy region {region:?} is not aligned to {alignment} bytes"
            )));
        }
        if region.src_offset + region.size > src_size || region.dst_offset + region.size > dst_size
        {
            return Err(ResourceError::OutOfBounds);
        }
        Ok(())
    }
}

impl TransferDevice for WgpuTransferDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let context = &self.internal.context;
        let device = &context.device;
        let host_mapped = descriptor.location == MemoryLocation::HostMapped;
        let allocated =
            Self::allocation_size(descriptor.size, context.device_limits.max_buffer_size)?;

        let wgpu_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size: allocated,
            usage: buffer_usages(descriptor.usage, descriptor.location),
            mapped_at_creation: host_mapped,
        });

        let id = BufferId(self.internal.next_buffer_id.fetch_add(1, Ordering::Relaxed));
        let address = DeviceAddress(
            self.internal
                .next_address
                .fetch_add(allocated.div_ceil(256) * 256, Ordering::Relaxed),
        );

        lock(&self.internal.buffers, "buffers")?.insert(
            id,
            WgpuBufferEntry {
                wgpu_buffer: Arc::new(wgpu_buffer),
                size: descriptor.size,
                location: descriptor.location,
                address,
                mapped: host_mapped,
            },
        );

        log::info!(
            "WgpuTransferDevice: Created buffer '{}' with ID: {:?}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            descriptor.size
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut buffers = lock(&self.internal.buffers, "buffers")?;
        if let Some(entry) = buffers.remove(&id) {
            entry.wgpu_buffer.destroy();
            log::debug!("WgpuTransferDevice: Destroyed buffer with ID: {id:?}");
            Ok(())
        } else {
            Err(ResourceError::NotFound)
        }
    }

    fn buffer_address(&self, id: BufferId) -> Result<DeviceAddress, ResourceError> {
        let buffers = lock(&self.internal.buffers, "buffers")?;
        buffers
            .get(&id)
            .map(|entry| entry.address)
            .ok_or(ResourceError::NotFound)
    }

    fn write_mapped(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let (buffer, mapped) = {
            let buffers = lock(&self.internal.buffers, "buffers")?;
            let entry = buffers.get(&id).ok_or(ResourceError::NotFound)?;
            if entry.location != MemoryLocation::HostMapped {
                return Err(ResourceError::NotMappable);
            }
            if offset + data.len() as u64 > entry.size {
                return Err(ResourceError::OutOfBounds);
            }
            (Arc::clone(&entry.wgpu_buffer), entry.mapped)
        };
        if data.is_empty() {
            return Ok(());
        }

        if !mapped {
            self.map_blocking(&buffer, wgpu::MapMode::Write)?;
            if let Some(entry) = lock(&self.internal.buffers, "buffers")?.get_mut(&id) {
                entry.mapped = true;
            }
        }

        // Mapped sub-ranges start on MAP_ALIGNMENT and span a multiple of
        // COPY_BUFFER_ALIGNMENT; the allocation is already a multiple of the latter.
        let start = offset - offset % wgpu::MAP_ALIGNMENT;
        let end = (offset + data.len() as u64).div_ceil(wgpu::COPY_BUFFER_ALIGNMENT)
            * wgpu::COPY_BUFFER_ALIGNMENT;
        let mut range = buffer.slice(start..end).get_mapped_range_mut();
        let local = (offset - start) as usize;
        range[local..local + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn copy_alignment(&self) -> u64 {
        wgpu::MAP_ALIGNMENT.max(wgpu::COPY_BUFFER_ALIGNMENT)
    }

    fn create_fence(&self, signaled: bool) -> Result<FenceId, ResourceError> {
        let id = FenceId(self.internal.next_fence_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.fences, "fences")?.insert(id, Arc::new(AtomicBool::new(signaled)));
        Ok(id)
    }

    fn destroy_fence(&self, id: FenceId) -> Result<(), ResourceError> {
        lock(&self.internal.fences, "fences")?
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn reset_fence(&self, id: FenceId) -> Result<(), ResourceError> {
        let fences = lock(&self.internal.fences, "fences")?;
        let flag = fences.get(&id).ok_or(ResourceError::InvalidHandle)?;
        flag.store(false, Ordering::Release);
        Ok(())
    }

    fn wait_fence(&self, id: FenceId, timeout: Duration) -> Result<FenceStatus, ResourceError> {
        let flag = {
            let fences = lock(&self.internal.fences, "fences")?;
            Arc::clone(fences.get(&id).ok_or(ResourceError::InvalidHandle)?)
        };

        let deadline = Instant::now() + timeout;
        loop {
            if flag.load(Ordering::Acquire) {
                return Ok(FenceStatus::Signaled);
            }
            self.poll_device_non_blocking()?;
            if flag.load(Ordering::Acquire) {
                return Ok(FenceStatus::Signaled);
            }
            if Instant::now() >= deadline {
                return Ok(FenceStatus::Timeout);
            }
            std::thread::yield_now();
        }
    }

    fn create_transfer_queue(&self, label: Option<&str>) -> Result<TransferQueueId, ResourceError> {
        // wgpu exposes a single queue; a transfer queue is a labelled submission path on it.
        let id = TransferQueueId(self.internal.next_queue_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.queues, "queues")?.insert(id, label.unwrap_or("Transfer").to_owned());
        log::debug!("WgpuTransferDevice: Created transfer queue {id:?} ({label:?})");
        Ok(id)
    }

    fn destroy_transfer_queue(&self, id: TransferQueueId) -> Result<(), ResourceError> {
        lock(&self.internal.queues, "queues")?
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn submit_copies(
        &self,
        queue: TransferQueueId,
        batch: &CopyBatch,
        fence: FenceId,
    ) -> Result<(), ResourceError> {
        let queue_label = lock(&self.internal.queues, "queues")?
            .get(&queue)
            .cloned()
            .ok_or(ResourceError::InvalidHandle)?;
        let fence_flag = {
            let fences = lock(&self.internal.fences, "fences")?;
            Arc::clone(fences.get(&fence).ok_or(ResourceError::InvalidHandle)?)
        };

        let (source, destination) = {
            let mut buffers = lock(&self.internal.buffers, "buffers")?;
            let dst = buffers
                .get(&batch.destination)
                .map(|e| Arc::clone(&e.wgpu_buffer))
                .ok_or(ResourceError::NotFound)?;
            let src_entry = buffers
                .get_mut(&batch.source)
                .ok_or(ResourceError::NotFound)?;
            for region in batch.regions {
                Self::check_region(region, src_entry.wgpu_buffer.size(), dst.size())?;
            }
            // The queue cannot read a buffer the host still has mapped.
            if src_entry.mapped {
                src_entry.wgpu_buffer.unmap();
                src_entry.mapped = false;
            }
            (Arc::clone(&src_entry.wgpu_buffer), dst)
        };

        let context = &self.internal.context;
        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(batch.label.unwrap_or(&queue_label)),
            });
        for region in batch.regions {
            encoder.copy_buffer_to_buffer(
                &source,
                region.src_offset,
                &destination,
                region.dst_offset,
                region.size,
            );
        }
        // wgpu tracks buffer usage and inserts the transfer barrier itself.
        if batch.barrier == MemoryBarrier::None {
            log::trace!("WgpuTransferDevice: barrier elision is not supported, using a full barrier");
        }

        context.queue.submit(std::iter::once(encoder.finish()));
        context.queue.on_submitted_work_done(move || {
            fence_flag.store(true, Ordering::Release);
        });

        log::trace!(
            "WgpuTransferDevice: Submitted {} copy regions on '{queue_label}'",
            batch.regions.len()
        );
        Ok(())
    }
}
