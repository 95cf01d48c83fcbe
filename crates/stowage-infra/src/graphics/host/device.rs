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

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use stowage_core::gpu::{
    BufferDescriptor, BufferId, BufferUsage, CopyBatch, CopyRegion, DeviceAddress, FenceId,
    FenceStatus, MemoryBarrier, MemoryLocation, ResourceError, TransferDevice, TransferQueueId,
};

/// First synthetic address handed out; keeps address 0 meaning "none".
const ADDRESS_BASE: u64 = 0x1000_0000;
/// Synthetic addresses are spaced on this boundary.
const ADDRESS_ALIGNMENT: u64 = 256;

/// A submission as the device received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    /// The queue the batch was submitted on.
    pub queue: TransferQueueId,
    /// The batch label.
    pub label: Option<String>,
    /// Copy source.
    pub source: BufferId,
    /// Copy destination.
    pub destination: BufferId,
    /// Regions in recorded order.
    pub regions: Vec<CopyRegion>,
    /// Barrier recorded after the copy.
    pub barrier: MemoryBarrier,
    /// Fence signaled on completion.
    pub fence: FenceId,
}

#[derive(Debug)]
struct HostBufferEntry {
    label: String,
    bytes: Vec<u8>,
    usage: BufferUsage,
    location: MemoryLocation,
    address: DeviceAddress,
}

#[derive(Debug)]
struct HostFenceEntry {
    signaled: bool,
}

/// A submitted batch that the device has not executed yet.
#[derive(Debug)]
struct QueuedWork {
    source: BufferId,
    destination: BufferId,
    regions: Vec<CopyRegion>,
    fence: FenceId,
}

#[derive(Debug)]
struct HostDeviceInternal {
    copy_alignment: u64,
    buffers: Mutex<HashMap<BufferId, HostBufferEntry>>,
    fences: Mutex<HashMap<FenceId, HostFenceEntry>>,
    queues: Mutex<HashMap<TransferQueueId, String>>,
    work: Mutex<VecDeque<QueuedWork>>,
    submissions: Mutex<Vec<SubmissionRecord>>,

    next_buffer_id: AtomicUsize,
    next_fence_id: AtomicU64,
    next_queue_id: AtomicU64,
    next_address: AtomicU64,

    stalled: AtomicBool,
    fail_next_submit: AtomicBool,
}

/// A [`TransferDevice`] backed by host memory.
///
/// Submitted copies are queued and only executed when a fence is waited on or
/// [`poll`](Self::poll) is called, which reproduces the asynchrony of a real queue:
/// device-local bytes do not change at submission time. A [`stall`](Self::set_stalled)
/// switch keeps queued work from completing so fence timeouts can be observed.
#[derive(Clone, Debug)]
pub struct HostTransferDevice {
    internal: Arc<HostDeviceInternal>,
}

impl Default for HostTransferDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, ResourceError> {
    mutex
        .lock()
        .map_err(|e| ResourceError::BackendError(format!("Mutex poisoned ({what}): {e}")))
}

impl HostTransferDevice {
    /// A device with no copy alignment constraint.
    pub fn new() -> Self {
        Self::with_copy_alignment(1)
    }

    /// A device requiring copy offsets and sizes to be multiples of `alignment`.
    pub fn with_copy_alignment(alignment: u64) -> Self {
        Self {
            internal: Arc::new(HostDeviceInternal {
                copy_alignment: alignment.max(1),
                buffers: Mutex::new(HashMap::new()),
                fences: Mutex::new(HashMap::new()),
                queues: Mutex::new(HashMap::new()),
                work: Mutex::new(VecDeque::new()),
                submissions: Mutex::new(Vec::new()),
                next_buffer_id: AtomicUsize::new(0),
                next_fence_id: AtomicU64::new(0),
                next_queue_id: AtomicU64::new(0),
                next_address: AtomicU64::new(ADDRESS_BASE),
                stalled: AtomicBool::new(false),
                fail_next_submit: AtomicBool::new(false),
            }),
        }
    }

    // --- Test and inspection helpers ---

    /// When stalled, queued work never completes and waits report a timeout.
    pub fn set_stalled(&self, stalled: bool) {
        self.internal.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Makes the next [`submit_copies`](TransferDevice::submit_copies) fail with a
    /// backend error, as a lost device would.
    pub fn fail_next_submit(&self) {
        self.internal.fail_next_submit.store(true, Ordering::SeqCst);
    }

    /// Executes every queued batch, in submission order, and signals its fence.
    ///
    /// Does nothing while stalled.
    pub fn poll(&self) -> Result<(), ResourceError> {
        if self.internal.stalled.load(Ordering::SeqCst) {
            return Ok(());
        }
        let mut work = lock(&self.internal.work, "work")?;
        while let Some(item) = work.pop_front() {
            self.execute(&item)?;
        }
        Ok(())
    }

    /// Number of batches submitted but not executed yet.
    pub fn queued_batches(&self) -> usize {
        self.internal.work.lock().map(|w| w.len()).unwrap_or(0)
    }

    /// A copy of a buffer's current contents.
    pub fn buffer_contents(&self, id: BufferId) -> Result<Vec<u8>, ResourceError> {
        let buffers = lock(&self.internal.buffers, "buffers")?;
        buffers
            .get(&id)
            .map(|entry| entry.bytes.clone())
            .ok_or(ResourceError::NotFound)
    }

    /// The label a buffer was created with.
    pub fn buffer_label(&self, id: BufferId) -> Option<String> {
        let buffers = self.internal.buffers.lock().ok()?;
        buffers.get(&id).map(|entry| entry.label.clone())
    }

    /// Every submission received so far, oldest first.
    pub fn submissions(&self) -> Vec<SubmissionRecord> {
        self.internal
            .submissions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Number of buffers not yet destroyed.
    pub fn live_buffers(&self) -> usize {
        self.internal.buffers.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Number of fences not yet destroyed.
    pub fn live_fences(&self) -> usize {
        self.internal.fences.lock().map(|f| f.len()).unwrap_or(0)
    }

    /// Number of transfer queues not yet destroyed.
    pub fn live_queues(&self) -> usize {
        self.internal.queues.lock().map(|q| q.len()).unwrap_or(0)
    }

    fn execute(&self, item: &QueuedWork) -> Result<(), ResourceError> {
        {
            let mut buffers = lock(&self.internal.buffers, "buffers")?;
            for region in &item.regions {
                let src = region.src_offset as usize..(region.src_offset + region.size) as usize;
                let chunk = buffers
                    .get(&item.source)
                    .ok_or(ResourceError::NotFound)?
                    .bytes[src]
                    .to_vec();
                let dst = buffers
                    .get_mut(&item.destination)
                    .ok_or(ResourceError::NotFound)?;
                let start = region.dst_offset as usize;
                dst.bytes[start..start + chunk.len()].copy_from_slice(&chunk);
            }
        }

        let mut fences = lock(&self.internal.fences, "fences")?;
        if let Some(fence) = fences.get_mut(&item.fence) {
            fence.signaled = true;
        }
        log::trace!(
            "HostTransferDevice: executed {} regions into {:?}, signaled {:?}",
            item.regions.len(),
            item.destination,
            item.fence
        );
        Ok(())
    }

    fn validate_region(
        &self,
        region: &CopyRegion,
        src_size: u64,
        dst_size: u64,
    ) -> Result<(), ResourceError> {
        let alignment = self.internal.copy_alignment;
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

impl TransferDevice for HostTransferDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.internal.next_buffer_id.fetch_add(1, Ordering::Relaxed));
        let span = descriptor.size.max(1).div_ceil(ADDRESS_ALIGNMENT) * ADDRESS_ALIGNMENT;
        let address = DeviceAddress(self.internal.next_address.fetch_add(span, Ordering::Relaxed));
        let label = descriptor
            .label
            .as_deref()
            .unwrap_or_default()
            .to_owned();

        lock(&self.internal.buffers, "buffers")?.insert(
            id,
            HostBufferEntry {
                label,
                bytes: vec![0; descriptor.size as usize],
                usage: descriptor.usage,
                location: descriptor.location,
                address,
            },
        );

        log::debug!(
            "HostTransferDevice: Created buffer '{}' with ID: {:?}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or_default(),
            id,
            descriptor.size
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut buffers = lock(&self.internal.buffers, "buffers")?;
        if buffers.remove(&id).is_some() {
            log::debug!("HostTransferDevice: Destroyed buffer with ID: {id:?}");
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
        let mut buffers = lock(&self.internal.buffers, "buffers")?;
        let entry = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        if entry.location != MemoryLocation::HostMapped {
            return Err(ResourceError::NotMappable);
        }
        let end = offset + data.len() as u64;
        if end > entry.bytes.len() as u64 {
            return Err(ResourceError::OutOfBounds);
        }
        entry.bytes[offset as usize..end as usize].copy_from_slice(data);
        Ok(())
    }

    fn copy_alignment(&self) -> u64 {
        self.internal.copy_alignment
    }

    fn create_fence(&self, signaled: bool) -> Result<FenceId, ResourceError> {
        let id = FenceId(self.internal.next_fence_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.fences, "fences")?.insert(id, HostFenceEntry { signaled });
        Ok(id)
    }

    fn destroy_fence(&self, id: FenceId) -> Result<(), ResourceError> {
        lock(&self.internal.fences, "fences")?
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn reset_fence(&self, id: FenceId) -> Result<(), ResourceError> {
        let mut fences = lock(&self.internal.fences, "fences")?;
        let fence = fences.get_mut(&id).ok_or(ResourceError::InvalidHandle)?;
        fence.signaled = false;
        Ok(())
    }

    fn wait_fence(&self, id: FenceId, timeout: Duration) -> Result<FenceStatus, ResourceError> {
        let is_signaled = |device: &Self| -> Result<bool, ResourceError> {
            let fences = lock(&device.internal.fences, "fences")?;
            fences
                .get(&id)
                .map(|f| f.signaled)
                .ok_or(ResourceError::InvalidHandle)
        };

        if is_signaled(self)? {
            return Ok(FenceStatus::Signaled);
        }
        if self.internal.stalled.load(Ordering::SeqCst) {
            log::trace!("HostTransferDevice: {id:?} not signaled within {timeout:?} (stalled)");
            return Ok(FenceStatus::Timeout);
        }

        // Run queued work up to and including the batch guarded by this fence.
        {
            let mut work = lock(&self.internal.work, "work")?;
            while let Some(item) = work.pop_front() {
                let done = item.fence == id;
                self.execute(&item)?;
                if done {
                    break;
                }
            }
        }

        if is_signaled(self)? {
            Ok(FenceStatus::Signaled)
        } else {
            Ok(FenceStatus::Timeout)
        }
    }

    fn create_transfer_queue(&self, label: Option<&str>) -> Result<TransferQueueId, ResourceError> {
        let id = TransferQueueId(self.internal.next_queue_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.queues, "queues")?.insert(id, label.unwrap_or_default().to_owned());
        log::debug!("HostTransferDevice: Created transfer queue {id:?} ({label:?})");
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
        if self.internal.fail_next_submit.swap(false, Ordering::SeqCst) {
            return Err(ResourceError::BackendError(
                "Injected submission failure".to_owned(),
            ));
        }
        if !lock(&self.internal.queues, "queues")?.contains_key(&queue) {
            return Err(ResourceError::InvalidHandle);
        }
        if !lock(&self.internal.fences, "fences")?.contains_key(&fence) {
            return Err(ResourceError::InvalidHandle);
        }

        {
            let buffers = lock(&self.internal.buffers, "buffers")?;
            let source = buffers.get(&batch.source).ok_or(ResourceError::NotFound)?;
            let destination = buffers
                .get(&batch.destination)
                .ok_or(ResourceError::NotFound)?;
            if !source.usage.contains(BufferUsage::COPY_SRC)
                || !destination.usage.contains(BufferUsage::COPY_DST)
            {
                return Err(ResourceError::BackendError(format!(
                    "Copy {:?} -> {:?} lacks COPY_SRC/COPY_DST usage",
                    batch.source, batch.destination
                )));
            }
            for region in batch.regions {
                self.validate_region(
                    region,
                    source.bytes.len() as u64,
                    destination.bytes.len() as u64,
                )?;
            }
        }

        lock(&self.internal.work, "work")?.push_back(QueuedWork {
            source: batch.source,
            destination: batch.destination,
            regions: batch.regions.to_vec(),
            fence,
        });
        lock(&self.internal.submissions, "submissions")?.push(SubmissionRecord {
            queue,
            label: batch.label.map(str::to_owned),
            source: batch.source,
            destination: batch.destination,
            regions: batch.regions.to_vec(),
            barrier: batch.barrier,
            fence,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(device: &HostTransferDevice) -> (BufferId, BufferId) {
        let src = device
            .create_buffer(&BufferDescriptor::staging("src", 64))
            .unwrap();
        let dst = device
            .create_buffer(&BufferDescriptor::device_local("dst", 64))
            .unwrap();
        (src, dst)
    }

    #[test]
    fn copies_run_when_fence_is_waited() {
        let device = HostTransferDevice::new();
        let (src, dst) = pair(&device);
        let queue = device.create_transfer_queue(Some("test")).unwrap();
        let fence = device.create_fence(false).unwrap();

        device.write_mapped(src, 0, &[1, 2, 3, 4]).unwrap();
        let regions = [CopyRegion {
            src_offset: 0,
            dst_offset: 8,
            size: 4,
        }];
        let batch = CopyBatch {
            label: None,
            source: src,
            destination: dst,
            regions: &regions,
            barrier: MemoryBarrier::Full,
        };
        device.submit_copies(queue, &batch, fence).unwrap();

        assert_eq!(device.buffer_contents(dst).unwrap()[8..12], [0u8; 4]);
        assert_eq!(
            device.wait_fence(fence, Duration::from_millis(1)).unwrap(),
            FenceStatus::Signaled
        );
        assert_eq!(device.buffer_contents(dst).unwrap()[8..12], [1u8, 2, 3, 4]);
    }

    #[test]
    fn stalled_device_times_out() {
        let device = HostTransferDevice::new();
        let fence = device.create_fence(false).unwrap();
        device.set_stalled(true);
        assert_eq!(
            device.wait_fence(fence, Duration::from_millis(1)).unwrap(),
            FenceStatus::Timeout
        );
    }

    #[test]
    fn device_local_buffers_are_not_mappable() {
        let device = HostTransferDevice::new();
        let (src, dst) = pair(&device);
        assert_eq!(
            device.write_mapped(dst, 0, &[1]),
            Err(ResourceError::NotMappable)
        );
        assert_eq!(
            device.write_mapped(src, 63, &[1, 2]),
            Err(ResourceError::OutOfBounds)
        );
    }

    #[test]
    fn misaligned_regions_are_rejected() {
        let device = HostTransferDevice::with_copy_alignment(4);
        let (src, dst) = pair(&device);
        let queue = device.create_transfer_queue(None).unwrap();
        let fence = device.create_fence(true).unwrap();
        let regions = [CopyRegion {
            src_offset: 0,
            dst_offset: 2,
            size: 4,
        }];
        let batch = CopyBatch {
            label: None,
            source: src,
            destination: dst,
            regions: &regions,
            barrier: MemoryBarrier::Full,
        };
        assert!(matches!(
            device.submit_copies(queue, &batch, fence),
            Err(ResourceError::BackendError(_))
        ));
        assert!(device.submissions().is_empty());
    }

    #[test]
    fn addresses_are_distinct_and_stable() {
        let device = HostTransferDevice::new();
        let (src, dst) = pair(&device);
        let a = device.buffer_address(src).unwrap();
        let b = device.buffer_address(dst).unwrap();
        assert_ne!(a, b);
        assert_eq!(device.buffer_address(src).unwrap(), a);
    }
}
