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

//! A fixed-capacity device-local arena of named byte blobs.

use super::{align_up, lcm};
use super::channel::TransferChannel;
use super::free_list::FreeList;
use super::staging::StagingArea;
use super::view::ArenaView;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use stowage_core::gpu::{
    ArenaError, ArenaSettings, BufferDescriptor, BufferId, CopyRegion, DeviceAddress,
    MergePolicy, TransferDevice,
};
use stowage_core::DeletionQueue;

/// A named byte range resident in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element {
    /// Byte offset of the element in the device buffer.
    pub offset: u64,
    /// Length of the element in bytes, as staged.
    pub size: u64,
    /// Bytes held in the free list for this element: `size` rounded up to the
    /// device copy alignment.
    pub reserved: u64,
}

impl Element {
    /// One past the last byte of the element.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// A blob written to staging that has not been committed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingUpload {
    /// Offset of the blob in the staging buffer.
    pub staging_offset: u64,
    /// Length of the blob in bytes.
    pub size: u64,
    /// Bytes consumed in staging, `size` rounded up to the copy alignment.
    pub reserved: u64,
}

/// What a call to [`FreeListArena::commit`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Names that received a new placement.
    pub placed: Vec<String>,
    /// Resident names whose bytes were rewritten in place.
    pub overwritten: Vec<String>,
    /// Resident names left untouched because overwriting was not requested.
    pub skipped: Vec<String>,
    /// Number of copy regions submitted.
    pub regions: usize,
    /// Bytes moved by the submitted batch.
    pub bytes: u64,
}

impl CommitReport {
    /// Returns `true` when a batch was submitted.
    pub fn submitted(&self) -> bool {
        self.regions > 0
    }
}

/// A snapshot of the arena's occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Size of the device-local region in bytes.
    pub capacity: u64,
    /// Bytes reserved by resident elements.
    pub used_bytes: u64,
    /// Bytes in free intervals.
    pub free_bytes: u64,
    /// Number of free intervals.
    pub free_intervals: usize,
    /// Length of the largest free interval.
    pub largest_free: u64,
    /// Number of resident elements.
    pub elements: usize,
    /// Number of staged, uncommitted uploads.
    pub pending: usize,
    /// Bytes consumed in the staging buffer.
    pub staging_used: u64,
    /// Effective staging capacity.
    pub staging_capacity: u64,
    /// Batches submitted since creation.
    pub batches_submitted: u64,
}

/// Packs named byte blobs into a fixed-size device-local buffer.
///
/// Blobs are [`stage`](Self::stage)d into a host-mapped buffer, then moved by
/// [`commit`](Self::commit) as one batched copy. Placement is first-fit over a
/// [`FreeList`]; occupancy is recorded when the batch is submitted. At most one
/// batch is in flight: `commit` waits for the previous one before recording.
///
/// # Example
///
/// ```ignore
/// let mut arena = FreeListArena::new(device, &ArenaSettings::with_capacity(1 << 20))?;
/// arena.stage("Monkey", bytemuck::cast_slice(&monkey_vertices))?;
/// arena.stage("Cube", bytemuck::cast_slice(&cube_vertices))?;
/// arena.commit(false)?;
/// let monkey = arena.lookup("Monkey")?;
/// ```
#[derive(Debug)]
pub struct FreeListArena {
    label: String,
    buffer: BufferId,
    address: DeviceAddress,
    capacity: u64,
    alignment: u64,
    occupied: BTreeMap<String, Element>,
    free: FreeList,
    pending: BTreeMap<String, PendingUpload>,
    staging: StagingArea,
    channel: TransferChannel,
    deletions: DeletionQueue,
}

impl FreeListArena {
    /// Allocates the staging buffer, the device-local buffer and the transfer channel.
    ///
    /// If any step fails, what was already acquired is released before returning.
    pub fn new(
        device: Arc<dyn TransferDevice>,
        settings: &ArenaSettings,
    ) -> Result<Self, ArenaError> {
        Self::with_granularity(device, settings, 1)
    }

    /// Like [`new`](Self::new), but every reservation is also a multiple of `granule`
    /// bytes, so element offsets stay multiples of `granule`.
    pub fn with_granularity(
        device: Arc<dyn TransferDevice>,
        settings: &ArenaSettings,
        granule: u64,
    ) -> Result<Self, ArenaError> {
        let label = settings.label.clone();
        let alignment = lcm(device.copy_alignment().max(1), granule.max(1));
        let mut deletions = DeletionQueue::new();

        let staging = StagingArea::new(
            &device,
            &label,
            settings.effective_staging_capacity(),
            &mut deletions,
        )?;

        let buffer = device.create_buffer(&BufferDescriptor::device_local(
            format!("{label} Local"),
            settings.capacity,
        ))?;
        let release_device = Arc::clone(&device);
        deletions.push("local buffer", move || {
            if let Err(e) = release_device.destroy_buffer(buffer) {
                log::warn!("Failed to destroy local buffer {buffer:?}: {e}");
            }
        });
        let address = device.buffer_address(buffer)?;

        let channel = TransferChannel::new(&device, &label, settings.fence_timeout, &mut deletions)?;

        log::info!(
            "FreeListArena '{label}': {} bytes local, {} bytes staging, alignment {alignment}, {:?} merge",
            settings.capacity,
            staging.capacity(),
            settings.merge_policy
        );

        Ok(Self {
            label,
            buffer,
            address,
            capacity: settings.capacity,
            alignment,
            occupied: BTreeMap::new(),
            free: FreeList::new(settings.capacity, settings.merge_policy),
            pending: BTreeMap::new(),
            staging,
            channel,
            deletions,
        })
    }

    /// Writes `data` to staging and records it as a pending upload under `name`.
    ///
    /// Staging the same name twice before a commit keeps only the latest record; both
    /// writes still consume staging space. Returns the staging offset of the write.
    ///
    /// # Errors
    ///
    /// * [`ArenaError::EmptyElement`] if `data` is empty.
    /// * [`ArenaError::CapacityExceeded`] if staging cannot hold `data`. Previously
    ///   staged uploads are kept.
    pub fn stage(&mut self, name: impl Into<String>, data: &[u8]) -> Result<u64, ArenaError> {
        let name = name.into();
        if data.is_empty() {
            return Err(ArenaError::EmptyElement { name });
        }

        let size = data.len() as u64;
        let reserved = align_up(size, self.alignment);
        let bytes: Cow<'_, [u8]> = if reserved == size {
            Cow::Borrowed(data)
        } else {
            let mut padded = data.to_vec();
            padded.resize(reserved as usize, 0);
            Cow::Owned(padded)
        };

        let staging_offset = self.staging.push(&name, &bytes, reserved)?;
        log::debug!(
            "FreeListArena '{}': staged '{name}' ({size} bytes) at staging offset {staging_offset}",
            self.label
        );

        self.pending.insert(
            name,
            PendingUpload {
                staging_offset,
                size,
                reserved,
            },
        );
        Ok(staging_offset)
    }

    /// Moves every pending upload into the device-local buffer as one batch.
    ///
    /// Blocks until the previous batch has completed. Then, for each pending upload in
    /// name order:
    /// * a resident name is skipped unless `overwrite` is set, in which case its bytes
    ///   are rewritten in place at the existing offset;
    /// * a new name is placed first-fit.
    ///
    /// Placement is planned before anything changes: on error the arena and the pending
    /// set are left as they were.
    ///
    /// # Errors
    ///
    /// * [`ArenaError::OutOfSpace`] if a new element fits in no free interval.
    /// * [`ArenaError::OverwriteTooLarge`] if an in-place rewrite is longer than the
    ///   resident element. The padding after an element is never grown into.
    /// * [`ArenaError::DeviceFailure`] if waiting, resetting or submitting fails.
    pub fn commit(&mut self, overwrite: bool) -> Result<CommitReport, ArenaError> {
        self.channel.wait_idle()?;

        let mut free = self.free.clone();
        let mut report = CommitReport::default();
        let mut regions = Vec::with_capacity(self.pending.len());
        let mut placements = Vec::new();

        for (name, upload) in &self.pending {
            let dst_offset = match self.occupied.get(name) {
                Some(_) if !overwrite => {
                    report.skipped.push(name.clone());
                    continue;
                }
                Some(element) => {
                    if upload.size > element.size {
                        return Err(ArenaError::OverwriteTooLarge {
                            name: name.clone(),
                            reserved: element.size,
                            requested: upload.size,
                        });
                    }
                    report.overwritten.push(name.clone());
                    element.offset
                }
                None => {
                    let offset =
                        free.allocate(upload.reserved)
                            .ok_or_else(|| ArenaError::OutOfSpace {
                                name: name.clone(),
                                requested: upload.size,
                                largest_free: free.largest(),
                            })?;
                    placements.push((
                        name.clone(),
                        Element {
                            offset,
                            size: upload.size,
                            reserved: upload.reserved,
                        },
                    ));
                    report.placed.push(name.clone());
                    offset
                }
            };

            regions.push(CopyRegion {
                src_offset: upload.staging_offset,
                dst_offset,
                size: upload.reserved,
            });
        }

        if !regions.is_empty() {
            self.channel
                .submit_copy(self.staging.buffer(), self.buffer, &regions)?;
        }

        self.free = free;
        self.occupied.extend(placements);
        self.pending.clear();

        report.regions = regions.len();
        report.bytes = regions.iter().map(|r| r.size).sum();
        log::debug!(
            "FreeListArena '{}': commit placed {}, overwrote {}, skipped {}",
            self.label,
            report.placed.len(),
            report.overwritten.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Removes a resident element and returns its range to the free list.
    ///
    /// A free interval starting right after the element is merged into the freed range.
    /// A free interval ending right before it is merged only under [`MergePolicy::Both`].
    /// The device bytes are not cleared and may still be read by an in-flight batch.
    pub fn remove(&mut self, name: &str) -> Result<Element, ArenaError> {
        let element = self
            .occupied
            .remove(name)
            .ok_or_else(|| ArenaError::NotFound {
                name: name.to_owned(),
            })?;
        self.free.release(element.offset, element.reserved);
        log::debug!(
            "FreeListArena '{}': removed '{name}' at {}..{}",
            self.label,
            element.offset,
            element.offset + element.reserved
        );
        Ok(element)
    }

    /// Returns the range of a resident element.
    pub fn lookup(&self, name: &str) -> Result<Element, ArenaError> {
        self.occupied
            .get(name)
            .copied()
            .ok_or_else(|| ArenaError::NotFound {
                name: name.to_owned(),
            })
    }

    /// Returns `true` if `name` is resident.
    pub fn contains(&self, name: &str) -> bool {
        self.occupied.contains_key(name)
    }

    /// A bindable view of a resident element.
    pub fn view(&self, name: &str) -> Result<ArenaView, ArenaError> {
        let element = self.lookup(name)?;
        Ok(ArenaView::new(
            self.buffer,
            self.address,
            element.offset,
            element.size,
        ))
    }

    /// Resident elements in name order.
    pub fn elements(&self) -> impl Iterator<Item = (&str, Element)> + '_ {
        self.occupied.iter().map(|(name, e)| (name.as_str(), *e))
    }

    /// Free intervals in ascending offset order.
    pub fn free_intervals(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.free.intervals()
    }

    /// Staged uploads awaiting the next commit, in name order.
    pub fn pending_uploads(&self) -> impl Iterator<Item = (&str, PendingUpload)> + '_ {
        self.pending.iter().map(|(name, p)| (name.as_str(), *p))
    }

    /// Blocks until the last submitted batch has completed.
    pub fn wait_idle(&mut self) -> Result<(), ArenaError> {
        Ok(self.channel.wait_idle()?)
    }

    /// Rewinds the staging cursor so its space can be reused.
    ///
    /// Waits for the in-flight batch first, since it may still be reading staging.
    ///
    /// # Errors
    ///
    /// [`ArenaError::StagingBusy`] while uploads are pending.
    pub fn reclaim_staging(&mut self) -> Result<(), ArenaError> {
        if !self.pending.is_empty() {
            return Err(ArenaError::StagingBusy {
                pending: self.pending.len(),
            });
        }
        self.channel.wait_idle()?;
        log::debug!(
            "FreeListArena '{}': reclaimed {} staging bytes",
            self.label,
            self.staging.used()
        );
        self.staging.reset();
        Ok(())
    }

    /// A snapshot of occupancy and staging usage.
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            capacity: self.capacity,
            used_bytes: self.occupied.values().map(|e| e.reserved).sum(),
            free_bytes: self.free.total_free(),
            free_intervals: self.free.len(),
            largest_free: self.free.largest(),
            elements: self.occupied.len(),
            pending: self.pending.len(),
            staging_used: self.staging.used(),
            staging_capacity: self.staging.capacity(),
            batches_submitted: self.channel.submitted_batches(),
        }
    }

    /// The device-local buffer holding the elements.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Device address of the start of the device-local buffer.
    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    /// Size of the device-local region in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Placement and staging granularity imposed by the device.
    pub fn alignment(&self) -> u64 {
        self.alignment
    }

    /// The coalescing rule applied by [`remove`](Self::remove).
    pub fn merge_policy(&self) -> MergePolicy {
        self.free.policy()
    }

    /// The arena's debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The staging area feeding this arena.
    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// The transfer channel used by [`commit`](Self::commit).
    pub fn channel(&self) -> &TransferChannel {
        &self.channel
    }
}

impl Drop for FreeListArena {
    fn drop(&mut self) {
        if self.channel.is_in_flight() {
            if let Err(e) = self.channel.wait_idle() {
                log::warn!(
                    "FreeListArena '{}': releasing resources with a batch still in flight: {e}",
                    self.label
                );
            }
        }
        self.deletions.flush();
        log::debug!("FreeListArena '{}': released", self.label);
    }
}
