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

//! Dedicated submission path for staging-to-device copies.

use std::sync::Arc;
use std::time::Duration;
use stowage_core::gpu::{
    BufferId, CopyBatch, CopyRegion, FenceId, FenceStatus, MemoryBarrier, ResourceError,
    TransferDevice, TransferQueueId,
};
use stowage_core::DeletionQueue;

/// Owns a transfer queue and a private fence, separate from any per-frame
/// graphics submission.
///
/// Submissions never block. Completion is awaited by [`wait_idle`](Self::wait_idle),
/// which the arena calls at the start of the next batch, so uploads are pipelined
/// one batch deep.
#[derive(Debug)]
pub struct TransferChannel {
    device: Arc<dyn TransferDevice>,
    label: String,
    queue: TransferQueueId,
    fence: FenceId,
    timeout: Duration,
    in_flight: bool,
    submitted_batches: u64,
}

impl TransferChannel {
    /// Creates the queue and a signaled fence, so the first wait returns at once.
    ///
    /// Releases are registered on `deletions`; the fence is released before the queue.
    pub fn new(
        device: &Arc<dyn TransferDevice>,
        label: &str,
        timeout: Duration,
        deletions: &mut DeletionQueue,
    ) -> Result<Self, ResourceError> {
        let queue = device.create_transfer_queue(Some(&format!("{label} Transfer")))?;
        let queue_device = Arc::clone(device);
        deletions.push("transfer queue", move || {
            if let Err(e) = queue_device.destroy_transfer_queue(queue) {
                log::warn!("Failed to destroy transfer queue {queue:?}: {e}");
            }
        });

        let fence = device.create_fence(true)?;
        let fence_device = Arc::clone(device);
        deletions.push("transfer fence", move || {
            if let Err(e) = fence_device.destroy_fence(fence) {
                log::warn!("Failed to destroy transfer fence {fence:?}: {e}");
            }
        });

        Ok(Self {
            device: Arc::clone(device),
            label: format!("{label} Copy"),
            queue,
            fence,
            timeout,
            in_flight: false,
            submitted_batches: 0,
        })
    }

    /// Blocks until the last submitted batch has completed.
    ///
    /// Returns at once when nothing is in flight, including after a failed
    /// submission that left the fence reset. A timeout is reported as
    /// [`ResourceError::FenceTimeout`].
    pub fn wait_idle(&mut self) -> Result<(), ResourceError> {
        if !self.in_flight {
            return Ok(());
        }
        match self.device.wait_fence(self.fence, self.timeout)? {
            FenceStatus::Signaled => {
                self.in_flight = false;
                Ok(())
            }
            FenceStatus::Timeout => {
                log::error!(
                    "TransferChannel '{}': batch {} still running after {:?}",
                    self.label,
                    self.submitted_batches,
                    self.timeout
                );
                Err(ResourceError::FenceTimeout {
                    timeout: self.timeout,
                })
            }
        }
    }

    /// Records one copy command over `regions` followed by a full barrier and submits it.
    ///
    /// The fence must be signaled (see [`wait_idle`](Self::wait_idle)); it is reset here
    /// and signaled again by the device when the copy completes.
    pub fn submit_copy(
        &mut self,
        source: BufferId,
        destination: BufferId,
        regions: &[CopyRegion],
    ) -> Result<(), ResourceError> {
        self.device.reset_fence(self.fence)?;

        let batch = CopyBatch {
            label: Some(&self.label),
            source,
            destination,
            regions,
            barrier: MemoryBarrier::Full,
        };
        self.device.submit_copies(self.queue, &batch, self.fence)?;

        self.in_flight = true;
        self.submitted_batches += 1;
        log::debug!(
            "TransferChannel '{}': submitted batch {} ({} regions, {} bytes)",
            self.label,
            self.submitted_batches,
            regions.len(),
            batch.total_bytes()
        );
        Ok(())
    }

    /// Returns `true` between a submission and the wait that observes its completion.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Number of batches submitted so far.
    pub fn submitted_batches(&self) -> u64 {
        self.submitted_batches
    }

    /// The bounded wait applied to the fence.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
