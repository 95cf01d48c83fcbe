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

use std::sync::Arc;
use std::time::Duration;
use stowage_core::gpu::{
    BufferDescriptor, CopyBatch, CopyRegion, FenceStatus, MemoryBarrier, ResourceError,
    TransferDevice,
};
use stowage_core::LogSink;
use stowage_infra::{WgpuTransferContext, WgpuTransferDevice};

// Returns None if a suitable adapter cannot be found.
fn create_test_device() -> Option<WgpuTransferDevice> {
    let context = WgpuTransferContext::new_headless_blocking(Arc::new(LogSink::default())).ok()?;
    Some(WgpuTransferDevice::new(context))
}

#[test]
fn staged_bytes_reach_device_local_buffer() {
    let Some(device) = create_test_device() else {
        println!("Skipping wgpu transfer test: could not create test device.");
        return;
    };

    let staging = device
        .create_buffer(&BufferDescriptor::staging("Test Staging", 64))
        .unwrap();
    let local = device
        .create_buffer(&BufferDescriptor::device_local("Test Local", 64))
        .unwrap();
    let queue = device.create_transfer_queue(Some("Test")).unwrap();
    let fence = device.create_fence(true).unwrap();

    let payload: Vec<u8> = (0u8..16).collect();
    device.write_mapped(staging, 8, &payload).unwrap();

    device.reset_fence(fence).unwrap();
    let regions = [CopyRegion {
        src_offset: 8,
        dst_offset: 32,
        size: 16,
    }];
    device
        .submit_copies(
            queue,
            &CopyBatch {
                label: Some("Test Copy"),
                source: staging,
                destination: local,
                regions: &regions,
                barrier: MemoryBarrier::Full,
            },
            fence,
        )
        .unwrap();

    assert_eq!(
        device.wait_fence(fence, Duration::from_secs(5)).unwrap(),
        FenceStatus::Signaled
    );
    let bytes = device.read_buffer(local).unwrap();
    assert_eq!(&bytes[32..48], payload.as_slice());
    assert!(bytes[..32].iter().all(|&b| b == 0));

    // The staging buffer is mapped again on the next host write.
    device.write_mapped(staging, 0, &[9; 8]).unwrap();

    device.destroy_fence(fence).unwrap();
    device.destroy_transfer_queue(queue).unwrap();
    device.destroy_buffer(staging).unwrap();
    device.destroy_buffer(local).unwrap();
}

#[test]
fn device_local_buffers_reject_host_writes() {
    let Some(device) = create_test_device() else {
        println!("Skipping wgpu transfer test: could not create test device.");
        return;
    };
    let local = device
        .create_buffer(&BufferDescriptor::device_local("Test Local", 16))
        .unwrap();
    assert_eq!(
        device.write_mapped(local, 0, &[1; 4]),
        Err(ResourceError::NotMappable)
    );
    assert_eq!(device.copy_alignment(), wgpu::MAP_ALIGNMENT);
}

#[test]
fn buffers_beyond_the_device_limit_are_rejected() {
    let Some(device) = create_test_device() else {
        println!("Skipping wgpu limit test: could not create test device.");
        return;
    };

    let limit = device.context().device_limits.max_buffer_size;
    let result = device.create_buffer(&BufferDescriptor::device_local("Too Large", limit + 1));
    assert!(matches!(result, Err(ResourceError::BackendError(_))));
}
