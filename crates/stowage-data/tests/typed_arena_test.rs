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

use bytemuck::{Pod, Zeroable};
use std::sync::Arc;
use stowage_core::gpu::{ArenaError, ArenaSettings, TransferDevice};
use stowage_data::allocators::{ElementRange, TypedArena};
use stowage_infra::HostTransferDevice;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct Vertex {
    position: [f32; 3],
}

fn vertices(n: usize, base: f32) -> Vec<Vertex> {
    (0..n)
        .map(|i| Vertex {
            position: [base + i as f32, 0.0, 1.0],
        })
        .collect()
}

fn typed(device: &HostTransferDevice, capacity: u64) -> TypedArena<Vertex> {
    let shared: Arc<dyn TransferDevice> = Arc::new(device.clone());
    TypedArena::new(shared, &ArenaSettings::with_capacity(capacity)).unwrap()
}

#[test]
fn ranges_are_in_element_units() {
    let device = HostTransferDevice::new();
    let mut meshes = typed(&device, 12 * 64);

    meshes.stage_slice("Monkey", &vertices(10, 0.0)).unwrap();
    meshes.stage_slice("Torus", &vertices(4, 100.0)).unwrap();
    meshes.commit(false).unwrap();

    assert_eq!(
        meshes.range("Monkey").unwrap(),
        ElementRange { first: 0, count: 10 }
    );
    assert_eq!(
        meshes.range("Torus").unwrap(),
        ElementRange { first: 10, count: 4 }
    );
    assert_eq!(meshes.byte_range("Torus").unwrap().offset, 120);
    assert_eq!(meshes.capacity(), 64);
}

#[test]
fn offsets_stay_on_element_boundaries_under_copy_alignment() {
    let device = HostTransferDevice::with_copy_alignment(8);
    let mut meshes = typed(&device, 12 * 64);
    assert_eq!(meshes.arena().alignment(), 24);

    meshes.stage_slice("Tri", &vertices(3, 0.0)).unwrap();
    meshes.stage_slice("Point", &vertices(1, 5.0)).unwrap();
    meshes.commit(false).unwrap();

    // "Point" sorts first: one 12-byte vertex reserves 24 bytes.
    assert_eq!(
        meshes.range("Point").unwrap(),
        ElementRange { first: 0, count: 1 }
    );
    assert_eq!(
        meshes.range("Tri").unwrap(),
        ElementRange { first: 2, count: 3 }
    );

    meshes.arena_mut().wait_idle().unwrap();
    let bytes = device.buffer_contents(meshes.arena().buffer()).unwrap();
    let expected = vertices(3, 0.0);
    assert_eq!(&bytes[24..60], bytemuck::cast_slice::<Vertex, u8>(&expected));
}

#[test]
fn removed_range_is_reused_by_index() {
    let device = HostTransferDevice::new();
    let mut meshes = typed(&device, 12 * 16);
    meshes.stage_slice("A", &vertices(4, 0.0)).unwrap();
    meshes.stage_slice("B", &vertices(4, 0.0)).unwrap();
    meshes.commit(false).unwrap();

    assert_eq!(
        meshes.remove("A").unwrap(),
        ElementRange { first: 0, count: 4 }
    );
    assert!(matches!(
        meshes.range("A"),
        Err(ArenaError::NotFound { .. })
    ));

    meshes.stage_slice("C", &vertices(2, 0.0)).unwrap();
    meshes.commit(false).unwrap();
    assert_eq!(
        meshes.range("C").unwrap(),
        ElementRange { first: 0, count: 2 }
    );
}
