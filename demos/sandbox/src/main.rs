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

// Stowage Sandbox
// Uploads a few meshes and transforms, frees one, and reuses its range.
//
// Usage: sandbox [settings.ron]

use std::sync::Arc;

use anyhow::{Context, Result};
use stowage_core::gpu::{ArenaSettings, TransferDevice};
use stowage_core::LogSink;
use stowage_data::allocators::{Instance, TypedArena};
use stowage_infra::{HostTransferDevice, WgpuTransferContext, WgpuTransferDevice};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: [f32; 3],
}

type Mat4 = [[f32; 4]; 4];

const TRIANGLE: &[Vertex] = &[
    Vertex {
        position: [0.0, 0.5, 0.0],
        color: [1.0, 0.0, 0.0],
    },
    Vertex {
        position: [-0.5, -0.5, 0.0],
        color: [0.0, 1.0, 0.0],
    },
    Vertex {
        position: [0.5, -0.5, 0.0],
        color: [0.0, 0.0, 1.0],
    },
];

fn quad() -> Vec<Vertex> {
    [[-0.5, -0.5], [0.5, -0.5], [0.5, 0.5], [-0.5, -0.5], [0.5, 0.5], [-0.5, 0.5]]
        .into_iter()
        .map(|[x, y]| Vertex {
            position: [x, y, 0.0],
            color: [1.0, 1.0, 1.0],
        })
        .collect()
}

fn translation(x: f32, y: f32, z: f32) -> Mat4 {
    [
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [x, y, z, 1.0],
    ]
}

fn load_settings() -> Result<ArenaSettings> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings file '{path}'"))?;
            ron::from_str(&text).with_context(|| format!("Failed to parse settings file '{path}'"))
        }
        None => Ok(ArenaSettings {
            label: "Sandbox".to_owned(),
            capacity: 64 * 1024,
            staging_capacity: 256 * 1024,
            ..Default::default()
        }),
    }
}

fn create_device() -> Arc<dyn TransferDevice> {
    match WgpuTransferContext::new_headless_blocking(Arc::new(LogSink::default())) {
        Ok(context) => {
            log::info!("Using wgpu adapter \"{}\"", context.adapter_name);
            Arc::new(WgpuTransferDevice::new(context))
        }
        Err(e) => {
            log::warn!("No wgpu adapter available ({e}); falling back to the host device.");
            Arc::new(HostTransferDevice::new())
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let settings = load_settings()?;
    let device = create_device();

    let mut meshes: TypedArena<Vertex> = TypedArena::new(Arc::clone(&device), &settings)?;
    let mut transforms: TypedArena<Mat4> = TypedArena::new(
        device,
        &ArenaSettings {
            label: format!("{} Transforms", settings.label),
            capacity: 64 * std::mem::size_of::<Mat4>() as u64,
            ..settings.clone()
        },
    )?;

    meshes.stage_slice("Triangle", TRIANGLE)?;
    meshes.stage_slice("Quad", &quad())?;
    meshes.stage_slice("Fan", &quad()[..4])?;
    let report = meshes.commit(false)?;
    log::info!("Placed meshes: {:?}", report.placed);

    for (i, name) in ["Triangle", "Quad", "Fan"].into_iter().enumerate() {
        transforms.stage_slice(name, &[translation(i as f32, 0.0, 0.0)])?;
    }
    transforms.commit(false)?;

    // Two instances share the triangle mesh.
    let instances = [
        ("Triangle A", "Triangle", "Triangle"),
        ("Triangle B", "Triangle", "Fan"),
        ("Quad", "Quad", "Quad"),
    ]
    .into_iter()
    .map(|(name, mesh, transform)| {
        Instance::resolve(name, meshes.arena(), mesh, transforms.arena(), transform)
    })
    .collect::<Result<Vec<_>, _>>()?;
    for instance in &instances {
        log::info!(
            "{}: mesh bytes {}..{} at {:#x}, transform at {:#x}",
            instance.name,
            instance.mesh.offset,
            instance.mesh.end(),
            instance.mesh.address().0,
            instance.transform.address().0
        );
    }

    // Free the quad and place a smaller mesh in its range.
    let freed = meshes.remove("Quad")?;
    meshes.stage_slice("Small Triangle", TRIANGLE)?;
    meshes.commit(false)?;
    let reused = meshes.range("Small Triangle")?;
    log::info!(
        "Freed vertices {}..{}, 'Small Triangle' placed at {}",
        freed.first,
        freed.first + freed.count,
        reused.first
    );
    let quad = &instances[2];
    log::info!(
        "Instance '{}' still current: {}",
        quad.name,
        quad.is_current(meshes.arena(), "Quad", transforms.arena(), "Quad")
    );

    // Rewrite a transform in place.
    transforms.stage_slice("Triangle", &[translation(0.0, 2.0, 0.0)])?;
    let report = transforms.commit(true)?;
    log::info!("Overwrote transforms: {:?}", report.overwritten);

    meshes.arena_mut().wait_idle()?;
    transforms.arena_mut().wait_idle()?;

    let stats = meshes.arena().stats();
    log::info!(
        "Mesh arena: {}/{} bytes used, {} free intervals (largest {} bytes), {} batches, staging {}/{}",
        stats.used_bytes,
        stats.capacity,
        stats.free_intervals,
        stats.largest_free,
        stats.batches_submitted,
        stats.staging_used,
        stats.staging_capacity
    );
    for (start, len) in meshes.arena().free_intervals() {
        log::info!("  free: {start}..{}", start + len);
    }
    Ok(())
}
