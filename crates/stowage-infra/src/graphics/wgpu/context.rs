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

use anyhow::anyhow;
use anyhow::Result;
use std::sync::Arc;
use stowage_core::DiagnosticSink;
use wgpu::{Adapter, Instance, RequestAdapterOptions};

/// Holds the `wgpu` objects a transfer device needs: no surface, just an adapter,
/// a logical device and its queue.
#[derive(Debug)]
pub struct WgpuTransferContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_name: String,
    /// Checked when buffers are sized.
    pub device_limits: wgpu::Limits,
}

impl WgpuTransferContext {
    /// Selects a high-performance adapter and opens a device on it, without a window.
    ///
    /// Uncaptured validation errors are forwarded to `sink`.
    pub async fn new_headless(sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        log::info!("Initializing headless WGPU transfer context...");
        let instance = Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| anyhow!("Failed to find suitable adapter: {}", e))?;
        Self::from_adapter(adapter, sink).await
    }

    /// Blocking form of [`new_headless`](Self::new_headless).
    pub fn new_headless_blocking(sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        pollster::block_on(Self::new_headless(sink))
    }

    /// Opens a logical device on a pre-selected adapter.
    pub async fn from_adapter(adapter: Adapter, sink: Arc<dyn DiagnosticSink>) -> Result<Self> {
        let adapter_info = adapter.get_info();
        log::info!(
            "Using graphics adapter: \"{}\" (Backend: {:?})",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Stowage Transfer Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
            })
            .await
            .map_err(|e| anyhow!("Failed to create logical device: {}", e))?;
        log::info!("Logical device and transfer queue created.");

        device.on_uncaptured_error(Box::new(move |e| {
            sink.report(log::Level::Error, &format!("WGPU Uncaptured Error: {e}"));
        }));

        let device_limits = device.limits();
        log::debug!("Max buffer size: {} bytes", device_limits.max_buffer_size);

        Ok(Self {
            device,
            queue,
            adapter_name: adapter_info.name,
            device_limits,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}
