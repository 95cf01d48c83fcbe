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

//! Implementations of [`stowage_core::gpu::TransferDevice`].
//!
//! * [`graphics::wgpu`] drives a real adapter through `wgpu`.
//! * [`graphics::host`] emulates a device in host memory, with deferred copy
//!   execution, for tests and headless tools.

pub mod graphics;

pub use graphics::host::{HostTransferDevice, SubmissionRecord};
pub use graphics::wgpu::{WgpuTransferContext, WgpuTransferDevice};
