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

//! Provides the public, backend-agnostic transfer contracts.
//!
//! This module defines the "common language" spoken between the arena allocator
//! and whatever graphics API sits underneath it. It contains the abstract
//! [`TransferDevice`] trait, the handle and descriptor types it consumes, and the
//! error hierarchy it reports through.
//!
//! The 'what' lives here; the 'how' is provided by a concrete backend in the
//! `stowage-infra` crate (the WGPU backend, or the host-memory backend used for
//! headless runs), which implements these traits.

pub mod api;
pub mod error;
pub mod traits;

// Re-export the most important traits and types for easier use.
pub use self::api::*;
pub use self::error::{ArenaError, ResourceError};
pub use self::traits::TransferDevice;
