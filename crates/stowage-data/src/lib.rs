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

//! # Stowage Data
//!
//! Data layouts and allocators: a fixed-capacity, device-local arena that packs
//! named byte blobs, fed through a bounded host-mapped staging buffer and a
//! dedicated transfer channel.

#![warn(missing_docs)]

pub mod allocators;

pub use allocators::{
    ArenaStats, ArenaView, CommitReport, Element, ElementRange, FreeList, FreeListArena,
    Instance, PendingUpload, StagingArea, TransferChannel, TypedArena,
};
