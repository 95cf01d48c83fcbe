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

//! Element-typed facade over [`FreeListArena`].

use super::arena::{CommitReport, Element, FreeListArena};
use bytemuck::Pod;
use std::marker::PhantomData;
use std::sync::Arc;
use stowage_core::gpu::{ArenaError, ArenaSettings, TransferDevice};

/// A run of elements, in units of the arena's element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementRange {
    /// Index of the first element, as used by an indexed draw's base vertex.
    pub first: u64,
    /// Number of elements.
    pub count: u64,
}

/// A [`FreeListArena`] whose blobs are slices of `T`.
///
/// Reservations are rounded to a multiple of `size_of::<T>()`, so every resident
/// slice starts on an element boundary and can be addressed by index.
///
/// Zero-sized element types are rejected at build time:
///
/// ```compile_fail
/// use std::sync::Arc;
/// use stowage_core::gpu::{ArenaSettings, TransferDevice};
/// use stowage_data::allocators::TypedArena;
/// use stowage_infra::HostTransferDevice;
///
/// let device: Arc<dyn TransferDevice> = Arc::new(HostTransferDevice::new());
/// let _ = TypedArena::<()>::new(device, &ArenaSettings::with_capacity(64));
/// ```
#[derive(Debug)]
pub struct TypedArena<T: Pod> {
    arena: FreeListArena,
    _marker: PhantomData<T>,
}

impl<T: Pod> TypedArena<T> {
    // Evaluated at monomorphization, so a zero-sized `T` fails to build.
    const STRIDE: u64 = {
        assert!(
            std::mem::size_of::<T>() > 0,
            "TypedArena cannot hold zero-sized elements"
        );
        std::mem::size_of::<T>() as u64
    };

    /// Creates the underlying arena.
    pub fn new(device: Arc<dyn TransferDevice>, settings: &ArenaSettings) -> Result<Self, ArenaError> {
        Ok(Self {
            arena: FreeListArena::with_granularity(device, settings, Self::STRIDE)?,
            _marker: PhantomData,
        })
    }

    /// Stages `items` under `name`.
    pub fn stage_slice(&mut self, name: impl Into<String>, items: &[T]) -> Result<u64, ArenaError> {
        self.arena.stage(name, bytemuck::cast_slice(items))
    }

    /// See [`FreeListArena::commit`].
    pub fn commit(&mut self, overwrite: bool) -> Result<CommitReport, ArenaError> {
        self.arena.commit(overwrite)
    }

    /// Removes `name` and returns the elements it occupied.
    pub fn remove(&mut self, name: &str) -> Result<ElementRange, ArenaError> {
        self.arena.remove(name).map(Self::to_range)
    }

    /// The element range occupied by `name`.
    pub fn range(&self, name: &str) -> Result<ElementRange, ArenaError> {
        self.arena.lookup(name).map(Self::to_range)
    }

    /// The byte range occupied by `name`.
    pub fn byte_range(&self, name: &str) -> Result<Element, ArenaError> {
        self.arena.lookup(name)
    }

    /// Capacity of the arena in whole elements.
    pub fn capacity(&self) -> u64 {
        self.arena.capacity() / Self::STRIDE
    }

    /// The untyped arena.
    pub fn arena(&self) -> &FreeListArena {
        &self.arena
    }

    /// The untyped arena, mutably.
    pub fn arena_mut(&mut self) -> &mut FreeListArena {
        &mut self.arena
    }

    fn to_range(element: Element) -> ElementRange {
        ElementRange {
            first: element.offset / Self::STRIDE,
            count: element.size / Self::STRIDE,
        }
    }
}
