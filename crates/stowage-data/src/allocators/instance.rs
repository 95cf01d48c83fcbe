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

use super::arena::FreeListArena;
use super::view::ArenaView;
use stowage_core::gpu::ArenaError;

/// A drawable pairing of a mesh and a transform, each resident in its own arena.
///
/// Several instances may share one mesh view while pointing at different transforms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Name of the instance, independent of the element names it refers to.
    pub name: String,
    /// Vertex data of the instance.
    pub mesh: ArenaView,
    /// Transform of the instance.
    pub transform: ArenaView,
}

impl Instance {
    /// Pairs two views that were already resolved.
    pub fn new(name: impl Into<String>, mesh: ArenaView, transform: ArenaView) -> Self {
        Self {
            name: name.into(),
            mesh,
            transform,
        }
    }

    /// Looks up `mesh` in `meshes` and `transform` in `transforms`.
    ///
    /// # Errors
    ///
    /// [`ArenaError::NotFound`] if either element is not resident.
    pub fn resolve(
        name: impl Into<String>,
        meshes: &FreeListArena,
        mesh: &str,
        transforms: &FreeListArena,
        transform: &str,
    ) -> Result<Self, ArenaError> {
        Ok(Self::new(name, meshes.view(mesh)?, transforms.view(transform)?))
    }

    /// True if the views still describe the ranges currently resident under
    /// `mesh` and `transform`. Removal or reuse of either range invalidates the instance.
    pub fn is_current(
        &self,
        meshes: &FreeListArena,
        mesh: &str,
        transforms: &FreeListArena,
        transform: &str,
    ) -> bool {
        meshes.view(mesh).is_ok_and(|v| v == self.mesh)
            && transforms.view(transform).is_ok_and(|v| v == self.transform)
    }
}
