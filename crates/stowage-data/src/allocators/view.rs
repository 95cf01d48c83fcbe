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

use stowage_core::gpu::{BufferId, DeviceAddress};

/// A resident element as a consumer binds it: buffer, offset and length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaView {
    /// The arena's device-local buffer.
    pub buffer: BufferId,
    /// Device address of the start of `buffer`.
    pub base_address: DeviceAddress,
    /// Byte offset of the element in `buffer`.
    pub offset: u64,
    /// Length of the element in bytes.
    pub size: u64,
}

impl ArenaView {
    pub(crate) fn new(buffer: BufferId, base_address: DeviceAddress, offset: u64, size: u64) -> Self {
        Self {
            buffer,
            base_address,
            offset,
            size,
        }
    }

    /// One past the last byte of the view.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Device address of the first byte of the element.
    pub fn address(&self) -> DeviceAddress {
        self.base_address.offset(self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_base_plus_offset() {
        let view = ArenaView::new(BufferId(3), DeviceAddress(0x1000), 0x40, 16);
        assert_eq!(view.address(), DeviceAddress(0x1040));
        assert_eq!(view.end(), 0x50);
    }
}
