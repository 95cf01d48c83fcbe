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

//! Defines the hierarchy of error types for the transfer subsystem.

use std::fmt;
use std::time::Duration;

/// An error related to the creation or use of a device resource (buffers, fences, queues).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// A generic resource could not be found.
    NotFound,
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// An attempt was made to access a resource out of its bounds (e.g., in a buffer).
    OutOfBounds,
    /// A host write targeted a buffer that was not created host-mappable.
    NotMappable,
    /// A fence was not signaled in time and the caller treats that as fatal.
    FenceTimeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::OutOfBounds => {
                write!(f, "Resource access out of bounds.")
            }
            ResourceError::NotMappable => {
                write!(f, "Host write to a buffer that is not host-mappable.")
            }
            ResourceError::FenceTimeout { timeout } => {
                write!(f, "Fence was not signaled within {timeout:?}.")
            }
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// An error reported by a device-local arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// The staging buffer cannot hold the blob being staged.
    CapacityExceeded {
        /// The element being staged.
        name: String,
        /// Size of the blob in bytes.
        requested: u64,
        /// Bytes of staging already consumed.
        used: u64,
        /// Total staging capacity in bytes.
        capacity: u64,
    },
    /// No free interval of the device-local region can hold the element.
    OutOfSpace {
        /// The element being placed.
        name: String,
        /// Size of the element in bytes.
        requested: u64,
        /// Length of the largest free interval at the time of the request.
        largest_free: u64,
    },
    /// The named element is not resident.
    NotFound {
        /// The name that was looked up.
        name: String,
    },
    /// An in-place overwrite is longer than the resident element.
    OverwriteTooLarge {
        /// The element being overwritten.
        name: String,
        /// Length of the resident element in bytes.
        reserved: u64,
        /// Length of the new blob in bytes.
        requested: u64,
    },
    /// A zero-length blob was staged.
    EmptyElement {
        /// The element being staged.
        name: String,
    },
    /// The staging area cannot be rewound while uploads are still pending.
    StagingBusy {
        /// Number of uploads staged but not yet committed.
        pending: usize,
    },
    /// The underlying device reported an error.
    DeviceFailure(ResourceError),
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArenaError::CapacityExceeded {
                name,
                requested,
                used,
                capacity,
            } => write!(
                f,
                "Not enough space in staging buffer (size = {capacity} bytes, {used} used) when trying to add '{name}' of size {requested} bytes"
            ),
            ArenaError::OutOfSpace {
                name,
                requested,
                largest_free,
            } => write!(
                f,
                "Not enough space in local buffer for '{name}' of size {requested} bytes (largest free interval: {largest_free} bytes)"
            ),
            ArenaError::NotFound { name } => {
                write!(f, "No element named '{name}' is resident")
            }
            ArenaError::OverwriteTooLarge {
                name,
                reserved,
                requested,
            } => write!(
                f,
                "Cannot overwrite '{name}' in place: {requested} bytes requested but only {reserved} resident"
            ),
            ArenaError::EmptyElement { name } => {
                write!(f, "Cannot stage '{name}': blob is empty")
            }
            ArenaError::StagingBusy { pending } => write!(
                f,
                "Cannot reclaim staging buffer while {pending} upload(s) are pending"
            ),
            ArenaError::DeviceFailure(err) => write!(f, "Device operation failed: {err}"),
        }
    }
}

impl std::error::Error for ArenaError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArenaError::DeviceFailure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for ArenaError {
    fn from(err: ResourceError) -> Self {
        ArenaError::DeviceFailure(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn capacity_exceeded_display_names_sizes() {
        let err = ArenaError::CapacityExceeded {
            name: "Monkey".to_string(),
            requested: 2048,
            used: 1000,
            capacity: 2500,
        };
        assert_eq!(
            format!("{err}"),
            "Not enough space in staging buffer (size = 2500 bytes, 1000 used) when trying to add 'Monkey' of size 2048 bytes"
        );
    }

    #[test]
    fn device_failure_wraps_resource_error() {
        let err: ArenaError = ResourceError::FenceTimeout {
            timeout: Duration::from_millis(5),
        }
        .into();
        assert_eq!(
            format!("{err}"),
            "Device operation failed: Fence was not signaled within 5ms."
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn not_found_has_no_source() {
        let err = ArenaError::NotFound {
            name: "Cube".to_string(),
        };
        assert_eq!(format!("{err}"), "No element named 'Cube' is resident");
        assert!(err.source().is_none());
    }
}
