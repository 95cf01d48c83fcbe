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

//! Destination for diagnostics raised by a backend outside of any call.
//!
//! Validation layers and driver callbacks report asynchronously, so they cannot
//! return a `Result`. A backend receives a [`DiagnosticSink`] when it is built and
//! forwards those reports to it.

use log::Level;
use std::fmt::Debug;

/// Receives diagnostics emitted by a backend.
pub trait DiagnosticSink: Send + Sync + Debug {
    /// Records one diagnostic message.
    fn report(&self, level: Level, message: &str);
}

/// A [`DiagnosticSink`] that forwards every report to the `log` facade.
#[derive(Debug, Clone)]
pub struct LogSink {
    target: &'static str,
}

impl LogSink {
    /// Creates a sink logging under the given target.
    pub const fn new(target: &'static str) -> Self {
        Self { target }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new("stowage::device")
    }
}

impl DiagnosticSink for LogSink {
    fn report(&self, level: Level, message: &str) {
        log::log!(target: self.target, level, "{message}");
    }
}
