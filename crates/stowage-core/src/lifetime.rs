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

//! Ordered teardown of device resources.

use std::fmt;

type Deletor = Box<dyn FnOnce() + Send>;

/// A list of release callbacks run in reverse registration order.
///
/// Resources are pushed as they are acquired; [`flush`](Self::flush) releases them
/// last-acquired first. A queue that is dropped without being flushed flushes itself.
#[derive(Default)]
pub struct DeletionQueue {
    deletors: Vec<(&'static str, Deletor)>,
}

impl DeletionQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a release callback.
    pub fn push(&mut self, label: &'static str, deletor: impl FnOnce() + Send + 'static) {
        self.deletors.push((label, Box::new(deletor)));
    }

    /// Number of callbacks still registered.
    pub fn len(&self) -> usize {
        self.deletors.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.deletors.is_empty()
    }

    /// Runs every registered callback, most recently pushed first.
    pub fn flush(&mut self) {
        while let Some((label, deletor)) = self.deletors.pop() {
            log::trace!("DeletionQueue: releasing {label}");
            deletor();
        }
    }
}

impl fmt::Debug for DeletionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.deletors.iter().map(|(label, _)| label))
            .finish()
    }
}

impl Drop for DeletionQueue {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn flush_runs_last_acquired_first() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut queue = DeletionQueue::new();
        for name in ["staging", "local", "fence"] {
            let order = Arc::clone(&order);
            queue.push(name, move || order.lock().unwrap().push(name));
        }
        assert_eq!(queue.len(), 3);

        queue.flush();

        assert!(queue.is_empty());
        assert_eq!(*order.lock().unwrap(), vec!["fence", "local", "staging"]);
    }

    #[test]
    fn drop_flushes_remaining_deletors() {
        let released = Arc::new(Mutex::new(0));
        {
            let mut queue = DeletionQueue::new();
            let released = Arc::clone(&released);
            queue.push("buffer", move || *released.lock().unwrap() += 1);
        }
        assert_eq!(*released.lock().unwrap(), 1);
    }
}
