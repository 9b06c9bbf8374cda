//! Process-wide registry of live player processes.
//!
//! Exists for one reason: guaranteeing that every child we ever spawned is
//! terminated when the application exits, including handles orphaned by a
//! crashed supervisor path.  The one-shot "cleanup already ran" gate lives
//! at the controller, not here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::process::ProcessHandle;

pub struct ProcessRegistry {
    processes: Mutex<HashMap<u32, Arc<ProcessHandle>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self {
            processes: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, handle: Arc<ProcessHandle>) {
        debug!(pid = handle.pid, role = %handle.role, "registering process");
        self.processes
            .lock()
            .expect("registry lock poisoned")
            .insert(handle.pid, handle);
    }

    pub fn unregister(&self, pid: u32) -> Option<Arc<ProcessHandle>> {
        self.processes
            .lock()
            .expect("registry lock poisoned")
            .remove(&pid)
    }

    pub fn len(&self) -> usize {
        self.processes.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply the shutdown protocol to a snapshot of the current set and
    /// clear the registry.  Iterating a snapshot (not the live map)
    /// tolerates concurrent register/unregister calls; calling this twice
    /// is safe, the second run sees an empty snapshot.
    pub async fn terminate_all(&self) {
        let snapshot: Vec<Arc<ProcessHandle>> = {
            let map = self.processes.lock().expect("registry lock poisoned");
            map.values().cloned().collect()
        };

        if snapshot.is_empty() {
            return;
        }

        info!(count = snapshot.len(), "terminating all registered processes");
        for handle in snapshot {
            handle.shutdown().await;
            self.unregister(handle.pid);
        }
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}
