use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Process-lifetime counters, shared across all concurrent requests.
/// Increments are atomic; losing one under concurrency would be a bug,
/// not an approximation.
pub struct Stats {
    started: Instant,
    downloads: AtomicU64,
    errors: AtomicU64,
    users: Mutex<HashSet<u64>>,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            downloads: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            users: Mutex::new(HashSet::new()),
        }
    }

    pub fn record_download(&self, session: u64) {
        self.downloads.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut users) = self.users.lock() {
            users.insert(session);
        }
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            uptime_secs: self.started.elapsed().as_secs(),
            downloads: self.downloads.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            users: self.users.lock().map(|u| u.len() as u64).unwrap_or(0),
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub uptime_secs: u64,
    pub downloads: u64,
    pub errors: u64,
    pub users: u64,
}
