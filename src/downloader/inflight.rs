//! One active download per user.

use std::sync::Arc;

use dashmap::DashSet;

/// Users with a download in progress.
#[derive(Clone, Default)]
pub struct InFlight {
    active: Arc<DashSet<u64>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the user busy. `None` if a download is already running.
    pub fn try_start(&self, user_id: u64) -> Option<InFlightGuard> {
        // `insert` is atomic per shard: only one caller sees `true`.
        if !self.active.insert(user_id) {
            return None;
        }
        Some(InFlightGuard {
            active: Arc::clone(&self.active),
            user_id,
        })
    }

    /// Number of downloads currently running.
    pub fn len(&self) -> usize {
        self.active.len()
    }
}

/// Releases the user's slot on drop.
pub struct InFlightGuard {
    active: Arc<DashSet<u64>>,
    user_id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active.remove(&self.user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_download_per_user() {
        let in_flight = InFlight::new();

        let guard = in_flight.try_start(1).unwrap();
        assert!(in_flight.try_start(1).is_none());
        assert!(in_flight.try_start(2).is_some());
        assert_eq!(in_flight.len(), 1);

        drop(guard);
        assert!(in_flight.try_start(1).is_some());
    }
}
