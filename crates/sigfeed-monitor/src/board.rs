//! Last known health per trading platform.

use parking_lot::RwLock;
use sigfeed_core::{PlatformHealth, PlatformState, PlatformStatusUpdate};
use std::collections::BTreeMap;

/// Platform name -> latest health. Updates merge; entries are never removed.
#[derive(Debug, Default)]
pub struct PlatformBoard {
    platforms: RwLock<BTreeMap<String, PlatformHealth>>,
}

impl PlatformBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an update, replacing entries for the platforms it names.
    pub fn apply(&self, update: PlatformStatusUpdate) {
        self.platforms.write().extend(update.platforms);
    }

    pub fn get(&self, platform: &str) -> Option<PlatformHealth> {
        self.platforms.read().get(platform).cloned()
    }

    pub fn len(&self) -> usize {
        self.platforms.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.read().is_empty()
    }

    /// Platforms currently reporting `online`.
    pub fn online_count(&self) -> usize {
        self.platforms
            .read()
            .values()
            .filter(|h| h.status == PlatformState::Online)
            .count()
    }

    /// `name=state` pairs in name order, for log lines.
    pub fn summary(&self) -> String {
        self.platforms
            .read()
            .iter()
            .map(|(name, health)| format!("{name}={}", health.status))
            .collect::<Vec<_>>()
            .join(",")
    }
}
