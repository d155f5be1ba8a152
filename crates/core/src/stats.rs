use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::format::format_time_saved;
use crate::logger;
use crate::progress::{Milestone, ProgressEvent};

/// Seconds of manual play one ITOPOD snipe saves.
pub const SECONDS_SAVED_PER_SNIPE: f64 = 0.8;

/// Lifetime counters, persisted as
/// `{"itopod_snipes": 42, "itopod_time_saved": "0 days, 0 hours, 0 minutes, 33 seconds"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub itopod_snipes: u64,
    pub itopod_time_saved: String,
}

impl Default for Stats {
    fn default() -> Self {
        Self { itopod_snipes: 0, itopod_time_saved: "0".to_string() }
    }
}

impl Stats {
    pub fn time_saved(&self) -> Duration {
        Duration::from_secs_f64(self.itopod_snipes as f64 * SECONDS_SAVED_PER_SNIPE)
    }

    /// Apply a worker event. Only snipe milestones change lifetime stats.
    pub fn record(&mut self, event: &ProgressEvent) {
        if let ProgressEvent::MilestoneReached { kind: Milestone::ItopodSnipe } = event {
            self.itopod_snipes += 1;
            self.itopod_time_saved = format_time_saved(self.time_saved());
        }
    }
}

/// Stats plus the file they live in.
#[derive(Debug)]
pub struct StatsStore {
    path: PathBuf,
    pub stats: Stats,
}

impl StatsStore {
    /// Missing file means a fresh install; a corrupt one is logged and reset.
    pub fn load(path: &Path) -> Self {
        let stats = match std::fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                logger::warn(&format!("ignoring unreadable {}: {}", path.display(), e));
                Stats::default()
            }),
            Err(_) => Stats::default(),
        };
        Self { path: path.to_path_buf(), stats }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.stats)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
