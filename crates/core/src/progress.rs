//! Worker → controller progress stream.
//!
//! Sending never blocks the worker: the channel is unbounded and a vanished
//! controller is ignored. The controller drains on its own schedule and
//! folds events into a [`ProgressView`] in emission order.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::mpsc;

/// Recipe-defined events that feed lifetime statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    ItopodSnipe,
    QuestCompleted,
}

impl FromStr for Milestone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "itopod_snipe" => Ok(Milestone::ItopodSnipe),
            "quest_completed" => Ok(Milestone::QuestCompleted),
            other => Err(format!("unknown milestone '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExitReason {
    Cancelled,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    CounterUpdate { name: String, value: u64 },
    RateUpdate { name: String, value: f64 },
    TaskProgress { fraction: f64 },
    TaskLabel { text: String },
    MilestoneReached { kind: Milestone },
    /// Last event of every run.
    WorkerExited { reason: ExitReason },
}

pub fn channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::channel();
    (ProgressSender { tx }, ProgressReceiver { rx })
}

#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ProgressSender {
    /// Fire and forget.
    pub fn emit(&self, event: ProgressEvent) {
        self.tx.send(event).ok();
    }

    pub fn counter(&self, name: &str, value: u64) {
        self.emit(ProgressEvent::CounterUpdate { name: name.to_string(), value });
    }

    pub fn rate(&self, name: &str, value: f64) {
        self.emit(ProgressEvent::RateUpdate { name: name.to_string(), value });
    }

    pub fn progress(&self, fraction: f64) {
        self.emit(ProgressEvent::TaskProgress { fraction });
    }

    pub fn label(&self, text: &str) {
        self.emit(ProgressEvent::TaskLabel { text: text.to_string() });
    }

    pub fn milestone(&self, kind: Milestone) {
        self.emit(ProgressEvent::MilestoneReached { kind });
    }
}

#[derive(Debug)]
pub struct ProgressReceiver {
    rx: mpsc::Receiver<ProgressEvent>,
}

impl ProgressReceiver {
    /// Everything queued so far, oldest first.
    pub fn drain(&self) -> Vec<ProgressEvent> {
        self.rx.try_iter().collect()
    }

    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<ProgressEvent> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// Controller-side display state for the current run.
#[derive(Debug, Clone, Default)]
pub struct ProgressView {
    pub counters: BTreeMap<String, u64>,
    pub rates: BTreeMap<String, f64>,
    pub fraction: f64,
    pub label: String,
    pub milestones: u64,
    pub exit: Option<ExitReason>,
    pub events_seen: u64,
}

impl ProgressView {
    pub fn apply(&mut self, event: &ProgressEvent) {
        self.events_seen += 1;
        match event {
            ProgressEvent::CounterUpdate { name, value } => {
                self.counters.insert(name.clone(), *value);
            }
            ProgressEvent::RateUpdate { name, value } => {
                self.rates.insert(name.clone(), *value);
            }
            ProgressEvent::TaskProgress { fraction } => {
                self.fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
            }
            ProgressEvent::TaskLabel { text } => self.label = text.clone(),
            ProgressEvent::MilestoneReached { .. } => self.milestones += 1,
            ProgressEvent::WorkerExited { reason } => self.exit = Some(reason.clone()),
        }
    }

    pub fn counter(&self, name: &str) -> Option<u64> {
        self.counters.get(name).copied()
    }

    pub fn rate(&self, name: &str) -> Option<f64> {
        self.rates.get(name).copied()
    }
}
