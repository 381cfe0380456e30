use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushSkipReason {
    Offline,
    RemoteUnconfigured,
    LocalStoreUnavailable,
}

/// Result of one drain of the sync queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushOutcome {
    pub succeeded: u32,
    pub failed: u32,
    pub backing_off: u32,
    pub discarded: u32,
    pub remaining: u32,
    pub skipped: Option<PushSkipReason>,
    pub last_error: Option<String>,
}

impl PushOutcome {
    pub fn skipped(reason: PushSkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub fn processed(&self) -> u32 {
        self.succeeded + self.failed + self.discarded
    }

    pub fn is_clean(&self) -> bool {
        self.skipped.is_none() && self.failed == 0 && self.discarded == 0 && self.backing_off == 0
    }
}

/// How `merge_one` resolved an incoming remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeDecision {
    Inserted,
    Overwrote,
    /// The local pending change is strictly newer and will win on its next push.
    KeptLocal,
    /// A stale draft never replaces a signed local record.
    KeptSigned,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullOutcome {
    pub fetched: u32,
    pub inserted: u32,
    pub overwritten: u32,
    pub kept_local: u32,
    pub kept_signed: u32,
    pub failed: u32,
}

impl PullOutcome {
    pub fn record(&mut self, decision: MergeDecision) {
        match decision {
            MergeDecision::Inserted => self.inserted += 1,
            MergeDecision::Overwrote => self.overwritten += 1,
            MergeDecision::KeptLocal => self.kept_local += 1,
            MergeDecision::KeptSigned => self.kept_signed += 1,
        }
    }
}

/// One full bidirectional pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub push: PushOutcome,
    pub pull: Option<PullOutcome>,
}
