//! Finished-match records and the teammate pairing table.

use crate::models::court::{CourtMatch, Side};
use crate::models::player::PlayerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for a finished match.
pub type MatchId = Uuid;

/// One finished match, as exported to spreadsheets.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    /// 1-based sequence number within the session.
    pub number: usize,
    /// Zero-based court index.
    pub court: usize,
    /// Court order: team A then team B.
    pub players: [PlayerId; 4],
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub relaxed: bool,
}

impl MatchRecord {
    pub fn from_finished(number: usize, court: usize, m: CourtMatch, end_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            number,
            court,
            players: m.players,
            start_time: m.start_time,
            end_time,
            relaxed: m.relaxed,
        }
    }

    pub fn team(&self, side: Side) -> &[PlayerId] {
        let [a, b] = side.slots();
        &self.players[a..=b]
    }

    /// Seconds between start and end (never negative).
    pub fn duration_seconds(&self) -> i64 {
        (self.end_time - self.start_time).num_seconds().max(0)
    }
}

/// One row of the pairing table.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PairCount {
    pub first: PlayerId,
    pub second: PlayerId,
    pub count: u32,
}

/// How often each unordered pair of players has been teammates. Never pruned.
#[derive(Clone, Debug, Default)]
pub struct PairingHistory {
    counts: HashMap<(PlayerId, PlayerId), u32>,
}

fn pair_key(a: &str, b: &str) -> (PlayerId, PlayerId) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

impl PairingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, a: &str, b: &str) -> u32 {
        self.counts.get(&pair_key(a, b)).copied().unwrap_or(0)
    }

    pub fn record_pair(&mut self, a: &str, b: &str) {
        *self.counts.entry(pair_key(a, b)).or_insert(0) += 1;
    }

    /// Record both teams of a match in court order.
    pub fn record_match(&mut self, players: &[PlayerId; 4]) {
        self.record_pair(&players[0], &players[1]);
        self.record_pair(&players[2], &players[3]);
    }

    /// Sum of previous teammate counts for both teams of a court-ordered match.
    pub fn repeats(&self, players: &[PlayerId; 4]) -> u32 {
        self.count(&players[0], &players[1]) + self.count(&players[2], &players[3])
    }

    /// All pairs, most frequent first (ties by name).
    pub fn entries(&self) -> Vec<PairCount> {
        let mut entries: Vec<PairCount> = self
            .counts
            .iter()
            .map(|((first, second), count)| PairCount {
                first: first.clone(),
                second: second.clone(),
                count: *count,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.first.cmp(&b.first))
                .then_with(|| a.second.cmp(&b.second))
        });
        entries
    }
}
