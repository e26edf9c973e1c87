//! Contracts with the presentation layer: pool/match notifications and the relax prompt.

use crate::logic::SelectionRule;
use crate::models::{PlayerId, PoolSnapshot, Side, TeamSplit};
use log::info;
use serde::{Deserialize, Serialize};

/// A match that was just committed to a court.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchFormed {
    pub court: usize,
    /// Court order: team A then team B.
    pub players: [PlayerId; 4],
    /// Split chosen over the selected candidates.
    pub split: TeamSplit,
    /// Why these 4 were picked.
    pub rule: SelectionRule,
    pub relaxed: bool,
    /// Team level difference, when the numeric policy was used.
    pub level_diff: Option<f64>,
}

impl MatchFormed {
    pub fn team(&self, side: Side) -> &[PlayerId] {
        let [a, b] = side.slots();
        &self.players[a..=b]
    }

    /// One-line announcement, e.g. "Court 2: Alice & Bob vs Carol & Dave".
    pub fn announcement(&self) -> String {
        format!(
            "Court {}: {} vs {}",
            self.court + 1,
            self.team(Side::A).join(" & "),
            self.team(Side::B).join(" & ")
        )
    }
}

/// Receives engine notifications. Both methods default to no-ops.
pub trait RotationListener {
    /// Called after every committed mutation.
    fn on_pool_changed(&self, _snapshot: &PoolSnapshot) {}

    fn on_match_formed(&self, _event: &MatchFormed) {}
}

/// Logs every formed match as an announcement line.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogListener;

impl RotationListener for LogListener {
    fn on_match_formed(&self, event: &MatchFormed) {
        if event.relaxed {
            info!("{} (balance relaxed)", event.announcement());
        } else {
            info!("{}", event.announcement());
        }
    }
}

/// Answers the "relax constraints?" question when no balanced split exists.
pub trait RelaxDecider {
    /// `candidates` are the 4 players that could not be balanced.
    fn confirm_relax(&mut self, court: usize, candidates: &[PlayerId]) -> bool;
}

impl<F> RelaxDecider for F
where
    F: FnMut(usize, &[PlayerId]) -> bool,
{
    fn confirm_relax(&mut self, court: usize, candidates: &[PlayerId]) -> bool {
        self(court, candidates)
    }
}

/// Always gives the same answer (the web adapter passes the operator's choice).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedAnswer(pub bool);

impl RelaxDecider for FixedAnswer {
    fn confirm_relax(&mut self, _court: usize, _candidates: &[PlayerId]) -> bool {
        self.0
    }
}
