//! Court, the match currently on it, and the three 2v2 team splits.

use crate::models::player::PlayerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which team of a doubles match.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    #[default]
    A,
    B,
}

impl Side {
    /// Slot indices of this side in a court's 4-player order.
    pub fn slots(self) -> [usize; 2] {
        match self {
            Side::A => [0, 1],
            Side::B => [2, 3],
        }
    }
}

/// One of the three ways to split 4 labelled players into two teams of 2,
/// named after who partners the first player.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSplit {
    /// 01 | 23
    FirstWithSecond,
    /// 02 | 13
    FirstWithThird,
    /// 03 | 12
    FirstWithFourth,
}

impl TeamSplit {
    pub const ALL: [TeamSplit; 3] = [
        TeamSplit::FirstWithSecond,
        TeamSplit::FirstWithThird,
        TeamSplit::FirstWithFourth,
    ];

    /// Candidate indices of team A and team B.
    pub fn indices(self) -> ([usize; 2], [usize; 2]) {
        match self {
            TeamSplit::FirstWithSecond => ([0, 1], [2, 3]),
            TeamSplit::FirstWithThird => ([0, 2], [1, 3]),
            TeamSplit::FirstWithFourth => ([0, 3], [1, 2]),
        }
    }

    /// Reorder 4 candidates into court order (team A first, team B last).
    pub fn arrange<T: Clone>(self, four: &[T; 4]) -> [T; 4] {
        let ([a0, a1], [b0, b1]) = self.indices();
        [
            four[a0].clone(),
            four[a1].clone(),
            four[b0].clone(),
            four[b1].clone(),
        ]
    }
}

/// A match in progress: 4 players in court order and its start time.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CourtMatch {
    /// First 2 are team A, last 2 are team B.
    pub players: [PlayerId; 4],
    pub start_time: DateTime<Utc>,
    /// Formed after the operator relaxed the balance rule.
    pub relaxed: bool,
}

impl CourtMatch {
    pub fn new(players: [PlayerId; 4], start_time: DateTime<Utc>, relaxed: bool) -> Self {
        Self {
            players,
            start_time,
            relaxed,
        }
    }

    pub fn team(&self, side: Side) -> &[PlayerId] {
        match side {
            Side::A => &self.players[..2],
            Side::B => &self.players[2..],
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.players.iter().any(|p| p == id)
    }

    pub fn slot_of(&self, id: &str) -> Option<usize> {
        self.players.iter().position(|p| p == id)
    }
}

/// A playing court: either empty or holding exactly one 4-player match.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Court {
    /// Zero-based court index.
    pub index: usize,
    /// None while the court is free.
    pub current: Option<CourtMatch>,
}

impl Court {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            current: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// Players on court in court order (empty slice when free).
    pub fn players(&self) -> &[PlayerId] {
        match &self.current {
            Some(m) => &m.players,
            None => &[],
        }
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.current.as_ref().map(|m| m.start_time)
    }
}
