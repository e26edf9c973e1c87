//! Player, PlayerStats, skill tier and waiting lifecycle tag.

use serde::{Deserialize, Serialize};

/// Unique identifier for a player: the display name (unique in the registry).
pub type PlayerId = String;

/// Coarse skill bucket used by the tier balance policy.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum Tier {
    A,
    #[default]
    B,
    C,
}

impl Tier {
    /// Parse a tier letter (case-insensitive, surrounding whitespace ignored).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Tier::A),
            "B" => Some(Tier::B),
            "C" => Some(Tier::C),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Tier::A => 'A',
            Tier::B => 'B',
            Tier::C => 'C',
        }
    }

    /// Strength weight used to compare two teams of the same pattern (A strongest).
    pub fn weight(self) -> u32 {
        match self {
            Tier::A => 3,
            Tier::B => 2,
            Tier::C => 1,
        }
    }

    /// A and C are not neighbours; every other distinct pair is.
    pub fn is_adjacent(self, other: Tier) -> bool {
        matches!(
            (self, other),
            (Tier::A, Tier::B) | (Tier::B, Tier::A) | (Tier::B, Tier::C) | (Tier::C, Tier::B)
        )
    }
}

/// Where a waiting player is in its lifecycle. Only meaningful in the Waiting pool.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleTag {
    /// A genuine waiter: `waiting_turns` counts the passes spent unselected.
    #[default]
    None,
    /// Promoted into Waiting and not yet through a rotation pass.
    JustJoined,
    /// Came off a court and not yet through a rotation pass.
    JustFinished,
}

/// Statistics view of a player (for API / display).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub matches_played: u32,
    pub waiting_turns: u32,
    pub tag: LifecycleTag,
    /// None until the player has finished at least one match.
    pub average_match_seconds: Option<i64>,
}

impl PlayerStats {
    pub fn from_player(p: &Player) -> Self {
        let average_match_seconds = if p.match_seconds.is_empty() {
            None
        } else {
            let total: i64 = p.match_seconds.iter().sum();
            Some((total as f64 / p.match_seconds.len() as f64).round() as i64)
        };
        Self {
            matches_played: p.matches_played,
            waiting_turns: p.waiting_turns,
            tag: p.tag,
            average_match_seconds,
        }
    }
}

/// A registered player and their cumulative statistics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    /// Numeric rating used by the numeric-level balance policy.
    pub level: f64,
    pub tier: Tier,
    pub matches_played: u32,
    pub waiting_turns: u32,
    pub tag: LifecycleTag,
    /// Seconds spent on court, one entry per finished match.
    #[serde(default)]
    pub match_seconds: Vec<i64>,
}

impl Player {
    /// Create a new player with the given name, level and tier. Counters start at zero.
    pub fn new(name: impl Into<String>, level: f64, tier: Tier) -> Self {
        Self {
            id: name.into(),
            level,
            tier,
            matches_played: 0,
            waiting_turns: 0,
            tag: LifecycleTag::None,
            match_seconds: Vec::new(),
        }
    }

    /// Current stats as a separate struct (for API responses).
    pub fn stats(&self) -> PlayerStats {
        PlayerStats::from_player(self)
    }

    pub fn is_just_finished(&self) -> bool {
        self.tag == LifecycleTag::JustFinished
    }

    /// Enter the Waiting pool fresh: tag and zero turns.
    pub fn enter_waiting(&mut self, tag: LifecycleTag) {
        self.tag = tag;
        self.waiting_turns = 0;
    }

    /// Leave the Waiting pool for a court.
    pub fn take_court(&mut self) {
        self.tag = LifecycleTag::None;
        self.waiting_turns = 0;
    }

    /// Record one finished match and the time spent on court.
    pub fn record_match(&mut self, seconds: i64) {
        self.matches_played += 1;
        self.match_seconds.push(seconds.max(0));
    }
}
