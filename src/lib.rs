//! Court rotation: library with models, rotation logic and session state.

pub mod events;
pub mod logic;
pub mod models;
pub mod session;

pub use events::{FixedAnswer, LogListener, MatchFormed, RelaxDecider, RotationListener};
pub use logic::{
    fill_courts, fill_courts_at, finish_match, finish_match_at, substitute, substitute_at,
    CourtOutcome, PassReport, RepetitionGuard, RosterEntry, RosterError, RosterReport,
};
pub use models::{
    BalancePolicy, ConfigError, Court, CourtMatch, EngineConfig, LifecycleTag, Location, MatchId,
    MatchRecord, PairCount, PairingHistory, Player, PlayerId, PlayerStats, PoolManager,
    PoolSnapshot, RepetitionConfig, RotationError, Side, TeamSplit, Tier, UrgencyMode,
};
pub use session::{RotationSession, SessionId};
