//! Data structures for court rotation: players, courts, match history, pools.

mod config;
mod court;
mod history;
mod player;
mod pool;

pub use config::{BalancePolicy, ConfigError, EngineConfig, RepetitionConfig, UrgencyMode};
pub use court::{Court, CourtMatch, Side, TeamSplit};
pub use history::{MatchId, MatchRecord, PairCount, PairingHistory};
pub use player::{LifecycleTag, Player, PlayerId, PlayerStats, Tier};
pub use pool::{Location, PoolManager, PoolSnapshot, RotationError};
