//! Rotation logic: waiting states, selection, balancing, repetition, orchestration.

mod balancer;
mod repetition;
mod roster;
mod rotation;
mod selector;
mod substitution;
mod waiting;

pub use balancer::{
    balance, balance_relaxed, is_allowed_tier_pattern, level_difference, search_pool,
    tier_pattern, waiting_pressure, BalancedMatch, ALLOWED_TIER_PATTERNS,
};
pub use repetition::RepetitionGuard;
pub use roster::{
    is_present, parse_batch_line, parse_batch_text, parse_roster_csv, write_history_csv,
    RosterEntry, RosterError, RosterReport, SkippedRow, PRESENT_VALUES,
};
pub use rotation::{fill_courts, fill_courts_at, finish_match, finish_match_at, CourtOutcome, PassReport};
pub use selector::{rank_by, reserved_slots, select_candidates, select_desync, Selection, SelectionRule};
pub use substitution::{substitute, substitute_at};
pub use waiting::{advance_waiting_states, next_state, repair_waiting_states};
