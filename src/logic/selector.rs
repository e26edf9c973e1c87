//! Eligible-set selector: picks the 4 waiting players to try on the next court.

use crate::models::{EngineConfig, Player, PlayerId, UrgencyMode};
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Which rule produced a selection.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRule {
    /// Players with enough waiting turns were forced in.
    Urgent,
    /// Nobody non-finished was waiting; 4 random just-finished players.
    AllJustFinished,
    /// Too few non-finished waiters; just-finished players filled the gap.
    Borrowed,
    /// 4 or 5 non-finished waiters; fewest matches played won.
    FewestMatches,
    /// Large pool: `reserved` slots kept for the longest waiters.
    ScaledOverride { reserved: usize },
    /// Large pool: just-finished players go first.
    JustFinishedFirst,
    /// Large pool: longest waiters go first.
    LongestWaiting,
    /// Repetition Guard asked to mix in just-finished players.
    Desync,
    /// The selected 4 could not be balanced; another waiting group could.
    WidenedSearch,
    /// Seated by the operator.
    Manual,
}

/// Exactly 4 distinct waiting players, in selection order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Selection {
    pub players: Vec<PlayerId>,
    pub rule: SelectionRule,
}

impl Selection {
    fn from_players(players: &[&Player], rule: SelectionRule) -> Self {
        Self {
            players: players.iter().take(4).map(|p| p.id.clone()).collect(),
            rule,
        }
    }
}

/// Sort by `key`, breaking ties uniformly at random (shuffle, then stable sort).
pub fn rank_by<'a, K, F, R>(players: &[&'a Player], key: F, rng: &mut R) -> Vec<&'a Player>
where
    K: Ord,
    F: Fn(&Player) -> K,
    R: Rng + ?Sized,
{
    let mut ranked = players.to_vec();
    ranked.shuffle(rng);
    ranked.sort_by_key(|p| key(p));
    ranked
}

fn is_urgent(p: &Player, config: &EngineConfig) -> bool {
    p.waiting_turns >= config.urgent_waiting_turns
}

/// Number of slots the scaled override keeps for `urgent` long waiters.
pub fn reserved_slots(urgent: usize) -> usize {
    match urgent {
        0 => 0,
        1 => 1,
        2..=5 => 2,
        _ => 3,
    }
}

/// Choose 4 candidates from the Waiting pool, or `None` with fewer than 4 waiting.
///
/// 1. Absolute urgency: anyone with `urgent_waiting_turns` or more is in.
/// 2. Otherwise split into just-finished and non-finished (`k` of them) and
///    branch on `k`: borrow just-finished players when `k < 4`, prefer fewest
///    matches at 4 or 5, and for 6+ let just-finished players go first unless
///    the scaled override reserves slots for long waiters.
pub fn select_candidates<R: Rng + ?Sized>(
    waiting: &[&Player],
    config: &EngineConfig,
    rng: &mut R,
) -> Option<Selection> {
    if waiting.len() < 4 {
        return None;
    }

    if config.urgency == UrgencyMode::Absolute {
        let (urgent, others): (Vec<&Player>, Vec<&Player>) =
            waiting.iter().partition(|p| is_urgent(p, config));
        if !urgent.is_empty() {
            let mut picked = rank_by(&urgent, |p| Reverse(p.waiting_turns), rng);
            picked.truncate(4);
            if picked.len() < 4 {
                let fill = rank_by(&others, |p| Reverse(p.waiting_turns), rng);
                picked.extend(fill.into_iter().take(4 - picked.len()));
            }
            debug!("Selected {} urgent waiter(s)", urgent.len().min(4));
            return Some(Selection::from_players(&picked, SelectionRule::Urgent));
        }
    }

    let (mut finished, fresh): (Vec<&Player>, Vec<&Player>) =
        waiting.iter().partition(|p| p.is_just_finished());
    finished.shuffle(rng);
    let k = fresh.len();

    let selection = match k {
        0 => Selection::from_players(&finished, SelectionRule::AllJustFinished),
        1..=3 => {
            let mut picked = fresh;
            picked.extend(finished.iter().take(4 - k));
            Selection::from_players(&picked, SelectionRule::Borrowed)
        }
        4 | 5 => {
            let ranked = rank_by(&fresh, |p| p.matches_played, rng);
            let mut picked: Vec<&Player> = if finished.is_empty() {
                ranked.into_iter().take(4).collect()
            } else {
                ranked.into_iter().take(3).collect()
            };
            picked.extend(finished.iter().take(4 - picked.len()));
            Selection::from_players(&picked, SelectionRule::FewestMatches)
        }
        _ => select_large_pool(fresh, finished, config, rng),
    };
    debug!("Selected {:?} by {:?}", selection.players, selection.rule);
    Some(selection)
}

/// Six or more non-finished waiters.
fn select_large_pool<R: Rng + ?Sized>(
    fresh: Vec<&Player>,
    finished: Vec<&Player>,
    config: &EngineConfig,
    rng: &mut R,
) -> Selection {
    let ranked = rank_by(&fresh, |p| Reverse(p.waiting_turns), rng);

    if config.urgency == UrgencyMode::Scaled && fresh.len() >= config.scaled_override_min_pool {
        let urgent = fresh.iter().filter(|p| is_urgent(p, config)).count();
        let reserved = reserved_slots(urgent);
        if reserved > 0 {
            let mut picked: Vec<&Player> = ranked[..reserved].to_vec();
            let mut rest: Vec<&Player> = ranked[reserved..].to_vec();
            rest.shuffle(rng);
            picked.extend(rest.into_iter().take(4 - reserved));
            return Selection::from_players(&picked, SelectionRule::ScaledOverride { reserved });
        }
    }

    if config.just_finished_first && !finished.is_empty() {
        let mut picked: Vec<&Player> = finished.into_iter().take(4).collect();
        let need = 4 - picked.len();
        picked.extend(ranked.into_iter().take(need));
        Selection::from_players(&picked, SelectionRule::JustFinishedFirst)
    } else {
        Selection::from_players(&ranked, SelectionRule::LongestWaiting)
    }
}

/// Desynchronizing selection used when the Repetition Guard reports a cycle:
/// urgent waiters, then the longest non-finished waiters up to 2, then random
/// just-finished players, then whoever is left. `None` when there is no
/// just-finished player to mix in or fewer than 4 waiting.
pub fn select_desync<R: Rng + ?Sized>(
    waiting: &[&Player],
    config: &EngineConfig,
    rng: &mut R,
) -> Option<Selection> {
    if waiting.len() < 4 {
        return None;
    }
    let (mut finished, fresh): (Vec<&Player>, Vec<&Player>) =
        waiting.iter().partition(|p| p.is_just_finished());
    if finished.is_empty() {
        return None;
    }
    finished.shuffle(rng);

    let ranked = rank_by(&fresh, |p| Reverse(p.waiting_turns), rng);
    let urgent = ranked.iter().filter(|p| is_urgent(p, config)).count();
    let lead = urgent.max(2).min(4).min(ranked.len());

    let mut picked: Vec<&Player> = ranked[..lead].to_vec();
    let room = 4 - picked.len();
    picked.extend(finished.iter().take(room));
    let room = 4 - picked.len();
    picked.extend(ranked[lead..].iter().take(room));

    debug!("Desync selection {:?}", picked.iter().map(|p| &p.id).collect::<Vec<_>>());
    Some(Selection::from_players(&picked, SelectionRule::Desync))
}
