//! Team balancer: splits 4 candidates into two teams of 2 under a balance policy.

use crate::models::{BalancePolicy, EngineConfig, PairingHistory, Player, PlayerId, TeamSplit};
use itertools::Itertools;
use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::cmp::Ordering;

/// Tier multisets (sorted letters) accepted by the tier policy.
pub const ALLOWED_TIER_PATTERNS: [&str; 6] = ["AAAA", "BBBB", "CCCC", "AABB", "AACC", "BBCC"];

/// Extra set rank per just-finished player in a widened search.
const JUST_FINISHED_PENALTY: f64 = 20.0;

/// Weight of waiting pressure against level difference in the numeric score.
const PRESSURE_SCALE: f64 = 100.0;

const EPSILON: f64 = 1e-9;

/// The chosen split of 4 players, in court order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BalancedMatch {
    /// Team A then team B.
    pub players: [PlayerId; 4],
    pub split: TeamSplit,
    /// Absolute difference of the teams' level sums.
    pub level_diff: f64,
    /// Policy score of the split (lower is better).
    pub score: f64,
    /// Tier weight gap between the teams (tier policy only).
    pub tier_gap: u32,
    /// Previous teammate pairings repeated by this split.
    pub repeats: u32,
    pub relaxed: bool,
}

/// `-Σ waitingTurns²`: the longer the group has waited, the lower (better).
pub fn waiting_pressure(players: &[&Player]) -> f64 {
    -players
        .iter()
        .map(|p| f64::from(p.waiting_turns).powi(2))
        .sum::<f64>()
}

/// |sum(team A levels) - sum(team B levels)| for a court-ordered group.
pub fn level_difference(arranged: &[&Player; 4]) -> f64 {
    ((arranged[0].level + arranged[1].level) - (arranged[2].level + arranged[3].level)).abs()
}

/// Sorted tier letters of a group, e.g. "AABB".
pub fn tier_pattern(players: &[&Player]) -> String {
    players.iter().map(|p| p.tier.letter()).sorted().collect()
}

pub fn is_allowed_tier_pattern(pattern: &str) -> bool {
    ALLOWED_TIER_PATTERNS.contains(&pattern)
}

fn tier_gap(arranged: &[&Player; 4]) -> u32 {
    let a = arranged[0].tier.weight() + arranged[1].tier.weight();
    let b = arranged[2].tier.weight() + arranged[3].tier.weight();
    a.abs_diff(b)
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    if (a - b).abs() <= EPSILON {
        Ordering::Equal
    } else {
        a.total_cmp(&b)
    }
}

fn cmp_matches(a: &BalancedMatch, b: &BalancedMatch) -> Ordering {
    cmp_f64(a.score, b.score)
        .then(a.tier_gap.cmp(&b.tier_gap))
        .then(a.repeats.cmp(&b.repeats))
}

fn evaluate(
    four: &[&Player; 4],
    split: TeamSplit,
    policy: Option<&BalancePolicy>,
    pairings: Option<&PairingHistory>,
) -> Option<BalancedMatch> {
    let arranged = split.arrange(four);
    let pressure = waiting_pressure(&arranged);
    let level_diff = level_difference(&arranged);
    let players = arranged.map(|p| p.id.clone());
    let repeats = pairings.map_or(0, |h| h.repeats(&players));

    let (score, gap) = match policy {
        Some(BalancePolicy::NumericLevel { max_level_diff }) => {
            if level_diff > max_level_diff + EPSILON {
                return None;
            }
            (pressure * PRESSURE_SCALE + level_diff, 0)
        }
        Some(BalancePolicy::Tier) => {
            if !is_allowed_tier_pattern(&tier_pattern(&arranged)) {
                return None;
            }
            (pressure, tier_gap(&arranged))
        }
        None => (pressure, 0),
    };

    Some(BalancedMatch {
        players,
        split,
        level_diff,
        score,
        tier_gap: gap,
        repeats: if policy.is_some() { repeats } else { 0 },
        relaxed: policy.is_none(),
    })
}

fn pick_best<R: Rng + ?Sized>(
    four: [&Player; 4],
    policy: Option<&BalancePolicy>,
    pairings: Option<&PairingHistory>,
    rng: &mut R,
) -> Option<BalancedMatch> {
    let mut feasible: Vec<BalancedMatch> = TeamSplit::ALL
        .iter()
        .filter_map(|&split| evaluate(&four, split, policy, pairings))
        .collect();
    feasible.shuffle(rng);
    feasible.into_iter().min_by(cmp_matches)
}

/// Best feasible split of 4 candidates under `policy`, or `None` when no split
/// satisfies it. `pairings` (when given) breaks ties toward fresh partnerships.
pub fn balance<R: Rng + ?Sized>(
    four: [&Player; 4],
    policy: &BalancePolicy,
    pairings: Option<&PairingHistory>,
    rng: &mut R,
) -> Option<BalancedMatch> {
    pick_best(four, Some(policy), pairings, rng)
}

/// Split ignoring the balance predicate: waiting pressure only, ties random.
pub fn balance_relaxed<R: Rng + ?Sized>(four: [&Player; 4], rng: &mut R) -> Option<BalancedMatch> {
    pick_best(four, None, None, rng)
}

/// Widened search over every 4-player group of the Waiting pool that contains
/// all urgent waiters. Groups are ranked by waiting pressure plus a penalty
/// per just-finished member, then by the best split's score.
pub fn search_pool<R: Rng + ?Sized>(
    waiting: &[&Player],
    config: &EngineConfig,
    pairings: Option<&PairingHistory>,
    rng: &mut R,
) -> Option<BalancedMatch> {
    let (urgent, others): (Vec<&Player>, Vec<&Player>) = waiting
        .iter()
        .copied()
        .partition(|p| p.waiting_turns >= config.urgent_waiting_turns);

    let groups: Vec<Vec<&Player>> = if urgent.len() >= 4 {
        urgent.iter().copied().combinations(4).collect()
    } else {
        others
            .iter()
            .copied()
            .combinations(4 - urgent.len())
            .map(|rest| urgent.iter().copied().chain(rest).collect())
            .collect()
    };
    debug!("Widened search over {} groups", groups.len());

    let mut best: Option<(f64, BalancedMatch)> = None;
    let mut order: Vec<usize> = (0..groups.len()).collect();
    order.shuffle(rng);
    for i in order {
        let Ok(four) = <[&Player; 4]>::try_from(groups[i].as_slice()) else {
            continue;
        };
        let Some(candidate) = balance(four, &config.policy, pairings, rng) else {
            continue;
        };
        let finished = four.iter().filter(|p| p.is_just_finished()).count() as f64;
        let rank = waiting_pressure(&four) + JUST_FINISHED_PENALTY * finished;
        let better = match &best {
            None => true,
            Some((best_rank, current)) => cmp_f64(rank, *best_rank)
                .then_with(|| cmp_matches(&candidate, current))
                == Ordering::Less,
        };
        if better {
            best = Some((rank, candidate));
        }
    }
    best.map(|(_, m)| m)
}
