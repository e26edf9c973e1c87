//! Rotation orchestrator: fills every empty court, then advances waiting states once.

use crate::events::{MatchFormed, RelaxDecider};
use super::selector::SelectionRule;
use super::{balancer, selector, waiting};
use crate::models::{BalancePolicy, MatchRecord, Player, PlayerId, RotationError};
use crate::session::RotationSession;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

/// What happened on one empty court during a pass.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CourtOutcome {
    Formed(MatchFormed),
    /// No balanced split and the operator did not relax; the court stays empty.
    Declined { court: usize, candidates: Vec<PlayerId> },
    /// Fewer than 4 players waiting.
    NotEnoughPlayers { court: usize, waiting: usize },
    /// 4 players could not be assembled or committed; nothing changed.
    Failed { court: usize, reason: String },
}

impl CourtOutcome {
    pub fn court(&self) -> usize {
        match self {
            CourtOutcome::Formed(m) => m.court,
            CourtOutcome::Declined { court, .. }
            | CourtOutcome::NotEnoughPlayers { court, .. }
            | CourtOutcome::Failed { court, .. } => *court,
        }
    }
}

/// Summary of one rotation pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PassReport {
    /// One entry per court that was empty at the start of the pass.
    pub outcomes: Vec<CourtOutcome>,
    pub desync_applied: bool,
    /// Inconsistencies repaired before the pass started.
    pub repairs: usize,
    /// Waiting players advanced at the end of the pass.
    pub advanced: usize,
}

impl PassReport {
    pub fn formed(&self) -> impl Iterator<Item = &MatchFormed> {
        self.outcomes.iter().filter_map(|o| match o {
            CourtOutcome::Formed(m) => Some(m),
            _ => None,
        })
    }

    pub fn formed_count(&self) -> usize {
        self.formed().count()
    }
}

/// Per-pass state shared across courts.
struct PassState {
    desync_wanted: bool,
    /// Cleared once the operator declines to relax.
    may_prompt: bool,
}

/// Run one rotation pass at the current time.
pub fn fill_courts<D: RelaxDecider + ?Sized>(session: &mut RotationSession, decider: &mut D) -> PassReport {
    fill_courts_at(session, decider, Utc::now())
}

/// Run one rotation pass: repair, observe repetition, try every empty court
/// in order, then advance everyone left in Waiting exactly once.
pub fn fill_courts_at<D: RelaxDecider + ?Sized>(
    session: &mut RotationSession,
    decider: &mut D,
    now: DateTime<Utc>,
) -> PassReport {
    let mut report = PassReport {
        repairs: session.pool.repair_partition() + waiting::repair_waiting_states(&mut session.pool),
        ..PassReport::default()
    };

    let names: Vec<PlayerId> = session
        .pool
        .waiting_players()
        .iter()
        .filter(|p| !p.is_just_finished())
        .map(|p| p.id.clone())
        .collect();
    let mut state = PassState {
        desync_wanted: session.guard.observe(&names, &session.config.repetition),
        may_prompt: true,
    };

    for court in session.pool.empty_courts() {
        let outcome = fill_court(session, court, decider, now, &mut state, &mut report);
        report.outcomes.push(outcome);
    }

    report.advanced = waiting::advance_waiting_states(&mut session.pool);
    session.notify_pool_changed();
    debug!(
        "Pass done: {} formed, {} advanced",
        report.formed_count(),
        report.advanced
    );
    report
}

fn fill_court<D: RelaxDecider + ?Sized>(
    session: &mut RotationSession,
    court: usize,
    decider: &mut D,
    now: DateTime<Utc>,
    state: &mut PassState,
    report: &mut PassReport,
) -> CourtOutcome {
    let waiting_players = session.pool.waiting_players();
    let waiting_count = waiting_players.len();

    let mut selection = None;
    if state.desync_wanted {
        selection = selector::select_desync(&waiting_players, &session.config, &mut session.rng);
        if selection.is_some() {
            session.guard.acknowledge_desync();
            state.desync_wanted = false;
            report.desync_applied = true;
        }
    }
    let selection = selection
        .or_else(|| selector::select_candidates(&waiting_players, &session.config, &mut session.rng));
    let Some(selection) = selection else {
        return CourtOutcome::NotEnoughPlayers {
            court,
            waiting: waiting_count,
        };
    };

    let candidates = match session.pool.players_by_ids(&selection.players) {
        Ok(c) => c,
        Err(e) => {
            warn!("Court {}: {}", court + 1, e);
            return CourtOutcome::Failed {
                court,
                reason: e.to_string(),
            };
        }
    };
    let Ok(four) = <[&Player; 4]>::try_from(candidates.as_slice()) else {
        warn!("Court {}: selection did not yield 4 players", court + 1);
        return CourtOutcome::Failed {
            court,
            reason: "cannot form a match of 4 players".to_string(),
        };
    };

    let pairings = session.config.avoid_repeat_pairs.then_some(&session.pairings);
    let mut rule = selection.rule;
    let mut balanced = balancer::balance(four, &session.config.policy, pairings, &mut session.rng);
    if balanced.is_none() && session.config.widen_search {
        balanced = balancer::search_pool(&waiting_players, &session.config, pairings, &mut session.rng);
        if balanced.is_some() {
            rule = SelectionRule::WidenedSearch;
        }
    }

    let balanced = match balanced {
        Some(b) => b,
        None if !state.may_prompt => {
            return CourtOutcome::Declined {
                court,
                candidates: selection.players,
            }
        }
        None => {
            if !decider.confirm_relax(court, &selection.players) {
                info!("Court {}: relax declined, leaving it empty", court + 1);
                state.may_prompt = false;
                return CourtOutcome::Declined {
                    court,
                    candidates: selection.players,
                };
            }
            match balancer::balance_relaxed(four, &mut session.rng) {
                Some(b) => b,
                None => {
                    return CourtOutcome::Failed {
                        court,
                        reason: "cannot form a match of 4 players".to_string(),
                    }
                }
            }
        }
    };

    let level_diff = match session.config.policy {
        BalancePolicy::NumericLevel { .. } => Some(balanced.level_diff),
        BalancePolicy::Tier => None,
    };
    if let Err(e) = session
        .pool
        .commit_match(court, balanced.players.clone(), now, balanced.relaxed)
    {
        warn!("Court {}: commit failed: {}", court + 1, e);
        return CourtOutcome::Failed {
            court,
            reason: e.to_string(),
        };
    }

    let event = MatchFormed {
        court,
        players: balanced.players,
        split: balanced.split,
        rule,
        relaxed: balanced.relaxed,
        level_diff,
    };
    info!(
        "Court {}: {:?} ({:?}{})",
        court + 1,
        event.players,
        event.rule,
        if event.relaxed { ", relaxed" } else { "" }
    );
    session.notify_match_formed(&event);
    session.notify_pool_changed();
    CourtOutcome::Formed(event)
}

/// Operator signals the match on `court` is over. The freed court stays
/// empty until the next [`fill_courts`]; callers that want the court re-filled
/// right away run a pass straight after.
pub fn finish_match(session: &mut RotationSession, court: usize) -> Result<MatchRecord, RotationError> {
    finish_match_at(session, court, Utc::now())
}

/// End a match: players go back to Waiting as just finished, teammates are
/// recorded in the pairing table and the match joins the history.
pub fn finish_match_at(
    session: &mut RotationSession,
    court: usize,
    now: DateTime<Utc>,
) -> Result<MatchRecord, RotationError> {
    let finished = session.pool.clear_court(court, now)?;
    session.pairings.record_match(&finished.players);
    let record = MatchRecord::from_finished(session.history.len() + 1, court, finished, now);
    info!(
        "Court {} finished after {}s: {:?}",
        court + 1,
        record.duration_seconds(),
        record.players
    );
    session.history.push(record.clone());
    session.notify_pool_changed();
    Ok(record)
}
