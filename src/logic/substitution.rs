//! On-court substitution: swap a leaving player for the best waiting replacement.

use super::selector::rank_by;
use crate::models::{Player, PlayerId, RotationError};
use crate::session::RotationSession;
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::cmp::Reverse;

/// Candidates for replacing `outgoing`: same tier if anyone waits,
/// else an adjacent tier, else everyone waiting.
fn replacement_pool<'a>(waiting: &[&'a Player], outgoing: &Player) -> Vec<&'a Player> {
    let same: Vec<&Player> = waiting
        .iter()
        .copied()
        .filter(|p| p.tier == outgoing.tier)
        .collect();
    if !same.is_empty() {
        return same;
    }
    let adjacent: Vec<&Player> = waiting
        .iter()
        .copied()
        .filter(|p| p.tier.is_adjacent(outgoing.tier))
        .collect();
    if !adjacent.is_empty() {
        return adjacent;
    }
    waiting.to_vec()
}

pub fn substitute(session: &mut RotationSession, court: usize, outgoing: &str) -> Result<PlayerId, RotationError> {
    substitute_at(session, court, outgoing, Utc::now())
}

/// Replace `outgoing` on `court` with a waiting player. The outgoing player is
/// credited with the match and moves to Resting; the replacement takes the same
/// slot. Fails without changes when nobody is waiting.
pub fn substitute_at(
    session: &mut RotationSession,
    court: usize,
    outgoing: &str,
    now: DateTime<Utc>,
) -> Result<PlayerId, RotationError> {
    let current = session
        .pool
        .court(court)
        .ok_or(RotationError::CourtNotFound(court))?
        .current
        .as_ref()
        .ok_or(RotationError::CourtEmpty(court))?;
    if !current.contains(outgoing) {
        return Err(RotationError::NotOnCourt {
            court,
            player: outgoing.to_string(),
        });
    }
    let leaving = session
        .pool
        .player(outgoing)
        .ok_or_else(|| RotationError::PlayerNotFound(outgoing.to_string()))?;

    let waiting = session.pool.waiting_players();
    let candidates = replacement_pool(&waiting, leaving);
    let ranked = rank_by(
        &candidates,
        |p| (p.matches_played, Reverse(p.waiting_turns)),
        &mut session.rng,
    );
    let Some(incoming) = ranked.first().map(|p| p.id.clone()) else {
        warn!("No one waiting to replace {} on court {}", outgoing, court + 1);
        return Err(RotationError::NoSubstituteAvailable(court));
    };

    session.pool.substitute_player(court, outgoing, &incoming, now)?;
    info!("Court {}: {} replaced by {}", court + 1, outgoing, incoming);
    session.notify_pool_changed();
    Ok(incoming)
}
