//! Waiting-state machine: advances every waiting player's (tag, turns) once per pass.

use crate::models::{LifecycleTag, PoolManager};
use log::{debug, warn};

/// State after one pass spent in Waiting without being selected.
///
/// - `JustJoined` clears to a fresh waiter with 0 turns.
/// - `JustFinished` clears and starts counting at 1.
/// - A genuine waiter gains one turn.
pub fn next_state(tag: LifecycleTag, waiting_turns: u32) -> (LifecycleTag, u32) {
    match tag {
        LifecycleTag::JustJoined => (LifecycleTag::None, 0),
        LifecycleTag::JustFinished => (LifecycleTag::None, 1),
        LifecycleTag::None => (LifecycleTag::None, waiting_turns.saturating_add(1)),
    }
}

/// Apply [`next_state`] to everyone still in Waiting. Returns how many players advanced.
pub fn advance_waiting_states(pool: &mut PoolManager) -> usize {
    let mut advanced = 0;
    for p in pool.waiting_players_mut() {
        let (tag, turns) = next_state(p.tag, p.waiting_turns);
        debug!(
            "{}: {:?}/{} -> {:?}/{}",
            p.id, p.tag, p.waiting_turns, tag, turns
        );
        p.tag = tag;
        p.waiting_turns = turns;
        advanced += 1;
    }
    advanced
}

/// A tagged waiter must have zero turns. Clear the tag of any that do not,
/// keeping the turns they already accrued. Returns the number of repairs.
pub fn repair_waiting_states(pool: &mut PoolManager) -> usize {
    let mut repaired = 0;
    for p in pool.waiting_players_mut() {
        if p.tag != LifecycleTag::None && p.waiting_turns > 0 {
            warn!(
                "{} was tagged {:?} with {} waiting turns; clearing tag",
                p.id, p.tag, p.waiting_turns
            );
            p.tag = LifecycleTag::None;
            repaired += 1;
        }
    }
    repaired
}
