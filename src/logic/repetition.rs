//! Repetition Guard: notices when the same few non-finished names keep cycling.

use crate::models::{PlayerId, RepetitionConfig};
use log::{debug, info};
use std::collections::VecDeque;

#[derive(Clone, Debug, Default)]
pub struct RepetitionGuard {
    /// Most recent first, each sorted.
    recent: VecDeque<Vec<PlayerId>>,
    cycle_count: u32,
}

impl RepetitionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record this pass's non-finished waiting names. Returns whether a
    /// desync is wanted.
    ///
    /// Groups that are empty or larger than `max_group_size` reset the guard.
    /// A group matching one of the remembered snapshots bumps the counter; a
    /// new group is remembered and resets the counter only once it has
    /// exceeded `reset_above`, so alternating between two groups still counts.
    pub fn observe(&mut self, names: &[PlayerId], config: &RepetitionConfig) -> bool {
        if names.is_empty() || names.len() > config.max_group_size {
            if self.cycle_count > 0 || !self.recent.is_empty() {
                debug!("Waiting group of {} clears the repetition history", names.len());
            }
            self.recent.clear();
            self.cycle_count = 0;
            return false;
        }

        let mut group = names.to_vec();
        group.sort();

        if self.recent.contains(&group) {
            self.cycle_count += 1;
            debug!("Waiting group {:?} repeated ({} times)", group, self.cycle_count);
        } else {
            if self.cycle_count > config.reset_above {
                self.cycle_count = 0;
            }
            self.recent.push_front(group);
            self.recent.truncate(config.history_len);
        }

        let stuck = self.is_stuck(config);
        if stuck {
            info!("Waiting pool is cycling; requesting a desync selection");
        }
        stuck
    }

    pub fn is_stuck(&self, config: &RepetitionConfig) -> bool {
        self.cycle_count >= config.desync_at
    }

    /// A desync selection was used: start counting again.
    pub fn acknowledge_desync(&mut self) {
        self.cycle_count = 0;
    }

    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    pub fn recent_groups(&self) -> impl Iterator<Item = &Vec<PlayerId>> {
        self.recent.iter()
    }
}
