//! RotationSession: one club night. Owns the pool, history, guard, rng and listeners.

use crate::events::{MatchFormed, RotationListener};
use crate::logic::{
    parse_batch_text, parse_roster_csv, write_history_csv, RepetitionGuard, RosterEntry,
    RosterError, RosterReport, SelectionRule, SkippedRow,
};
use crate::models::{
    Court, EngineConfig, Location, MatchRecord, PairingHistory, Player, PlayerId, PoolManager,
    PoolSnapshot, RotationError, TeamSplit, Tier,
};
use chrono::Utc;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Write;
use uuid::Uuid;

/// Unique identifier for a session.
pub type SessionId = Uuid;

/// Listener boxed for storage in a session shared across threads.
pub type BoxedListener = Box<dyn RotationListener + Send + Sync>;

pub struct RotationSession {
    pub id: SessionId,
    pub config: EngineConfig,
    pub(crate) pool: PoolManager,
    pub(crate) history: Vec<MatchRecord>,
    pub(crate) pairings: PairingHistory,
    pub(crate) guard: RepetitionGuard,
    pub(crate) rng: StdRng,
    listeners: Vec<BoxedListener>,
}

impl std::fmt::Debug for RotationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationSession")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("pool", &self.pool)
            .field("history", &self.history.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl RotationSession {
    /// New empty session. Random tie-breaks follow `config.seed` when set.
    pub fn new(config: EngineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }

    pub fn with_rng(config: EngineConfig, rng: StdRng) -> Self {
        Self {
            id: Uuid::new_v4(),
            pool: PoolManager::new(config.court_count),
            config,
            history: Vec::new(),
            pairings: PairingHistory::new(),
            guard: RepetitionGuard::new(),
            rng,
            listeners: Vec::new(),
        }
    }

    /// Resume from an existing pool. Its courts replace `config.court_count`.
    pub fn with_pool(config: EngineConfig, pool: PoolManager) -> Self {
        let mut session = Self::new(config);
        session.pool = pool;
        session
    }

    pub fn add_listener(&mut self, listener: BoxedListener) {
        self.listeners.push(listener);
    }

    pub fn pool(&self) -> &PoolManager {
        &self.pool
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.pool.player(id)
    }

    pub fn location(&self, id: &str) -> Option<Location> {
        self.pool.location(id)
    }

    pub fn courts(&self) -> &[Court] {
        self.pool.courts()
    }

    pub fn history(&self) -> &[MatchRecord] {
        &self.history
    }

    pub fn pairings(&self) -> &PairingHistory {
        &self.pairings
    }

    pub fn guard(&self) -> &RepetitionGuard {
        &self.guard
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        self.pool.snapshot()
    }

    pub(crate) fn notify_pool_changed(&self) {
        if self.listeners.is_empty() {
            return;
        }
        let snapshot = self.pool.snapshot();
        for listener in &self.listeners {
            listener.on_pool_changed(&snapshot);
        }
    }

    pub(crate) fn notify_match_formed(&self, event: &MatchFormed) {
        for listener in &self.listeners {
            listener.on_match_formed(event);
        }
    }

    /// Register one player in Unassigned.
    pub fn add_player(&mut self, name: &str, level: f64, tier: Tier) -> Result<PlayerId, RotationError> {
        let id = self.pool.add_player(name, level, tier)?;
        self.notify_pool_changed();
        Ok(id)
    }

    /// Add players from pasted `<name><level>` lines. Bad lines and duplicate
    /// names are skipped and reported.
    pub fn add_players_from_text(&mut self, text: &str) -> RosterReport {
        let (entries, mut skipped) = parse_batch_text(text);
        let mut imported = Vec::new();
        for (line, entry) in entries {
            match self.pool.add_player(&entry.name, entry.level, Tier::default()) {
                Ok(id) => imported.push(id),
                Err(e) => skipped.push(SkippedRow::new(line, entry.name, e.to_string())),
            }
        }
        skipped.sort_by_key(|s| s.line);
        info!("Batch import: {} added, {} skipped", imported.len(), skipped.len());
        self.notify_pool_changed();
        RosterReport { imported, skipped }
    }

    /// Replace the Unassigned pool with the present roster entries. Absent,
    /// invalid and duplicate entries are skipped and reported.
    pub fn import_roster(&mut self, entries: Vec<RosterEntry>) -> RosterReport {
        let dropped = self.pool.clear_unassigned();
        let mut report = RosterReport::default();
        for (i, entry) in entries.into_iter().enumerate() {
            if !entry.present {
                report.skipped.push(SkippedRow::new(i + 1, entry.name, "absent"));
                continue;
            }
            let tier = entry.tier.unwrap_or_default();
            match self.pool.add_player(&entry.name, entry.level, tier) {
                Ok(id) => report.imported.push(id),
                Err(e) => {
                    warn!("Skipping roster entry {}: {}", entry.name, e);
                    report.skipped.push(SkippedRow::new(i + 1, entry.name, e.to_string()));
                }
            }
        }
        info!(
            "Roster import: replaced {} unassigned with {} ({} skipped)",
            dropped,
            report.imported.len(),
            report.skipped.len()
        );
        self.notify_pool_changed();
        report
    }

    /// Parse a roster CSV and import it. Unreadable rows join the skipped list.
    pub fn import_roster_csv<R: std::io::Read>(&mut self, reader: R) -> Result<RosterReport, RosterError> {
        let (entries, unreadable) = parse_roster_csv(reader)?;
        let mut report = self.import_roster(entries);
        report.skipped.extend(unreadable);
        Ok(report)
    }

    /// Move a player from Unassigned/Resting into Waiting. With
    /// `promote_catch_up`, their match count is raised to the active average.
    pub fn promote(&mut self, id: &str) -> Result<(), RotationError> {
        let floor = self
            .config
            .promote_catch_up
            .then(|| self.pool.average_active_matches());
        self.pool.promote(id, floor)?;
        self.notify_pool_changed();
        Ok(())
    }

    pub fn rest(&mut self, id: &str) -> Result<(), RotationError> {
        self.pool.rest(id)?;
        self.notify_pool_changed();
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<Player, RotationError> {
        let removed = self.pool.remove(id)?;
        info!("Removed player {}", removed.id);
        self.notify_pool_changed();
        Ok(removed)
    }

    /// Operator-chosen match: the given order is the court order.
    pub fn seat_manually(&mut self, court: usize, players: [PlayerId; 4]) -> Result<MatchFormed, RotationError> {
        self.pool.commit_match(court, players.clone(), Utc::now(), false)?;
        let event = MatchFormed {
            court,
            players,
            split: TeamSplit::FirstWithSecond,
            rule: SelectionRule::Manual,
            relaxed: false,
            level_diff: None,
        };
        info!("Manual match on court {}", court + 1);
        self.notify_match_formed(&event);
        self.notify_pool_changed();
        Ok(event)
    }

    /// Empty a court without counting the match.
    pub fn abandon_match(&mut self, court: usize) -> Result<(), RotationError> {
        self.pool.abandon_court(court)?;
        info!("Match on court {} abandoned", court + 1);
        self.notify_pool_changed();
        Ok(())
    }

    /// Finished matches, oldest first.
    pub fn export_match_history(&self) -> Vec<MatchRecord> {
        self.history.clone()
    }

    pub fn write_history_csv<W: Write>(&self, writer: W) -> Result<(), RosterError> {
        write_history_csv(&self.history, writer)
    }
}
