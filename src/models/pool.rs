//! PoolManager: the player registry, the three player groups and the courts.

use crate::models::court::{Court, CourtMatch};
use crate::models::player::{LifecycleTag, Player, PlayerId, Tier};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Errors that can occur during pool operations.
#[derive(Clone, Debug, PartialEq)]
pub enum RotationError {
    /// No player with this id in the registry (or not where the operation expects it).
    PlayerNotFound(PlayerId),
    /// A player with this name already exists (names are unique, case-insensitive).
    DuplicatePlayerName(String),
    /// Name is empty after trimming.
    InvalidPlayerName,
    /// Level is not a finite number.
    InvalidLevel(PlayerId),
    /// Player is not in Unassigned or Resting.
    NotPromotable(PlayerId),
    /// Player is not in the Waiting pool.
    NotWaiting(PlayerId),
    CourtNotFound(usize),
    CourtOccupied(usize),
    CourtEmpty(usize),
    /// The same player was listed twice for one match.
    DuplicateInMatch(PlayerId),
    NotOnCourt { court: usize, player: PlayerId },
    /// Nobody is waiting to replace a player leaving a court.
    NoSubstituteAvailable(usize),
}

impl std::fmt::Display for RotationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RotationError::PlayerNotFound(id) => write!(f, "Player not found: {}", id),
            RotationError::DuplicatePlayerName(name) => {
                write!(f, "A player named {} already exists", name)
            }
            RotationError::InvalidPlayerName => write!(f, "Player name must not be empty"),
            RotationError::InvalidLevel(id) => write!(f, "Invalid level for player {}", id),
            RotationError::NotPromotable(id) => {
                write!(f, "Player {} is not in the unassigned or resting list", id)
            }
            RotationError::NotWaiting(id) => write!(f, "Player {} is not waiting", id),
            RotationError::CourtNotFound(c) => write!(f, "Court {} does not exist", c + 1),
            RotationError::CourtOccupied(c) => write!(f, "Court {} is already in use", c + 1),
            RotationError::CourtEmpty(c) => write!(f, "Court {} has no match", c + 1),
            RotationError::DuplicateInMatch(id) => {
                write!(f, "Player {} listed twice for one match", id)
            }
            RotationError::NotOnCourt { court, player } => {
                write!(f, "Player {} is not on court {}", player, court + 1)
            }
            RotationError::NoSubstituteAvailable(c) => {
                write!(f, "Nobody is waiting to substitute on court {}", c + 1)
            }
        }
    }
}

impl std::error::Error for RotationError {}

/// Which group a player currently belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    Unassigned,
    Waiting,
    Resting,
    Court(usize),
}

/// Read-only view of every group, delivered to listeners after each mutation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub unassigned: Vec<Player>,
    pub waiting: Vec<Player>,
    pub resting: Vec<Player>,
    pub courts: Vec<Court>,
}

impl PoolSnapshot {
    pub fn total_players(&self) -> usize {
        self.unassigned.len()
            + self.waiting.len()
            + self.resting.len()
            + self.courts.iter().map(|c| c.players().len()).sum::<usize>()
    }
}

/// Owner of all player state. Every player is in exactly one of
/// Unassigned, Waiting, Resting or one court.
#[derive(Clone, Debug, Default)]
pub struct PoolManager {
    players: BTreeMap<PlayerId, Player>,
    unassigned: Vec<PlayerId>,
    waiting: Vec<PlayerId>,
    resting: Vec<PlayerId>,
    courts: Vec<Court>,
}

impl PoolManager {
    /// Create an empty pool with `court_count` free courts.
    pub fn new(court_count: usize) -> Self {
        Self {
            courts: (0..court_count).map(Court::new).collect(),
            ..Self::default()
        }
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    /// All registered players, ordered by id.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn unassigned(&self) -> &[PlayerId] {
        &self.unassigned
    }

    pub fn waiting(&self) -> &[PlayerId] {
        &self.waiting
    }

    pub fn resting(&self) -> &[PlayerId] {
        &self.resting
    }

    pub fn courts(&self) -> &[Court] {
        &self.courts
    }

    pub fn court(&self, index: usize) -> Option<&Court> {
        self.courts.get(index)
    }

    /// Indices of free courts, in court order.
    pub fn empty_courts(&self) -> Vec<usize> {
        self.courts
            .iter()
            .filter(|c| c.is_empty())
            .map(|c| c.index)
            .collect()
    }

    /// Waiting players in pool order.
    pub fn waiting_players(&self) -> Vec<&Player> {
        self.waiting
            .iter()
            .filter_map(|id| self.players.get(id))
            .collect()
    }

    pub(crate) fn waiting_players_mut(&mut self) -> impl Iterator<Item = &mut Player> + '_ {
        let waiting = &self.waiting;
        self.players
            .values_mut()
            .filter(move |p| waiting.contains(&p.id))
    }

    /// Look up several players at once; fails on the first unknown id.
    pub fn players_by_ids<'a>(&'a self, ids: &[PlayerId]) -> Result<Vec<&'a Player>, RotationError> {
        ids.iter()
            .map(|id| {
                self.players
                    .get(id)
                    .ok_or_else(|| RotationError::PlayerNotFound(id.clone()))
            })
            .collect()
    }

    pub fn location(&self, id: &str) -> Option<Location> {
        if !self.players.contains_key(id) {
            return None;
        }
        if let Some(court) = self
            .courts
            .iter()
            .find(|c| c.current.as_ref().is_some_and(|m| m.contains(id)))
        {
            return Some(Location::Court(court.index));
        }
        if self.waiting.iter().any(|p| p == id) {
            Some(Location::Waiting)
        } else if self.resting.iter().any(|p| p == id) {
            Some(Location::Resting)
        } else if self.unassigned.iter().any(|p| p == id) {
            Some(Location::Unassigned)
        } else {
            None
        }
    }

    /// Rounded average matches of everyone on a court or waiting (0 when nobody is).
    pub fn average_active_matches(&self) -> u32 {
        let active: Vec<u32> = self
            .courts
            .iter()
            .flat_map(|c| c.players().iter())
            .chain(self.waiting.iter())
            .filter_map(|id| self.players.get(id))
            .map(|p| p.matches_played)
            .collect();
        if active.is_empty() {
            return 0;
        }
        let total: u32 = active.iter().sum();
        (total as f64 / active.len() as f64).round() as u32
    }

    /// Register a player in Unassigned. Names must be unique (case-insensitive).
    pub fn add_player(&mut self, name: &str, level: f64, tier: Tier) -> Result<PlayerId, RotationError> {
        self.restore_player(Player::new(name, level, tier))
    }

    /// Register a player record with the counters it already has (a player
    /// carried over from an earlier night). Lands in Unassigned; tag and
    /// waiting turns start fresh.
    pub fn restore_player(&mut self, mut player: Player) -> Result<PlayerId, RotationError> {
        let name = player.id.trim().to_string();
        if name.is_empty() {
            return Err(RotationError::InvalidPlayerName);
        }
        if !player.level.is_finite() {
            return Err(RotationError::InvalidLevel(name));
        }
        let is_duplicate = self.players.keys().any(|id| id.eq_ignore_ascii_case(&name));
        if is_duplicate {
            return Err(RotationError::DuplicatePlayerName(name));
        }
        player.id = name.clone();
        player.enter_waiting(LifecycleTag::None);
        self.unassigned.push(name.clone());
        self.players.insert(name.clone(), player);
        Ok(name)
    }

    /// Drop every Unassigned player from the registry (roster re-import).
    pub fn clear_unassigned(&mut self) -> usize {
        let removed = std::mem::take(&mut self.unassigned);
        for id in &removed {
            self.players.remove(id);
        }
        removed.len()
    }

    /// Move a player from Unassigned/Resting into Waiting as `JustJoined`.
    /// `matches_floor` raises (never lowers) their match count.
    pub fn promote(&mut self, id: &str, matches_floor: Option<u32>) -> Result<(), RotationError> {
        let source = match self.location(id) {
            Some(loc @ (Location::Unassigned | Location::Resting)) => loc,
            Some(_) => {
                warn!("Cannot promote {}: not unassigned or resting", id);
                return Err(RotationError::NotPromotable(id.to_string()));
            }
            None => {
                warn!("Cannot promote {}: player not found", id);
                return Err(RotationError::PlayerNotFound(id.to_string()));
            }
        };
        match source {
            Location::Unassigned => self.unassigned.retain(|p| p != id),
            _ => self.resting.retain(|p| p != id),
        }
        if let Some(p) = self.players.get_mut(id) {
            p.enter_waiting(LifecycleTag::JustJoined);
            if let Some(floor) = matches_floor {
                p.matches_played = p.matches_played.max(floor);
            }
        }
        self.waiting.push(id.to_string());
        Ok(())
    }

    /// Move a waiting player to Resting.
    pub fn rest(&mut self, id: &str) -> Result<(), RotationError> {
        if !self.waiting.iter().any(|p| p == id) {
            warn!("Cannot rest {}: not waiting", id);
            return Err(if self.players.contains_key(id) {
                RotationError::NotWaiting(id.to_string())
            } else {
                RotationError::PlayerNotFound(id.to_string())
            });
        }
        self.waiting.retain(|p| p != id);
        self.resting.push(id.to_string());
        Ok(())
    }

    /// Delete a player from the registry and from wherever they are.
    /// A match they were playing in is dissolved; the other 3 return to Waiting.
    pub fn remove(&mut self, id: &str) -> Result<Player, RotationError> {
        let Some(location) = self.location(id) else {
            warn!("Cannot remove {}: player not found", id);
            return Err(RotationError::PlayerNotFound(id.to_string()));
        };
        match location {
            Location::Unassigned => self.unassigned.retain(|p| p != id),
            Location::Waiting => self.waiting.retain(|p| p != id),
            Location::Resting => self.resting.retain(|p| p != id),
            Location::Court(c) => {
                if let Some(m) = self.courts[c].current.take() {
                    info!("Removing {} dissolves the match on court {}", id, c + 1);
                    for other in m.players.iter().filter(|p| *p != id) {
                        self.return_to_waiting(other, LifecycleTag::JustJoined);
                    }
                }
            }
        }
        self.players
            .remove(id)
            .ok_or_else(|| RotationError::PlayerNotFound(id.to_string()))
    }

    /// Seat 4 waiting players on an empty court. Validates everything before mutating.
    pub fn commit_match(
        &mut self,
        court: usize,
        players: [PlayerId; 4],
        now: DateTime<Utc>,
        relaxed: bool,
    ) -> Result<(), RotationError> {
        let slot = self.courts.get(court).ok_or(RotationError::CourtNotFound(court))?;
        if !slot.is_empty() {
            return Err(RotationError::CourtOccupied(court));
        }
        let mut seen = HashSet::new();
        for id in &players {
            if !seen.insert(id.as_str()) {
                return Err(RotationError::DuplicateInMatch(id.clone()));
            }
            if !self.waiting.contains(id) {
                return Err(if self.players.contains_key(id) {
                    RotationError::NotWaiting(id.clone())
                } else {
                    RotationError::PlayerNotFound(id.clone())
                });
            }
        }

        self.waiting.retain(|id| !players.contains(id));
        for id in &players {
            if let Some(p) = self.players.get_mut(id) {
                p.take_court();
            }
        }
        self.courts[court].current = Some(CourtMatch::new(players, now, relaxed));
        Ok(())
    }

    /// End the match on a court: each player gets +1 match and returns to
    /// Waiting as `JustFinished`. Returns the finished match.
    pub fn clear_court(&mut self, court: usize, now: DateTime<Utc>) -> Result<CourtMatch, RotationError> {
        let finished = self
            .courts
            .get_mut(court)
            .ok_or(RotationError::CourtNotFound(court))?
            .current
            .take()
            .ok_or(RotationError::CourtEmpty(court))?;
        let seconds = (now - finished.start_time).num_seconds();
        for id in &finished.players {
            match self.players.get_mut(id) {
                Some(p) => p.record_match(seconds),
                None => {
                    warn!("Court {} held unknown player {}; dropping", court + 1, id);
                    continue;
                }
            }
            self.return_to_waiting(id, LifecycleTag::JustFinished);
        }
        Ok(finished)
    }

    /// Empty a court without counting the match; players return as `JustJoined`.
    pub fn abandon_court(&mut self, court: usize) -> Result<CourtMatch, RotationError> {
        let abandoned = self
            .courts
            .get_mut(court)
            .ok_or(RotationError::CourtNotFound(court))?
            .current
            .take()
            .ok_or(RotationError::CourtEmpty(court))?;
        for id in &abandoned.players {
            self.return_to_waiting(id, LifecycleTag::JustJoined);
        }
        Ok(abandoned)
    }

    /// Swap a player on court for a waiting one in the same slot. The outgoing
    /// player is credited with the match and goes to Resting.
    pub fn substitute_player(
        &mut self,
        court: usize,
        outgoing: &str,
        incoming: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RotationError> {
        let current = self
            .courts
            .get(court)
            .ok_or(RotationError::CourtNotFound(court))?
            .current
            .as_ref()
            .ok_or(RotationError::CourtEmpty(court))?;
        let slot = current.slot_of(outgoing).ok_or_else(|| RotationError::NotOnCourt {
            court,
            player: outgoing.to_string(),
        })?;
        if !self.waiting.iter().any(|p| p == incoming) {
            return Err(RotationError::NotWaiting(incoming.to_string()));
        }
        let seconds = (now - current.start_time).num_seconds();

        if let Some(m) = self.courts[court].current.as_mut() {
            m.players[slot] = incoming.to_string();
        }
        self.waiting.retain(|p| p != incoming);
        if let Some(p) = self.players.get_mut(incoming) {
            p.take_court();
        }
        if let Some(p) = self.players.get_mut(outgoing) {
            p.record_match(seconds);
        }
        self.resting.push(outgoing.to_string());
        Ok(())
    }

    fn return_to_waiting(&mut self, id: &str, tag: LifecycleTag) {
        if let Some(p) = self.players.get_mut(id) {
            p.enter_waiting(tag);
            self.waiting.push(id.to_string());
        }
    }

    /// Restore the partition invariant after an inconsistency: courts win over
    /// Waiting, Waiting over Resting, Resting over Unassigned. Returns the
    /// number of repairs made.
    pub fn repair_partition(&mut self) -> usize {
        let mut seen: HashSet<PlayerId> = HashSet::new();
        let mut displaced: Vec<PlayerId> = Vec::new();
        let mut repairs = 0;

        for court in &mut self.courts {
            let broken = match &court.current {
                Some(m) => {
                    let mut local = HashSet::new();
                    m.players.iter().any(|id| {
                        !self.players.contains_key(id) || seen.contains(id) || !local.insert(id)
                    })
                }
                None => false,
            };
            if broken {
                if let Some(m) = court.current.take() {
                    warn!("Court {} held an unknown or duplicated player; dissolving", court.index + 1);
                    repairs += 1;
                    for id in m.players {
                        if self.players.contains_key(&id)
                            && !seen.contains(&id)
                            && !displaced.contains(&id)
                        {
                            displaced.push(id);
                        }
                    }
                }
            } else if let Some(m) = &court.current {
                seen.extend(m.players.iter().cloned());
            }
        }

        repairs += dedupe_group(&mut self.waiting, "waiting", &self.players, &mut seen);
        repairs += dedupe_group(&mut self.resting, "resting", &self.players, &mut seen);
        repairs += dedupe_group(&mut self.unassigned, "unassigned", &self.players, &mut seen);

        for id in displaced {
            if seen.insert(id.clone()) {
                self.return_to_waiting(&id, LifecycleTag::JustJoined);
            }
        }

        let orphans: Vec<PlayerId> = self
            .players
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        for id in orphans {
            warn!("Player {} was in no group; moving to unassigned", id);
            self.unassigned.push(id);
            repairs += 1;
        }
        repairs
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let collect = |ids: &[PlayerId]| -> Vec<Player> {
            ids.iter()
                .filter_map(|id| self.players.get(id))
                .cloned()
                .collect()
        };
        PoolSnapshot {
            unassigned: collect(&self.unassigned),
            waiting: collect(&self.waiting),
            resting: collect(&self.resting),
            courts: self.courts.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn force_into_group(&mut self, id: &str, location: Location) {
        match location {
            Location::Unassigned => self.unassigned.push(id.to_string()),
            Location::Waiting => self.waiting.push(id.to_string()),
            Location::Resting => self.resting.push(id.to_string()),
            Location::Court(_) => {}
        }
    }

    #[cfg(test)]
    pub(crate) fn player_mut_unchecked(&mut self, id: &str) -> Option<&mut Player> {
        self.players.get_mut(id)
    }
}

/// Keep the first occurrence of each known id not already seen elsewhere.
fn dedupe_group(
    group: &mut Vec<PlayerId>,
    name: &str,
    registry: &BTreeMap<PlayerId, Player>,
    seen: &mut HashSet<PlayerId>,
) -> usize {
    let before = group.len();
    group.retain(|id| {
        let keep = registry.contains_key(id) && seen.insert(id.clone());
        if !keep {
            warn!("Dropping stray entry {} from {} list", id, name);
        }
        keep
    });
    before - group.len()
}
