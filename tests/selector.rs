//! Integration tests for the eligible-set selector.

use court_rotation::logic::{
    reserved_slots, select_candidates, select_desync, SelectionRule,
};
use court_rotation::{EngineConfig, LifecycleTag, Player, Tier, UrgencyMode};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;

fn waiter(name: &str, turns: u32, tag: LifecycleTag, matches: u32) -> Player {
    let mut p = Player::new(name, 3.0, Tier::B);
    p.waiting_turns = turns;
    p.tag = tag;
    p.matches_played = matches;
    p
}

fn fresh(name: &str, turns: u32) -> Player {
    waiter(name, turns, LifecycleTag::None, 0)
}

fn finished(name: &str) -> Player {
    waiter(name, 0, LifecycleTag::JustFinished, 1)
}

fn select(players: &[Player], config: &EngineConfig, seed: u64) -> Option<(Vec<String>, SelectionRule)> {
    let refs: Vec<&Player> = players.iter().collect();
    let mut rng = StdRng::seed_from_u64(seed);
    select_candidates(&refs, config, &mut rng).map(|s| (s.players, s.rule))
}

fn assert_four_distinct(ids: &[String]) {
    assert_eq!(ids.len(), 4);
    let set: HashSet<&String> = ids.iter().collect();
    assert_eq!(set.len(), 4);
}

#[test]
fn fewer_than_four_waiting_selects_nothing() {
    let players = vec![fresh("A", 5), fresh("B", 0), finished("C")];
    assert_eq!(select(&players, &EngineConfig::default(), 1), None);
}

#[test]
fn one_waiter_borrows_three_just_finished() {
    let mut players = vec![fresh("Solo", 0)];
    players.extend((0..6).map(|i| finished(&format!("F{i}"))));
    let config = EngineConfig::default();

    let mut seen_sets = HashSet::new();
    for seed in 0..50 {
        let (ids, rule) = select(&players, &config, seed).unwrap();
        assert_four_distinct(&ids);
        assert_eq!(rule, SelectionRule::Borrowed);
        assert!(ids.contains(&"Solo".to_string()));
        assert_eq!(ids.iter().filter(|id| id.starts_with('F')).count(), 3);
        let mut sorted = ids.clone();
        sorted.sort();
        seen_sets.insert(sorted);
    }
    assert!(seen_sets.len() > 1, "just-finished players should be drawn at random");
}

#[test]
fn urgent_waiter_is_always_selected() {
    let players = vec![
        fresh("P", 2),
        fresh("A", 1),
        fresh("B", 1),
        fresh("C", 0),
        finished("D"),
        finished("E"),
        finished("F"),
    ];
    let config = EngineConfig::default();
    for seed in 0..100 {
        let (ids, rule) = select(&players, &config, seed).unwrap();
        assert_four_distinct(&ids);
        assert_eq!(rule, SelectionRule::Urgent);
        assert!(ids.contains(&"P".to_string()));
        // The rest is filled by waiting turns, highest first.
        assert!(ids.contains(&"A".to_string()));
        assert!(ids.contains(&"B".to_string()));
    }
}

#[test]
fn more_than_four_urgent_takes_the_longest_waiters() {
    let players = vec![
        fresh("T2", 2),
        fresh("T3", 3),
        fresh("T4", 4),
        fresh("T5", 5),
        fresh("T6", 6),
        finished("F"),
    ];
    let (mut ids, rule) = select(&players, &EngineConfig::default(), 7).unwrap();
    ids.sort();
    assert_eq!(rule, SelectionRule::Urgent);
    assert_eq!(ids, vec!["T3", "T4", "T5", "T6"]);
}

#[test]
fn only_just_finished_waiting() {
    let players: Vec<Player> = (0..5).map(|i| finished(&format!("F{i}"))).collect();
    let (ids, rule) = select(&players, &EngineConfig::default(), 3).unwrap();
    assert_four_distinct(&ids);
    assert_eq!(rule, SelectionRule::AllJustFinished);
}

#[test]
fn four_waiters_prefer_fewest_matches_plus_one_just_finished() {
    let players = vec![
        waiter("M1", 0, LifecycleTag::None, 1),
        waiter("M2", 0, LifecycleTag::None, 2),
        waiter("M3", 0, LifecycleTag::JustJoined, 3),
        waiter("M4", 1, LifecycleTag::None, 4),
        finished("F1"),
        finished("F2"),
    ];
    for seed in 0..20 {
        let (ids, rule) = select(&players, &EngineConfig::default(), seed).unwrap();
        assert_eq!(rule, SelectionRule::FewestMatches);
        for want in ["M1", "M2", "M3"] {
            assert!(ids.contains(&want.to_string()));
        }
        assert!(!ids.contains(&"M4".to_string()));
        assert_eq!(ids.iter().filter(|id| id.starts_with('F')).count(), 1);
    }
}

#[test]
fn four_waiters_without_just_finished_are_all_selected() {
    let players: Vec<Player> = (0..4).map(|i| fresh(&format!("W{i}"), 1)).collect();
    let (mut ids, rule) = select(&players, &EngineConfig::default(), 0).unwrap();
    ids.sort();
    assert_eq!(rule, SelectionRule::FewestMatches);
    assert_eq!(ids, vec!["W0", "W1", "W2", "W3"]);
}

#[test]
fn five_waiters_take_three_fewest_matches() {
    let players = vec![
        waiter("A", 0, LifecycleTag::None, 0),
        waiter("B", 0, LifecycleTag::None, 0),
        waiter("C", 0, LifecycleTag::None, 1),
        waiter("D", 0, LifecycleTag::None, 5),
        waiter("E", 0, LifecycleTag::None, 5),
        finished("F"),
    ];
    let (mut ids, rule) = select(&players, &EngineConfig::default(), 11).unwrap();
    ids.sort();
    assert_eq!(rule, SelectionRule::FewestMatches);
    assert_eq!(ids, vec!["A", "B", "C", "F"]);
}

#[test]
fn large_pool_lets_just_finished_go_first() {
    let mut players: Vec<Player> = (0..6).map(|i| fresh(&format!("W{i}"), 1)).collect();
    players.push(finished("F1"));
    players.push(finished("F2"));
    let (ids, rule) = select(&players, &EngineConfig::default(), 5).unwrap();
    assert_four_distinct(&ids);
    assert_eq!(rule, SelectionRule::JustFinishedFirst);
    assert!(ids.contains(&"F1".to_string()));
    assert!(ids.contains(&"F2".to_string()));
}

#[test]
fn large_pool_without_just_finished_first_takes_longest_waiters() {
    let mut players = vec![fresh("Long1", 1), fresh("Long2", 1)];
    players.extend((0..4).map(|i| waiter(&format!("New{i}"), 0, LifecycleTag::JustJoined, 0)));
    players.push(finished("F1"));
    let config = EngineConfig {
        just_finished_first: false,
        ..EngineConfig::default()
    };
    let (ids, rule) = select(&players, &config, 9).unwrap();
    assert_eq!(rule, SelectionRule::LongestWaiting);
    assert!(ids.contains(&"Long1".to_string()));
    assert!(ids.contains(&"Long2".to_string()));
    assert!(!ids.contains(&"F1".to_string()));
}

#[test]
fn scaled_override_reserves_slots_for_long_waiters() {
    let config = EngineConfig {
        urgency: UrgencyMode::Scaled,
        ..EngineConfig::default()
    };
    let mut players = vec![fresh("U5", 5), fresh("U4", 4), fresh("U2", 2)];
    players.extend((0..6).map(|i| fresh(&format!("W{i}"), 1)));
    players.push(finished("F1"));
    players.push(finished("F2"));

    for seed in 0..30 {
        let (ids, rule) = select(&players, &config, seed).unwrap();
        assert_four_distinct(&ids);
        assert_eq!(rule, SelectionRule::ScaledOverride { reserved: 2 });
        assert!(ids.contains(&"U5".to_string()));
        assert!(ids.contains(&"U4".to_string()));
        assert!(ids.iter().all(|id| !id.starts_with('F')));
    }
}

#[test]
fn scaled_mode_below_pool_threshold_uses_normal_rules() {
    let config = EngineConfig {
        urgency: UrgencyMode::Scaled,
        ..EngineConfig::default()
    };
    let mut players = vec![fresh("U", 4)];
    players.extend((0..5).map(|i| fresh(&format!("W{i}"), 0)));
    players.push(finished("F1"));
    let (ids, rule) = select(&players, &config, 2).unwrap();
    assert_eq!(rule, SelectionRule::JustFinishedFirst);
    assert!(ids.contains(&"F1".to_string()));
    assert!(ids.contains(&"U".to_string()));
}

#[test]
fn reserved_slot_table() {
    assert_eq!(reserved_slots(0), 0);
    assert_eq!(reserved_slots(1), 1);
    assert_eq!(reserved_slots(2), 2);
    assert_eq!(reserved_slots(5), 2);
    assert_eq!(reserved_slots(6), 3);
    assert_eq!(reserved_slots(20), 3);
}

#[test]
fn desync_mixes_in_just_finished() {
    let players = vec![
        fresh("A", 1),
        fresh("B", 1),
        fresh("C", 0),
        finished("F1"),
        finished("F2"),
    ];
    let refs: Vec<&Player> = players.iter().collect();
    let mut rng = StdRng::seed_from_u64(4);
    let selection = select_desync(&refs, &EngineConfig::default(), &mut rng).unwrap();
    let mut ids = selection.players.clone();
    ids.sort();
    assert_eq!(selection.rule, SelectionRule::Desync);
    assert_eq!(ids, vec!["A", "B", "F1", "F2"]);
}

#[test]
fn desync_needs_just_finished_players() {
    let players: Vec<Player> = (0..5).map(|i| fresh(&format!("W{i}"), 1)).collect();
    let refs: Vec<&Player> = players.iter().collect();
    let mut rng = StdRng::seed_from_u64(4);
    assert!(select_desync(&refs, &EngineConfig::default(), &mut rng).is_none());
}
