//! Integration tests for rotation passes, finishing matches and session events.

use chrono::{Duration, Utc};
use court_rotation::logic::SelectionRule;
use court_rotation::{
    fill_courts, fill_courts_at, finish_match, finish_match_at, BalancePolicy, CourtOutcome,
    EngineConfig, FixedAnswer, LifecycleTag, Location, MatchFormed, PairCount, Player, PlayerId,
    PoolManager, PoolSnapshot, RotationError, RotationListener, RotationSession, Tier,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

fn session_with(config: EngineConfig, players: &[(&str, f64, Tier)]) -> RotationSession {
    let mut s = RotationSession::new(config);
    for (name, level, tier) in players {
        s.add_player(name, *level, *tier).unwrap();
        s.promote(name).unwrap();
    }
    s
}

fn seeded(config: EngineConfig, seed: u64) -> EngineConfig {
    EngineConfig {
        seed: Some(seed),
        ..config
    }
}

fn one_court(config: EngineConfig) -> EngineConfig {
    EngineConfig {
        court_count: 1,
        ..config
    }
}

fn assert_partition(s: &RotationSession) {
    let snap = s.snapshot();
    let mut seen = HashSet::new();
    let groups = [&snap.unassigned, &snap.waiting, &snap.resting];
    for group in groups {
        for p in group.iter() {
            assert!(seen.insert(p.id.clone()), "{} appears twice", p.id);
        }
    }
    for court in &snap.courts {
        assert!(court.players().is_empty() || court.players().len() == 4);
        for id in court.players() {
            assert!(seen.insert(id.clone()), "{id} double-booked");
        }
    }
    assert_eq!(seen.len(), s.pool().len());
}

#[test]
fn four_equal_pairs_form_a_balanced_match() {
    let config = one_court(seeded(EngineConfig::numeric(), 1));
    let mut s = session_with(
        config,
        &[
            ("A", 3.0, Tier::B),
            ("B", 3.0, Tier::B),
            ("C", 3.5, Tier::B),
            ("D", 3.5, Tier::B),
        ],
    );
    let report = fill_courts(&mut s, &mut FixedAnswer(false));
    assert_eq!(report.formed_count(), 1);
    let formed = report.formed().next().unwrap();
    assert_eq!(formed.level_diff, Some(0.0));
    assert!(!formed.relaxed);
    assert!(s.pool().waiting().is_empty());
    assert!(s.courts()[0].start_time().is_some());
    assert_partition(&s);
}

#[test]
fn too_few_players_leaves_courts_empty() {
    let mut s = session_with(
        seeded(EngineConfig::default(), 2),
        &[("A", 3.0, Tier::B), ("B", 3.0, Tier::B), ("C", 3.0, Tier::B)],
    );
    let report = fill_courts(&mut s, &mut FixedAnswer(true));
    assert_eq!(report.outcomes.len(), 3);
    assert!(report
        .outcomes
        .iter()
        .all(|o| matches!(o, CourtOutcome::NotEnoughPlayers { waiting: 3, .. })));
    assert_eq!(report.advanced, 3);
}

#[test]
fn declined_relax_keeps_court_empty_and_still_advances() {
    let config = one_court(seeded(EngineConfig::default(), 3));
    let mut s = session_with(
        config,
        &[
            ("A1", 3.0, Tier::A),
            ("A2", 3.0, Tier::A),
            ("A3", 3.0, Tier::A),
            ("C1", 3.0, Tier::C),
        ],
    );
    let report = fill_courts(&mut s, &mut FixedAnswer(false));
    assert!(matches!(report.outcomes[0], CourtOutcome::Declined { court: 0, .. }));
    assert!(s.courts()[0].is_empty());
    for id in ["A1", "A2", "A3", "C1"] {
        let p = s.player(id).unwrap();
        assert_eq!((p.tag, p.waiting_turns), (LifecycleTag::None, 0));
    }

    fill_courts(&mut s, &mut FixedAnswer(false));
    assert_eq!(s.player("A1").unwrap().waiting_turns, 1);
}

#[test]
fn accepted_relax_commits_an_unbalanced_match() {
    let config = one_court(seeded(EngineConfig::default(), 4));
    let mut s = session_with(
        config,
        &[
            ("A1", 3.0, Tier::A),
            ("A2", 3.0, Tier::A),
            ("A3", 3.0, Tier::A),
            ("C1", 3.0, Tier::C),
        ],
    );
    let mut asked: Vec<(usize, Vec<PlayerId>)> = Vec::new();
    let mut decider = |court: usize, candidates: &[PlayerId]| {
        asked.push((court, candidates.to_vec()));
        true
    };
    let report = fill_courts(&mut s, &mut decider);
    assert_eq!(asked.len(), 1);
    assert_eq!(asked[0].0, 0);
    let formed = report.formed().next().unwrap();
    assert!(formed.relaxed);
    assert!(s.courts()[0].current.as_ref().unwrap().relaxed);
}

#[test]
fn operator_is_asked_at_most_once_per_pass() {
    // Powers of ten never balance within 1.5.
    let players: Vec<(String, f64)> = (0..8)
        .map(|i| (format!("P{i}"), 10f64.powi(i)))
        .collect();
    let mut s = RotationSession::new(EngineConfig {
        court_count: 2,
        ..seeded(EngineConfig::numeric(), 5)
    });
    for (name, level) in &players {
        s.add_player(name, *level, Tier::B).unwrap();
        s.promote(name).unwrap();
    }

    let mut prompts = 0;
    let mut decider = |_: usize, _: &[PlayerId]| {
        prompts += 1;
        false
    };
    let report = fill_courts(&mut s, &mut decider);
    assert_eq!(prompts, 1);
    assert_eq!(report.outcomes.len(), 2);
    assert!(report
        .outcomes
        .iter()
        .all(|o| matches!(o, CourtOutcome::Declined { .. })));
}

#[test]
fn players_seated_in_a_pass_are_not_advanced() {
    let names: Vec<String> = (0..9).map(|i| format!("P{i}")).collect();
    let mut s = RotationSession::new(EngineConfig {
        court_count: 2,
        ..seeded(EngineConfig::default(), 6)
    });
    for name in &names {
        s.add_player(name, 3.0, Tier::B).unwrap();
        s.promote(name).unwrap();
    }
    let report = fill_courts(&mut s, &mut FixedAnswer(false));
    assert_eq!(report.formed_count(), 2);
    assert_eq!(report.advanced, 1);
    for court in s.courts() {
        for id in court.players() {
            let p = s.player(id).unwrap();
            assert_eq!((p.tag, p.waiting_turns), (LifecycleTag::None, 0));
        }
    }
    assert_partition(&s);
}

#[test]
fn waiting_turns_grow_once_per_pass() {
    let names: Vec<String> = (0..5).map(|i| format!("P{i}")).collect();
    let mut s = RotationSession::new(one_court(seeded(EngineConfig::default(), 7)));
    for name in &names {
        s.add_player(name, 3.0, Tier::B).unwrap();
        s.promote(name).unwrap();
    }
    fill_courts(&mut s, &mut FixedAnswer(false));
    let left = s.pool().waiting()[0].clone();

    for pass in 1..=4u32 {
        // The only court stays busy; the leftover player just waits.
        assert_eq!(s.player(&left).unwrap().waiting_turns, pass - 1);
        fill_courts(&mut s, &mut FixedAnswer(false));
    }
    assert_eq!(s.player(&left).unwrap().waiting_turns, 4);
}

#[test]
fn finish_match_records_history_and_pairings() {
    let mut s = session_with(
        one_court(seeded(EngineConfig::default(), 8)),
        &[
            ("A", 3.0, Tier::B),
            ("B", 3.0, Tier::B),
            ("C", 3.0, Tier::B),
            ("D", 3.0, Tier::B),
        ],
    );
    let start = Utc::now();
    fill_courts_at(&mut s, &mut FixedAnswer(false), start);
    let seated = s.courts()[0].current.clone().unwrap();

    let record = finish_match_at(&mut s, 0, start + Duration::minutes(12)).unwrap();
    assert_eq!(record.number, 1);
    assert_eq!(record.court, 0);
    assert_eq!(record.players, seated.players);
    assert_eq!(record.duration_seconds(), 720);
    assert_eq!(s.pairings().count(&seated.players[0], &seated.players[1]), 1);
    assert_eq!(s.pairings().count(&seated.players[2], &seated.players[3]), 1);
    assert_eq!(s.pairings().count(&seated.players[0], &seated.players[2]), 0);

    for id in &seated.players {
        let p = s.player(id).unwrap();
        assert_eq!(p.matches_played, 1);
        assert_eq!(p.tag, LifecycleTag::JustFinished);
        assert_eq!(s.location(id), Some(Location::Waiting));
    }
    assert_eq!(s.export_match_history(), vec![record]);
    assert_eq!(finish_match(&mut s, 0), Err(RotationError::CourtEmpty(0)));
}

#[test]
fn promote_catches_up_to_active_average() {
    let mut s = session_with(
        one_court(seeded(EngineConfig::default(), 9)),
        &[
            ("A", 3.0, Tier::B),
            ("B", 3.0, Tier::B),
            ("C", 3.0, Tier::B),
            ("D", 3.0, Tier::B),
        ],
    );
    fill_courts(&mut s, &mut FixedAnswer(false));
    finish_match(&mut s, 0).unwrap();
    s.add_player("Late", 3.0, Tier::B).unwrap();
    s.promote("Late").unwrap();
    assert_eq!(s.player("Late").unwrap().matches_played, 1);

    let mut no_catch_up = RotationSession::new(EngineConfig {
        promote_catch_up: false,
        ..EngineConfig::default()
    });
    no_catch_up.add_player("Late", 3.0, Tier::B).unwrap();
    no_catch_up.promote("Late").unwrap();
    assert_eq!(no_catch_up.player("Late").unwrap().matches_played, 0);
}

#[test]
fn manual_seating_and_abandon() {
    let mut s = session_with(
        one_court(seeded(EngineConfig::default(), 10)),
        &[
            ("A", 3.0, Tier::A),
            ("B", 3.0, Tier::B),
            ("C", 3.0, Tier::C),
            ("D", 3.0, Tier::A),
        ],
    );
    let players = ["A", "B", "C", "D"].map(String::from);
    let event = s.seat_manually(0, players.clone()).unwrap();
    assert_eq!(event.announcement(), "Court 1: A & B vs C & D");
    assert_eq!(s.courts()[0].players(), &players[..]);

    s.abandon_match(0).unwrap();
    assert!(s.courts()[0].is_empty());
    assert!(s.history().is_empty());
    assert_eq!(s.player("A").unwrap().matches_played, 0);
    assert_eq!(s.abandon_match(0), Err(RotationError::CourtEmpty(0)));
}

#[test]
fn removing_a_player_on_court_frees_the_court() {
    let mut s = session_with(
        one_court(seeded(EngineConfig::default(), 11)),
        &[
            ("A", 3.0, Tier::B),
            ("B", 3.0, Tier::B),
            ("C", 3.0, Tier::B),
            ("D", 3.0, Tier::B),
        ],
    );
    fill_courts(&mut s, &mut FixedAnswer(false));
    s.remove("B").unwrap();
    assert!(s.courts()[0].is_empty());
    assert_eq!(s.pool().waiting().len(), 3);
    assert!(s.player("B").is_none());
    assert!(matches!(s.remove("B"), Err(RotationError::PlayerNotFound(_))));
    assert_partition(&s);
}

#[test]
fn invariants_hold_over_a_long_evening() {
    for seed in 0..5u64 {
        let config = EngineConfig {
            court_count: 3,
            ..seeded(EngineConfig::numeric(), seed)
        };
        let mut s = RotationSession::new(config);
        let mut driver = StdRng::seed_from_u64(seed + 100);
        for i in 0..15 {
            let name = format!("P{i}");
            let level = 2.0 + f64::from(i % 5) * 0.5;
            s.add_player(&name, level, Tier::B).unwrap();
            s.promote(&name).unwrap();
        }

        for _ in 0..40 {
            let urgent: Vec<PlayerId> = s
                .pool()
                .waiting_players()
                .iter()
                .filter(|p| p.waiting_turns >= 2)
                .map(|p| p.id.clone())
                .collect();
            let has_room =
                !s.pool().empty_courts().is_empty() && s.pool().waiting().len() >= 4;

            let report = fill_courts(&mut s, &mut FixedAnswer(true));
            assert_partition(&s);
            for m in report.formed() {
                if !m.relaxed {
                    assert!(m.level_diff.unwrap() <= 1.5 + 1e-9);
                }
            }
            if has_room && urgent.len() <= 4 {
                for id in &urgent {
                    assert!(
                        matches!(s.location(id), Some(Location::Court(_))),
                        "urgent player {id} was left waiting"
                    );
                }
            }

            let busy: Vec<usize> = s
                .courts()
                .iter()
                .filter(|c| !c.is_empty())
                .map(|c| c.index)
                .collect();
            if !busy.is_empty() {
                let court = busy[driver.gen_range(0..busy.len())];
                finish_match(&mut s, court).unwrap();
            }
            assert_partition(&s);
        }
        assert!(s.history().len() >= 30);
    }
}

#[derive(Default)]
struct Recorded {
    pool_changes: usize,
    matches: Vec<MatchFormed>,
}

struct Recorder(Arc<Mutex<Recorded>>);

impl RotationListener for Recorder {
    fn on_pool_changed(&self, _snapshot: &PoolSnapshot) {
        self.0.lock().unwrap().pool_changes += 1;
    }

    fn on_match_formed(&self, event: &MatchFormed) {
        self.0.lock().unwrap().matches.push(event.clone());
    }
}

#[test]
fn listeners_hear_every_mutation_and_match() {
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let mut s = RotationSession::new(one_court(seeded(EngineConfig::default(), 12)));
    s.add_listener(Box::new(Recorder(recorded.clone())));

    for name in ["A", "B", "C", "D"] {
        s.add_player(name, 3.0, Tier::B).unwrap();
        s.promote(name).unwrap();
    }
    assert_eq!(recorded.lock().unwrap().pool_changes, 8);

    fill_courts(&mut s, &mut FixedAnswer(false));
    {
        let r = recorded.lock().unwrap();
        assert_eq!(r.matches.len(), 1);
        assert_eq!(r.matches[0].court, 0);
        // One for the commit, one at the end of the pass.
        assert_eq!(r.pool_changes, 10);
    }

    finish_match(&mut s, 0).unwrap();
    assert_eq!(recorded.lock().unwrap().pool_changes, 11);

    // Failed operations do not notify.
    assert!(s.rest("Nobody").is_err());
    assert_eq!(recorded.lock().unwrap().pool_changes, 11);
}

#[test]
fn tier_policy_commits_only_allowed_patterns() {
    let tiers = [Tier::A, Tier::B, Tier::C];
    let mut s = RotationSession::new(EngineConfig {
        court_count: 2,
        ..seeded(EngineConfig::default(), 13)
    });
    for i in 0..12 {
        let name = format!("P{i}");
        s.add_player(&name, 3.0, tiers[i % 3]).unwrap();
        s.promote(&name).unwrap();
    }
    for _ in 0..20 {
        let report = fill_courts(&mut s, &mut FixedAnswer(false));
        for m in report.formed() {
            let refs: Vec<_> = m.players.iter().map(|id| s.player(id).unwrap()).collect();
            let pattern = court_rotation::logic::tier_pattern(&refs);
            assert!(
                court_rotation::logic::is_allowed_tier_pattern(&pattern),
                "{pattern}"
            );
            assert!(!m.relaxed);
        }
        for court in 0..2 {
            let _ = finish_match(&mut s, court);
        }
        assert_partition(&s);
    }
    assert!(matches!(s.config.policy, BalancePolicy::Tier));
}

#[test]
fn repeating_waiting_group_triggers_a_mixing_selection() {
    let config = EngineConfig {
        court_count: 1,
        // Keep urgency out of the way so the mix is visible.
        urgent_waiting_turns: 10,
        ..seeded(EngineConfig::default(), 14)
    };
    let names: Vec<String> = (0..8).map(|i| format!("P{i}")).collect();
    let mut s = RotationSession::new(config);
    for name in &names {
        s.add_player(name, 3.0, Tier::B).unwrap();
        s.promote(name).unwrap();
    }

    let first = fill_courts(&mut s, &mut FixedAnswer(false));
    assert_eq!(first.formed_count(), 1);
    let stuck: HashSet<PlayerId> = s.pool().waiting().iter().cloned().collect();
    assert_eq!(stuck.len(), 4);

    // Court stays busy: the same 4 names wait pass after pass.
    for expected in [0, 1, 2] {
        let report = fill_courts(&mut s, &mut FixedAnswer(false));
        assert!(report.outcomes.is_empty());
        assert!(!report.desync_applied);
        assert_eq!(s.guard().cycle_count(), expected);
    }

    finish_match(&mut s, 0).unwrap();
    let report = fill_courts(&mut s, &mut FixedAnswer(false));
    assert!(report.desync_applied);
    assert_eq!(s.guard().cycle_count(), 0);

    let formed = report.formed().next().unwrap();
    assert_eq!(formed.rule, SelectionRule::Desync);
    let from_stuck = formed.players.iter().filter(|id| stuck.contains(*id)).count();
    assert_eq!(from_stuck, 2);
    assert_partition(&s);
}

/// One court, tiers A A A C C with the second C having played more.
fn widened_search_session(widen_search: bool) -> RotationSession {
    let mut pool = PoolManager::new(1);
    for (name, tier, matches) in [
        ("A1", Tier::A, 0),
        ("A2", Tier::A, 0),
        ("A3", Tier::A, 0),
        ("C1", Tier::C, 0),
        ("C2", Tier::C, 5),
    ] {
        let mut p = Player::new(name, 3.0, tier);
        p.matches_played = matches;
        pool.restore_player(p).unwrap();
        pool.promote(name, None).unwrap();
    }
    let config = EngineConfig {
        court_count: 1,
        widen_search,
        ..seeded(EngineConfig::default(), 15)
    };
    RotationSession::with_pool(config, pool)
}

#[test]
fn widened_search_finds_another_balanced_group() {
    // Fewest matches picks A1 A2 A3 C1, which no tier split accepts.
    let mut prompts = 0;
    let mut decider = |_: usize, _: &[PlayerId]| {
        prompts += 1;
        false
    };
    let mut s = widened_search_session(false);
    let report = fill_courts(&mut s, &mut decider);
    assert!(matches!(report.outcomes[0], CourtOutcome::Declined { .. }));
    assert_eq!(prompts, 1);

    let mut prompts = 0;
    let mut decider = |_: usize, _: &[PlayerId]| {
        prompts += 1;
        false
    };
    let mut s = widened_search_session(true);
    let report = fill_courts(&mut s, &mut decider);
    assert_eq!(prompts, 0);
    let formed = report.formed().next().unwrap();
    assert_eq!(formed.rule, SelectionRule::WidenedSearch);
    assert!(!formed.relaxed);
    assert!(formed.players.contains(&"C1".to_string()));
    assert!(formed.players.contains(&"C2".to_string()));
    let refs: Vec<_> = formed.players.iter().map(|id| s.player(id).unwrap()).collect();
    assert_eq!(court_rotation::logic::tier_pattern(&refs), "AACC");
    assert_partition(&s);
}

#[test]
fn pairing_table_lists_most_frequent_pairs_first() {
    let mut s = session_with(
        one_court(seeded(EngineConfig::default(), 16)),
        &[
            ("A", 3.0, Tier::B),
            ("B", 3.0, Tier::B),
            ("C", 3.0, Tier::B),
            ("D", 3.0, Tier::B),
        ],
    );
    let players = ["A", "B", "C", "D"].map(String::from);
    s.seat_manually(0, players.clone()).unwrap();
    finish_match(&mut s, 0).unwrap();
    s.seat_manually(0, ["A", "B", "D", "C"].map(String::from)).unwrap();
    finish_match(&mut s, 0).unwrap();

    let pair = |first: &str, second: &str, count| PairCount {
        first: first.to_string(),
        second: second.to_string(),
        count,
    };
    assert_eq!(
        s.pairings().entries(),
        vec![pair("A", "B", 2), pair("C", "D", 2)]
    );
}

#[test]
fn finished_court_waits_for_the_next_pass() {
    let names: Vec<String> = (0..8).map(|i| format!("P{i}")).collect();
    let mut s = RotationSession::new(one_court(seeded(EngineConfig::default(), 17)));
    for name in &names {
        s.add_player(name, 3.0, Tier::B).unwrap();
        s.promote(name).unwrap();
    }
    fill_courts(&mut s, &mut FixedAnswer(false));
    finish_match(&mut s, 0).unwrap();
    assert!(s.courts()[0].is_empty());
    assert_eq!(s.pool().waiting().len(), 8);

    let report = fill_courts(&mut s, &mut FixedAnswer(false));
    assert_eq!(report.formed_count(), 1);
    assert!(!s.courts()[0].is_empty());
}
