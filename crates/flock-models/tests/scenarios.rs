//! End-to-end runs of the reference models.

use std::collections::HashSet;

use flock_core::{derive_seed, CancelToken, ParamSet, ParameterGrid, Value};
use flock_engine::Sampling;
use flock_models::{bank_reserves, conway, find, segregation, virus, wealth, wolf_sheep, SweepOptions};

#[test]
fn wealth_inequality_emerges() {
    let mut m = wealth::build(&wealth::defaults(), 42).unwrap();
    m.run_for(100).unwrap();
    let g = wealth::model_gini(&m);
    assert!(g > 0.3 && g < 0.85, "gini {g}");
    let total: i64 = m.agents().iter().map(|(_, t)| t.wealth).sum();
    assert_eq!(total, 100);
}

#[test]
fn segregation_settles() {
    let mut m = segregation::build(&segregation::defaults(), 1).unwrap();
    m.run_until(|m| m.tick().0 >= 200).unwrap();
    assert!(!m.running(), "still unhappy at tick {}", m.tick());
    assert_eq!(segregation::happy_count(&m), m.agents().count());
}

#[test]
fn wolf_sheep_coexist_for_fifty_ticks() {
    let mut m = wolf_sheep::build(&wolf_sheep::defaults(), 7).unwrap();
    m.run_for(50).unwrap();
    assert_eq!(m.tick().0, 50);
    assert!(m.agents().count_type("sheep") > 0);
    assert!(m.agents().count_type("wolf") > 0);
}

/// Plain nested-loop Life on a torus.
fn reference_generation(live: &HashSet<(i32, i32)>, w: i32, h: i32) -> Vec<(i32, i32)> {
    let mut next = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let mut n = 0;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if (dx, dy) != (0, 0) && live.contains(&((x + dx).rem_euclid(w), (y + dy).rem_euclid(h))) {
                        n += 1;
                    }
                }
            }
            let alive = live.contains(&(x, y));
            if n == 3 || (alive && n == 2) {
                next.push((x, y));
            }
        }
    }
    next.sort_unstable();
    next
}

#[test]
fn conway_matches_reference_generation() {
    let mut m = conway::build(&conway::defaults(), 11).unwrap();
    let before: HashSet<(i32, i32)> = conway::live_cells(&m).into_iter().collect();
    assert!(!before.is_empty());
    m.step().unwrap();
    assert_eq!(conway::live_cells(&m), reference_generation(&before, 50, 50));
    m.step().unwrap();
    let second: HashSet<(i32, i32)> = conway::live_cells(&m).into_iter().collect();
    let mut again = conway::build(&conway::defaults(), 11).unwrap();
    again.run_for(2).unwrap();
    assert_eq!(conway::live_cells(&again).into_iter().collect::<HashSet<_>>(), second);
}

#[test]
fn virus_burns_out() {
    let mut m = virus::build(&virus::defaults(), 3).unwrap();
    m.run_until(|m| m.tick().0 >= 1_000).unwrap();
    assert!(!m.running());
    assert_eq!(virus::count(&m, virus::Health::Infected), 0);
    let recovered = virus::count(&m, virus::Health::Recovered);
    assert!((15..=95).contains(&recovered), "recovered {recovered}");
}

#[test]
fn bank_reserves_sweep_has_one_row_per_run() {
    let grid = ParameterGrid::new()
        .sweep("init_people", [25i64, 100])
        .sweep("rich_threshold", [5i64, 10])
        .sweep("reserve_percent", [5i64, 10, 20, 50]);
    let options = SweepOptions {
        repetitions: 5,
        max_steps: 100,
        master_seed: 2024,
        workers: Some(4),
        sampling: Sampling::Final,
        cancel: CancelToken::new(),
    };
    let table = find(bank_reserves::NAME).unwrap().sweep(grid, &options).unwrap();
    assert_eq!(table.len(), 80);
    for col in ["run_id", "init_people", "rich_threshold", "reserve_percent", "tick", "rich"] {
        assert!(table.column_index(col).is_some(), "missing {col}");
    }
    for row in 0..table.len() {
        let c = table.get(row, "combination").and_then(Value::as_i64).unwrap() as usize;
        let r = table.get(row, "repetition").and_then(Value::as_i64).unwrap() as usize;
        let seed = table.get(row, "seed").and_then(Value::as_i64).unwrap() as u64;
        assert_eq!(seed, derive_seed(2024, c, r));
        assert_eq!(table.get(row, "tick").and_then(Value::as_i64), Some(100));
    }
}

#[test]
fn same_seed_same_tables() {
    for name in [wealth::NAME, wolf_sheep::NAME, virus::NAME] {
        let s = find(name).unwrap();
        let params = s.defaults();
        let a = s.run(&params, 99, 20, &CancelToken::new()).unwrap();
        let b = s.run(&params, 99, 20, &CancelToken::new()).unwrap();
        assert_eq!(a, b, "{name}");
    }
}

#[test]
fn cancelled_run_reports_its_tick() {
    let s = find(conway::NAME).unwrap();
    let token = CancelToken::new();
    token.cancel();
    let err = s
        .run(&ParamSet::new().with("width", 5i64).with("height", 5i64), 1, 10, &token)
        .unwrap_err();
    assert_eq!(err.kind(), flock_core::ErrorKind::Cancelled);
}
