//! Property tests for the planner and scheduler invariants.
//!
//! Uses proptest to verify:
//! 1. Moon sequence: derived moons are strictly increasing
//! 2. Embargo: no training row reaches `moon - embargo`
//! 3. Test slice: holds exactly the rows of its moon
//! 4. Scheduler: force-first and value-based modulo rules

use moonlab_core::window::{moons, slice};
use moonlab_core::{should_train, Datasets, Moon, Tabular};
use polars::prelude::*;
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_moons() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(-50i64..200, 0..60)
}

fn datasets(train_moons: &[i64], test_moons: &[i64], embargo: Moon) -> Datasets<DataFrame> {
    let rows: Vec<i64> = (0..train_moons.len() as i64).collect();
    let test_rows: Vec<i64> = (0..test_moons.len() as i64).collect();
    Datasets {
        x_train: df!("row" => &rows, "moon" => train_moons).unwrap(),
        y_train: df!("moon" => train_moons, "row" => &rows).unwrap(),
        x_test: df!("row" => &test_rows, "moon" => test_moons).unwrap(),
        moon_column: "moon".to_string(),
        embargo,
    }
}

// ── 1. Moon sequence ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn moons_strictly_increasing(test_moons in arb_moons()) {
        let data = datasets(&[], &test_moons, 0);
        let sequence = moons(&data.x_test, "moon").unwrap();

        prop_assert!(sequence.windows(2).all(|w| w[0] < w[1]));
        for moon in &test_moons {
            prop_assert!(sequence.contains(moon));
        }
    }
}

// ── 2. Embargo ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn training_rows_respect_embargo(
        train_moons in arb_moons(),
        test_moons in prop::collection::vec(-50i64..200, 1..10),
        embargo in 0i64..20,
    ) {
        let data = datasets(&train_moons, &test_moons, embargo);

        for moon in moons(&data.x_test, "moon").unwrap() {
            let slices = slice(&data, moon).unwrap();
            let cutoff = moon - embargo;

            let x_moons = slices.x_train.moon_values("moon").unwrap();
            let y_moons = slices.y_train.moon_values("moon").unwrap();
            prop_assert!(x_moons.iter().all(|m| *m < cutoff));
            prop_assert!(y_moons.iter().all(|m| *m < cutoff));

            let expected = train_moons.iter().filter(|m| **m < cutoff).count();
            prop_assert_eq!(x_moons.len(), expected);
            prop_assert_eq!(y_moons.len(), expected);
        }
    }
}

// ── 3. Test slice ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn test_slice_is_exactly_one_moon(test_moons in prop::collection::vec(0i64..20, 1..40)) {
        let data = datasets(&[], &test_moons, 0);

        let mut total = 0;
        for moon in moons(&data.x_test, "moon").unwrap() {
            let slices = slice(&data, moon).unwrap();
            let slice_moons = slices.x_test.moon_values("moon").unwrap();
            prop_assert!(slice_moons.iter().all(|m| *m == moon));
            let column_names = slices.x_test.column_names();
            prop_assert_eq!(column_names[0].as_str(), "moon");
            total += slice_moons.len();
        }
        prop_assert_eq!(total, test_moons.len());
    }
}

// ── 4. Scheduler ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn force_first_always_trains(moon in any::<i64>(), frequency in any::<u64>()) {
        prop_assert!(should_train(0, moon, frequency, true));
    }

    #[test]
    fn zero_frequency_never_trains_after_first(index in 1usize..10_000, moon in any::<i64>()) {
        prop_assert!(!should_train(index, moon, 0, false));
        prop_assert!(!should_train(index, moon, 0, true));
    }

    #[test]
    fn periodic_rule_uses_moon_value(
        index in 0usize..10_000,
        moon in -10_000i64..10_000,
        frequency in 1u64..100,
    ) {
        let expected = moon.rem_euclid(frequency as i64) == 0;
        prop_assert_eq!(should_train(index, moon, frequency, false), expected);
    }
}
