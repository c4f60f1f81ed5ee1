//! Randomized attack/release sequences against the note gate
//!
//! Whatever the order of manual and sequenced triggers, a key is held at
//! most once, and the adapter only sees a release after an unmatched attack.

use mymusic_roll::{Instrument, InstrumentAdapter, InstrumentError, NoteGate};
use rand::Rng;
use rand::seq::SliceRandom;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Adapter counting how many times each key is currently attacked
#[derive(Clone, Default)]
struct Counter {
    held: Rc<RefCell<HashMap<String, i32>>>,
    noise: bool,
}

impl Counter {
    fn key(&self, label: &str) -> String {
        if self.noise {
            label.to_string()
        } else {
            mymusic_roll::pitch::canonical(label).unwrap()
        }
    }
}

impl InstrumentAdapter for Counter {
    fn trigger_attack(&mut self, label: &str, _time: f64) -> Result<(), InstrumentError> {
        *self.held.borrow_mut().entry(self.key(label)).or_insert(0) += 1;
        Ok(())
    }

    fn trigger_release(&mut self, label: &str, _time: f64) -> Result<(), InstrumentError> {
        *self.held.borrow_mut().entry(self.key(label)).or_insert(0) -= 1;
        Ok(())
    }

    fn release_all(&mut self, _time: f64) -> Result<(), InstrumentError> {
        self.held.borrow_mut().clear();
        Ok(())
    }

    fn is_noise(&self) -> bool {
        self.noise
    }
}

const LABELS: [&str; 8] = ["C4", "C#4", "Db4", "D4", "E4", "Fb4", "B#3", "G2"];
const PIECES: [&str; 3] = ["kick", "snare", "hihat"];

#[test]
fn test_membership_is_zero_or_one() {
    let mut rng = rand::thread_rng();
    let piano = Counter::default();
    let drum = Counter {
        noise: true,
        ..Counter::default()
    };

    let mut gate = NoteGate::new();
    gate.register("piano", Instrument::custom(piano.clone()));
    gate.register("drum", Instrument::custom(drum.clone()));

    for i in 0..5000 {
        let time = i as f64 * 0.01;
        let (name, label, counter) = if rng.gen_bool(0.7) {
            ("piano", *LABELS.choose(&mut rng).unwrap(), &piano)
        } else {
            ("drum", *PIECES.choose(&mut rng).unwrap(), &drum)
        };

        match rng.gen_range(0..10) {
            0..=4 => {
                let was_held = gate.is_active(name, label);
                let attacked = gate.attack(name, label, time).unwrap();
                assert_eq!(attacked, !was_held);
            }
            5..=8 => {
                let was_held = gate.is_active(name, label);
                let released = gate.release(name, label, time).unwrap();
                assert_eq!(released, was_held);
            }
            _ => gate.release_all(name, time).unwrap(),
        }

        // Adapter view matches the gate view
        for (key, count) in counter.held.borrow().iter() {
            assert!((0..=1).contains(count), "{} held {} times", key, count);
        }
        let adapter_held = counter.held.borrow().values().filter(|c| **c == 1).count();
        assert_eq!(adapter_held, gate.active_keys(name).len());
    }
}

#[test]
fn test_release_all_instruments_empties_everything() {
    let mut rng = rand::thread_rng();
    let mut gate = NoteGate::new();
    gate.register("piano", Instrument::custom(Counter::default()));
    gate.register(
        "drum",
        Instrument::custom(Counter {
            noise: true,
            ..Counter::default()
        }),
    );

    for _ in 0..200 {
        gate.attack("piano", LABELS.choose(&mut rng).unwrap(), 0.0)
            .unwrap();
        gate.attack("drum", PIECES.choose(&mut rng).unwrap(), 0.0)
            .unwrap();
    }
    assert!(gate.active_count() > 0);

    gate.release_all_instruments(1.0).unwrap();
    assert_eq!(gate.active_count(), 0);
    assert!(gate.active_keys("piano").is_empty());
    assert!(gate.active_keys("drum").is_empty());
}
