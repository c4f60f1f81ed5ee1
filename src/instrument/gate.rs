// Note gate - attack/release symmetry across trigger sources
// A key is attacked at most once until it is released, whoever triggers it

use super::{Instrument, InstrumentAdapter, InstrumentError, InstrumentRegistry};
use crate::pitch;
use std::collections::{BTreeSet, HashMap};

/// Per-instrument active keys in front of the instrument registry
///
/// Pitched instruments key on canonical pitch identifiers, so "C#4" and
/// "Db4" are the same key. Noise instruments key on the raw label.
#[derive(Default)]
pub struct NoteGate {
    instruments: InstrumentRegistry,
    active: HashMap<String, BTreeSet<String>>,
}

impl NoteGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instrument under `name`
    ///
    /// Replacing an instrument forgets its active keys without releasing
    /// them; release them first if they may still sound.
    pub fn register(&mut self, name: impl Into<String>, instrument: Instrument) {
        let name = name.into();
        self.active.remove(&name);
        self.instruments.register(name, instrument);
    }

    pub fn instruments(&self) -> &InstrumentRegistry {
        &self.instruments
    }

    /// Instrument names in registration order
    pub fn instrument_names(&self) -> Vec<String> {
        self.instruments.names().map(str::to_string).collect()
    }

    /// Keys currently held on `instrument`, sorted
    pub fn active_keys(&self, instrument: &str) -> Vec<String> {
        self.active
            .get(instrument)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_active(&self, instrument: &str, label: &str) -> bool {
        let Some(adapter) = self.instruments.get(instrument) else {
            return false;
        };
        key_for(adapter, label)
            .ok()
            .is_some_and(|key| self.active.get(instrument).is_some_and(|set| set.contains(&key)))
    }

    /// Number of held keys across all instruments
    pub fn active_count(&self) -> usize {
        self.active.values().map(BTreeSet::len).sum()
    }

    /// Attack `label` unless it is already held
    ///
    /// Returns whether the adapter was called. Unknown instruments are
    /// ignored. If the adapter fails the key is not recorded as held.
    pub fn attack(
        &mut self,
        instrument: &str,
        label: &str,
        time: f64,
    ) -> Result<bool, InstrumentError> {
        let Some(adapter) = self.instruments.get_mut(instrument) else {
            return Ok(false);
        };

        let key = key_for(adapter, label)?;
        let keys = self.active.entry(instrument.to_string()).or_default();
        if keys.contains(&key) {
            return Ok(false);
        }

        adapter.trigger_attack(label, time)?;
        keys.insert(key);
        Ok(true)
    }

    /// Release `label` if it is held; returns whether the adapter was called
    pub fn release(
        &mut self,
        instrument: &str,
        label: &str,
        time: f64,
    ) -> Result<bool, InstrumentError> {
        let Some(adapter) = self.instruments.get_mut(instrument) else {
            return Ok(false);
        };

        let key = key_for(adapter, label)?;
        let removed = self
            .active
            .get_mut(instrument)
            .is_some_and(|keys| keys.remove(&key));
        if !removed {
            return Ok(false);
        }

        adapter.trigger_release(label, time)?;
        Ok(true)
    }

    /// Forget every held key of `instrument` and silence it
    pub fn release_all(&mut self, instrument: &str, time: f64) -> Result<(), InstrumentError> {
        if let Some(keys) = self.active.get_mut(instrument) {
            keys.clear();
        }
        match self.instruments.get_mut(instrument) {
            Some(adapter) => adapter.release_all(time),
            None => Ok(()),
        }
    }

    /// `release_all` on every instrument
    ///
    /// Every set is emptied even when an adapter fails; the first failure is
    /// returned once all instruments have been visited.
    pub fn release_all_instruments(&mut self, time: f64) -> Result<(), InstrumentError> {
        let mut first_error = None;
        for name in self.instrument_names() {
            if let Err(e) = self.release_all(&name, time) {
                log::warn!("release_all failed on '{}': {}", name, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn key_for(instrument: &Instrument, label: &str) -> Result<String, InstrumentError> {
    if instrument.is_noise() {
        Ok(label.to_string())
    } else {
        Ok(pitch::canonical(label)?)
    }
}
