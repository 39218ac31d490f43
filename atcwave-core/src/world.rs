//! World State & Ingest Contract — §4.2.
//!
//! World State is a set of process-wide, read-mostly records, mutated only
//! by the Ingest collaborator. Readers (the planner, the template
//! expander) observe it through a `parking_lot::RwLock`-guarded snapshot,
//! matching the "atomic pointer swap of the snapshot, or a single-producer
//! guard" guidance of spec §5.

use crate::geo::Point;
use crate::locator::{ControllerLocator, SearchSpec};
use crate::model::{Aircraft, ComSlot, Controller, Frequency, Role, UserState, Weather};
use parking_lot::RwLock;
use std::collections::HashMap;

/// The authoritative, process-wide snapshot of tracked aircraft, user
/// state, and weather.
pub struct WorldState {
    aircraft: RwLock<HashMap<String, Aircraft>>,
    user: RwLock<UserState>,
    weather: RwLock<Weather>,
    /// The simulator's in-sim UTC clock, last reported by the Ingest
    /// collaborator. Drives `{VALEDICTION}` time-of-day wording; defaults
    /// to the Unix epoch until the first tick arrives.
    simulated_time: RwLock<chrono::DateTime<chrono::Utc>>,
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldState {
    pub fn new() -> Self {
        Self {
            aircraft: RwLock::new(HashMap::new()),
            user: RwLock::new(UserState::new()),
            weather: RwLock::new(Weather::default()),
            simulated_time: RwLock::new(chrono::DateTime::from_timestamp(0, 0).unwrap()),
        }
    }

    pub fn simulated_time(&self) -> chrono::DateTime<chrono::Utc> {
        *self.simulated_time.read()
    }

    pub fn set_simulated_time(&self, time: chrono::DateTime<chrono::Utc>) {
        *self.simulated_time.write() = time;
    }

    pub fn aircraft(&self, key: &str) -> Option<Aircraft> {
        self.aircraft.read().get(key).cloned()
    }

    pub fn all_aircraft(&self) -> Vec<Aircraft> {
        self.aircraft.read().values().cloned().collect()
    }

    pub fn user(&self) -> UserState {
        self.user.read().clone()
    }

    pub fn weather(&self) -> Weather {
        self.weather.read().clone()
    }

    pub fn set_weather(&self, weather: Weather) {
        *self.weather.write() = weather;
    }

    pub fn upsert_aircraft(&self, aircraft: Aircraft) {
        self.aircraft.write().insert(aircraft.key(), aircraft);
    }

    pub fn evict_aircraft(&self, key: &str) {
        self.aircraft.write().remove(key);
    }
}

/// The contract the Ingest collaborator (the live dataref bridge, or the
/// mock simulator's driver) must fulfill, per spec §4.2.
pub trait IngestSink: Send + Sync {
    /// Called whenever either COM1/COM2 frequency or facility code
    /// changes. Repopulates `UserState.active_controllers` by invoking the
    /// locator once per COM slot.
    fn notify_user_change(
        &self,
        position: Point,
        altitude_ft: f64,
        tuned: &HashMap<ComSlot, (Frequency, Role)>,
    );

    /// Called exactly once per aircraft phase transition, after the
    /// previous/current phase fields have already been committed.
    fn notify_aircraft_change(&self, aircraft: &Aircraft);

    /// Called when a new (tail, flight-number) pair first appears, or the
    /// flight number of a known tail changes.
    fn add_flight_plan(&self, aircraft: &Aircraft, simulated_time: chrono::DateTime<chrono::Utc>);
}

/// Default `IngestSink` implementation backed by a `WorldState` and a
/// `ControllerDatabase`, shared by both the live bridge and the mock
/// driver so they speak one contract, per SPEC_FULL §4.2.
pub struct WorldIngest<'a> {
    pub world: &'a WorldState,
    pub db: &'a crate::locator::ControllerDatabase,
    pub first_tick: RwLock<bool>,
}

impl<'a> WorldIngest<'a> {
    pub fn new(world: &'a WorldState, db: &'a crate::locator::ControllerDatabase) -> Self {
        Self {
            world,
            db,
            first_tick: RwLock::new(true),
        }
    }
}

impl<'a> IngestSink for WorldIngest<'a> {
    fn notify_user_change(
        &self,
        position: Point,
        altitude_ft: f64,
        tuned: &HashMap<ComSlot, (Frequency, Role)>,
    ) {
        let locator = ControllerLocator::new(self.db);
        let mut user = self.world.user.write();
        user.position = position;
        user.altitude_ft = altitude_ft;
        for (&slot, &(freq, role)) in tuned {
            user.tuned_frequencies.insert(slot, freq);
            user.tuned_roles.insert(slot, role);
            let spec = SearchSpec::new(format!("{slot:?}"), position, altitude_ft)
                .with_frequency(freq)
                .with_role(role);
            let found = locator.locate(&spec).cloned();
            user.active_controllers.insert(slot, found);
        }
    }

    fn notify_aircraft_change(&self, aircraft: &Aircraft) {
        let mut first = self.first_tick.write();
        if *first {
            // Replay begins from a steady state: commit silently.
            *first = false;
            self.world.upsert_aircraft(aircraft.clone());
            return;
        }
        drop(first);
        tracing::debug!(
            key = %aircraft.key(),
            phase = ?aircraft.phase.current,
            "aircraft phase transition"
        );
        self.world.upsert_aircraft(aircraft.clone());
    }

    fn add_flight_plan(&self, aircraft: &Aircraft, simulated_time: chrono::DateTime<chrono::Utc>) {
        tracing::info!(
            key = %aircraft.key(),
            at = %simulated_time,
            "flight plan added"
        );
        self.world.set_simulated_time(simulated_time);
        self.world.upsert_aircraft(aircraft.clone());
    }
}
