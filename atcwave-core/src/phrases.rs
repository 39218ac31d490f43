//! Phrase Catalogue — parsed exchange templates keyed by ATC phase.
//! Immutable once loaded. See spec §6 "Phrase catalogue (consumed)".

use crate::model::{AtcPhase, Exchange};
use std::collections::HashMap;

/// JSON mapping phase key -> array of exchanges, per spec §6. Loading the
/// JSON itself (file I/O) is a peripheral concern, implemented in
/// `atcwave-sim::phrase_loader`; this module owns the in-memory shape and
/// the phase-key mapping.
#[derive(Debug, Clone, Default)]
pub struct PhraseCatalogue {
    by_phase: HashMap<AtcPhase, Vec<Exchange>>,
}

impl PhraseCatalogue {
    pub fn from_raw(raw: HashMap<String, Vec<Exchange>>) -> Self {
        let mut by_phase = HashMap::new();
        for (key, exchanges) in raw {
            if let Some(phase) = phase_key(&key) {
                by_phase.insert(phase, exchanges);
            } else {
                tracing::warn!(key = %key, "phrase catalogue: unknown phase key, skipping");
            }
        }
        Self { by_phase }
    }

    pub fn exchanges_for(&self, phase: AtcPhase) -> Option<&[Exchange]> {
        self.by_phase.get(&phase).map(|v| v.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.by_phase.is_empty()
    }
}

/// Maps the catalogue's phase key strings to `AtcPhase` variants.
pub fn phase_key(key: &str) -> Option<AtcPhase> {
    Some(match key {
        "pre_flight_parked" => AtcPhase::PreFlightParked,
        "startup" => AtcPhase::Startup,
        "taxi_out" => AtcPhase::TaxiOut,
        "depart" => AtcPhase::Depart,
        "climb_out" => AtcPhase::ClimbOut,
        "cruise" => AtcPhase::Cruise,
        "approach" => AtcPhase::Approach,
        "holding" => AtcPhase::Holding,
        "final" => AtcPhase::Final,
        "go_around" => AtcPhase::GoAround,
        "braking" => AtcPhase::Braking,
        "taxi_in" => AtcPhase::TaxiIn,
        "post_flight_parked" => AtcPhase::PostFlightParked,
        "shutdown" => AtcPhase::Shutdown,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InitiatorField;

    #[test]
    fn unknown_phase_is_skipped_not_fatal() {
        let mut raw = HashMap::new();
        raw.insert(
            "not_a_real_phase".to_string(),
            vec![Exchange {
                id: "x".into(),
                initiator: InitiatorField::Pilot,
                pilot: Some("hi".into()),
                atc: None,
            }],
        );
        let catalogue = PhraseCatalogue::from_raw(raw);
        assert!(catalogue.is_empty());
    }

    #[test]
    fn known_phase_is_retrievable() {
        let mut raw = HashMap::new();
        raw.insert(
            "taxi_out".to_string(),
            vec![Exchange {
                id: "x".into(),
                initiator: InitiatorField::Pilot,
                pilot: Some("ready to taxi".into()),
                atc: Some("taxi to runway".into()),
            }],
        );
        let catalogue = PhraseCatalogue::from_raw(raw);
        assert_eq!(catalogue.exchanges_for(AtcPhase::TaxiOut).unwrap().len(), 1);
    }
}
