//! Exchange Planner — §4.3. Turns an aircraft phase transition into an
//! ordered sequence of utterances.

use crate::model::{Aircraft, AtcPhase, EndpointKind, Exchange, Initiator, Utterance};
use crate::phrases::PhraseCatalogue;
use crate::voice::{pilot_key, VoiceSessionManager};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct PlannerConfig {
    pub say_again_factor: u32,
    pub release_cooldown: Duration,
}

pub struct ExchangePlanner {
    normal: PhraseCatalogue,
    unicom: PhraseCatalogue,
    config: PlannerConfig,
    rng: parking_lot::Mutex<StdRng>,
    voices: Arc<VoiceSessionManager>,
}

impl ExchangePlanner {
    pub fn new(
        normal: PhraseCatalogue,
        unicom: PhraseCatalogue,
        config: PlannerConfig,
        voices: Arc<VoiceSessionManager>,
        seed: u64,
    ) -> Self {
        Self {
            normal,
            unicom,
            config,
            rng: parking_lot::Mutex::new(StdRng::seed_from_u64(seed)),
            voices,
        }
    }

    /// Consumes aircraft transitions from `aircraft_rx` and hands planned
    /// utterance sequences to `on_plan`, one sequence at a time, in
    /// emission order, per §4.3/§5 ordering guarantees.
    pub async fn run<F, Fut>(self: Arc<Self>, mut aircraft_rx: mpsc::Receiver<Aircraft>, on_plan: F)
    where
        F: Fn(Aircraft, Vec<Utterance>) -> Fut,
        Fut: std::future::Future<Output = ()>,
    {
        while let Some(aircraft) = aircraft_rx.recv().await {
            let is_unicom = aircraft.comms.controller_icao.is_none();
            if let Some(utterances) = self.plan(&aircraft, is_unicom) {
                if let Some(AtcPhase::Shutdown) = aircraft.phase.current {
                    self.voices.release_after(
                        pilot_key(&aircraft.comms.callsign),
                        self.config.release_cooldown,
                    );
                }
                on_plan(aircraft, utterances).await;
            }
        }
    }

    /// Builds the ordered utterance sequence for one aircraft transition,
    /// per §4.3 steps 1-4. Returns `None` if the phase has no catalogue
    /// entries (the aircraft is dropped, logged once).
    pub fn plan(&self, aircraft: &Aircraft, unicom: bool) -> Option<Vec<Utterance>> {
        let phase = aircraft.phase.current?;
        let catalogue = if unicom { &self.unicom } else { &self.normal };

        let exchanges = catalogue.exchanges_for(phase);
        let exchanges = match exchanges {
            Some(e) if !e.is_empty() => e,
            _ => {
                tracing::warn!(key = %aircraft.key(), ?phase, "no exchange for phase, dropping");
                return None;
            }
        };

        let exchange = {
            let idx = self.rng.lock().gen_range(0..exchanges.len());
            &exchanges[idx]
        };

        Some(self.expand_sequence(exchange, phase))
    }

    fn expand_sequence(&self, exchange: &Exchange, phase: AtcPhase) -> Vec<Utterance> {
        let mut out = Vec::new();
        let initiator: Initiator = exchange.initiator.into();
        let say_again_roll = self.config.say_again_factor > 0
            && self.rng.lock().gen_range(0..self.config.say_again_factor) == 0;

        match initiator {
            Initiator::Pilot => {
                let pilot_line = exchange.pilot.clone().unwrap_or_default();
                let atc_line = exchange.atc.clone().unwrap_or_default();

                out.push(Utterance {
                    speaker: EndpointKind::Pilot,
                    template: pilot_line.clone(),
                });
                if say_again_roll {
                    out.push(Utterance {
                        speaker: EndpointKind::Atc,
                        template: "{CALLSIGN} say again".to_string(),
                    });
                    out.push(Utterance {
                        speaker: EndpointKind::Pilot,
                        template: pilot_line,
                    });
                }
                out.push(Utterance {
                    speaker: EndpointKind::Atc,
                    template: atc_line.clone(),
                });
                if phase != AtcPhase::Shutdown {
                    out.push(Utterance {
                        speaker: EndpointKind::Pilot,
                        template: derive_readback(&atc_line),
                    });
                }
            }
            Initiator::Atc => {
                let atc_line = exchange.atc.clone().unwrap_or_default();

                out.push(Utterance {
                    speaker: EndpointKind::Atc,
                    template: atc_line.clone(),
                });
                if say_again_roll {
                    out.push(Utterance {
                        speaker: EndpointKind::Pilot,
                        template: "{FACILITY} say again".to_string(),
                    });
                    out.push(Utterance {
                        speaker: EndpointKind::Atc,
                        template: atc_line.clone(),
                    });
                }
                match &exchange.pilot {
                    Some(pilot_line) => out.push(Utterance {
                        speaker: EndpointKind::Pilot,
                        template: pilot_line.clone(),
                    }),
                    None => out.push(Utterance {
                        speaker: EndpointKind::Pilot,
                        template: derive_readback(&atc_line),
                    }),
                }
            }
        }

        out
    }
}

/// Derives a pilot readback from a controller line: strips a leading
/// `{CALLSIGN}`, bracketed fragments, and trailing punctuation, then
/// appends ` {CALLSIGN}`, per spec §4.3.
pub fn derive_readback(controller_line: &str) -> String {
    let mut s = controller_line.trim();
    if let Some(rest) = s.strip_prefix("{CALLSIGN}") {
        s = rest.trim_start();
    }

    let without_brackets = strip_bracketed(s);
    let trimmed = without_brackets
        .trim_end_matches(|c: char| c.is_whitespace() || c == '.' || c == ',' || c == ';')
        .trim();

    format!("{trimmed} {{CALLSIGN}}")
}

/// Removes every `[...]` fragment, collapsing the surrounding whitespace.
fn strip_bracketed(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0u32;
    for c in s.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readback_strips_callsign_brackets_and_punctuation() {
        let line = "{CALLSIGN} [caution] turn left heading 270, contact tower.";
        let readback = derive_readback(line);
        assert!(!readback.starts_with("{CALLSIGN}"));
        assert!(!readback.contains('['));
        assert!(!readback.contains(']'));
        assert!(!readback.trim_end_matches(" {CALLSIGN}").ends_with('.'));
        assert!(readback.ends_with(" {CALLSIGN}"));
    }

    #[test]
    fn readback_with_no_callsign_prefix_still_appends_one() {
        let line = "descend and maintain 3 thousand.";
        let readback = derive_readback(line);
        assert!(readback.ends_with(" {CALLSIGN}"));
        assert!(!readback.starts_with("{CALLSIGN}"));
    }

    proptest::proptest! {
        #[test]
        fn readback_invariants_hold_for_arbitrary_lines(
            prefix in proptest::option::of("\\{CALLSIGN\\}"),
            body in "[a-zA-Z0-9 ,.;\\[\\]]{0,40}",
        ) {
            let line = format!("{}{}", prefix.unwrap_or_default(), body);
            let readback = derive_readback(&line);
            proptest::prop_assert!(!readback.starts_with("{CALLSIGN}"), "readback must not start with placeholder");
            proptest::prop_assert!(!readback.contains('['));
            proptest::prop_assert!(!readback.contains(']'));
            proptest::prop_assert!(readback.ends_with(" {CALLSIGN}"), "readback must end with placeholder");
        }
    }
}
