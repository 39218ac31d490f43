//! Template Expander — §4.4. Fills placeholders in a planned utterance
//! using World State, the aircraft snapshot, and Controller Locator
//! lookups, then applies the post-expansion cleanup pass.

use crate::locator::{ControllerLocator, SearchSpec};
use crate::model::{
    Aircraft, AtcMessage, AtcPhase, Controller, EndpointKind, Frequency, Utterance, Weather,
};
use crate::tables;
use crate::voice::{atc_key, pilot_key, VoiceSessionManager};
use crate::world::WorldState;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;

/// Airport ICAO -> display name, loaded by `atcwave-sim::airport_parser`.
#[derive(Debug, Clone, Default)]
pub struct AirportDirectory {
    pub names: HashMap<String, String>,
}

impl AirportDirectory {
    pub fn lookup(&self, icao: &str) -> Option<&str> {
        self.names.get(icao).map(|s| s.as_str())
    }
}

pub struct TemplateExpanderConfig {
    pub handoff_valediction_factor: u32,
}

pub struct TemplateExpander {
    db: Arc<crate::locator::ControllerDatabase>,
    airports: Arc<AirportDirectory>,
    voices: Arc<VoiceSessionManager>,
    config: TemplateExpanderConfig,
    rng: parking_lot::Mutex<StdRng>,
}

impl TemplateExpander {
    pub fn new(
        db: Arc<crate::locator::ControllerDatabase>,
        airports: Arc<AirportDirectory>,
        voices: Arc<VoiceSessionManager>,
        config: TemplateExpanderConfig,
        seed: u64,
    ) -> Self {
        Self {
            db,
            airports,
            voices,
            config,
            rng: parking_lot::Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Expands every planned utterance for one exchange into `ATCMessage`s,
    /// resolving the responsible controller once for the whole exchange.
    pub fn expand_all(
        &self,
        world: &WorldState,
        aircraft: &Aircraft,
        phase: AtcPhase,
        utterances: &[Utterance],
    ) -> Vec<AtcMessage> {
        let weather = world.weather();
        let simulated_time = world.simulated_time();
        let locator = ControllerLocator::new(&self.db);
        let spec = SearchSpec::new(
            format!("expand:{}", aircraft.key()),
            aircraft.position,
            aircraft.altitude_ft,
        )
        .with_role(phase.expected_role());
        let spec = match &aircraft.comms.controller_icao {
            Some(icao) => spec.with_icao_hint(icao.clone()),
            None => spec,
        };
        let controller = locator.locate(&spec);

        let Some(controller) = controller else {
            tracing::warn!(key = %aircraft.key(), ?phase, "template expander: no controller, dropping exchange");
            return Vec::new();
        };

        let country_code = tables::icao_to_iso(&controller.icao).to_string();
        let atc_speaker_key = atc_key(&controller.icao, controller.role.label());
        let pilot_speaker_key = pilot_key(&aircraft.comms.callsign);

        utterances
            .iter()
            .map(|utterance| {
                self.expand_one(
                    utterance,
                    aircraft,
                    controller,
                    &weather,
                    simulated_time,
                    phase,
                    &country_code,
                    &atc_speaker_key,
                    &pilot_speaker_key,
                )
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn expand_one(
        &self,
        utterance: &Utterance,
        aircraft: &Aircraft,
        controller: &Controller,
        weather: &Weather,
        simulated_time: chrono::DateTime<chrono::Utc>,
        phase: AtcPhase,
        country_code: &str,
        atc_speaker_key: &str,
        pilot_speaker_key: &str,
    ) -> AtcMessage {
        let (speaker_key, partner_key) = match utterance.speaker {
            EndpointKind::Atc => (atc_speaker_key, pilot_speaker_key),
            EndpointKind::Pilot => (pilot_speaker_key, atc_speaker_key),
        };
        let partner_voice = self.voices.active_voice_for(partner_key);
        let _voice = self.voices.resolve(
            speaker_key,
            utterance.speaker,
            country_code,
            aircraft.position,
            partner_voice.as_deref(),
        );

        let substituted = self.substitute(
            &utterance.template,
            aircraft,
            controller,
            weather,
            simulated_time,
            phase,
            utterance.speaker,
        );
        let text = post_expansion_cleanup(&substituted);

        AtcMessage {
            controller_icao: controller.icao.clone(),
            controller_name: controller.name.clone(),
            role_label: controller.role.label().to_string(),
            aircraft: aircraft.clone(),
            text,
            country_code: country_code.to_string(),
            speaker: utterance.speaker,
        }
    }

    fn substitute(
        &self,
        template: &str,
        aircraft: &Aircraft,
        controller: &Controller,
        weather: &Weather,
        simulated_time: chrono::DateTime<chrono::Utc>,
        phase: AtcPhase,
        speaker: EndpointKind,
    ) -> String {
        let mut out = template.to_string();
        let local_hour = simulated_local_hour(simulated_time, aircraft.position.lon);

        // `{{VALEDICTION}}` forces probability 1; handle before the
        // single-brace form so it isn't matched twice.
        if out.contains("{{VALEDICTION}}") {
            out = out.replace("{{VALEDICTION}}", valediction_word(local_hour));
        }
        if out.contains("{VALEDICTION}") {
            let roll = self.config.handoff_valediction_factor > 0
                && self
                    .rng
                    .lock()
                    .gen_range(0..self.config.handoff_valediction_factor)
                    == 0;
            let value = if roll { valediction_word(local_hour) } else { "" };
            out = out.replace("{VALEDICTION}", value);
        }

        if out.contains("{CALLSIGN}") {
            out = out.replace("{CALLSIGN}", &aircraft.comms.callsign);
        }
        if out.contains("{FACILITY}") {
            out = out.replace("{FACILITY}", &controller.name);
        }
        if out.contains("{SQUAWK}") {
            out = out.replace("{SQUAWK}", &format!("{:04}", aircraft.squawk));
        }
        if out.contains("{RUNWAY}") {
            out = out.replace("{RUNWAY}", &render_runway(aircraft.assigned_runway.as_deref()));
        }
        if out.contains("{PARKING}") {
            out = out.replace(
                "{PARKING}",
                &render_parking(aircraft.assigned_parking.as_deref(), &controller.icao),
            );
        }
        if out.contains("{DESTINATION}") {
            out = out.replace(
                "{DESTINATION}",
                &render_destination(&aircraft.destination, &self.airports),
            );
        }
        if out.contains("{ALTITUDE}") {
            let alt = if aircraft.cleared_altitude_ft > 0.0 {
                aircraft.cleared_altitude_ft
            } else {
                aircraft.altitude_ft
            };
            out = out.replace(
                "{ALTITUDE}",
                &render_altitude(alt, phase, weather.baro.transition_altitude_ft),
            );
        }
        if out.contains("{ALT_CLEARANCE}") {
            out = out.replace(
                "{ALT_CLEARANCE}",
                alt_clearance_word(aircraft.altitude_ft, aircraft.cleared_altitude_ft),
            );
        }
        if out.contains("{HEADING}") {
            let heading = (aircraft.heading.round() as i64).rem_euclid(360);
            out = out.replace("{HEADING}", &format!("{heading:03}"));
        }
        if out.contains("{BARO}") {
            out = out.replace("{BARO}", &render_baro(&controller.icao, weather));
        }
        if out.contains("{WIND}") {
            out = out.replace("{WIND}", &render_wind(weather));
        }
        if out.contains("{SHEAR}") {
            out = out.replace("{SHEAR}", &render_shear(weather));
        }
        if out.contains("{TURBULENCE}") {
            out = out.replace("{TURBULENCE}", &render_turbulence(weather, speaker));
        }
        if out.contains("{HANDOFF}") {
            let handoff = self.render_handoff(aircraft, controller, phase, local_hour);
            out = out.replace("{HANDOFF}", &handoff);
        }

        out
    }

    fn render_handoff(
        &self,
        aircraft: &Aircraft,
        controller: &Controller,
        phase: AtcPhase,
        local_hour: u32,
    ) -> String {
        let Some(next_role) = tables::handoff_next_role(phase) else {
            return String::new();
        };

        let locator = ControllerLocator::new(&self.db);
        let spec = SearchSpec::new(
            format!("handoff:{}", aircraft.key()),
            aircraft.position,
            aircraft.altitude_ft,
        )
        .with_role(next_role)
        .with_icao_hint(controller.icao.clone());

        let Some(next) = locator.locate(&spec) else {
            return String::new();
        };
        let Some(freq) = next.first_frequency() else {
            return String::new();
        };

        let freq_text = render_frequency(freq);
        let valediction_roll = self.config.handoff_valediction_factor > 0
            && self
                .rng
                .lock()
                .gen_range(0..self.config.handoff_valediction_factor)
                == 0;
        let valediction = if valediction_roll {
            valediction_word(local_hour)
        } else {
            ""
        };

        if tables::handoff_includes_facility_name(next_role) {
            format!(
                "[contact] {} {} on {} {}",
                next.name,
                next_role.label(),
                freq_text,
                valediction
            )
        } else {
            format!(
                "[contact] {} on {} {}",
                next_role.label(),
                freq_text,
                valediction
            )
        }
    }
}

fn render_runway(assigned: Option<&str>) -> String {
    let Some(assigned) = assigned else {
        return String::new();
    };
    let digits: String = assigned.chars().filter(|c| c.is_ascii_digit()).collect();
    let side = assigned.chars().find(|c| matches!(c, 'L' | 'R' | 'l' | 'r'));
    match side {
        Some('L') | Some('l') => format!("{digits} left"),
        Some('R') | Some('r') => format!("{digits} right"),
        _ => digits,
    }
}

fn render_parking(assigned: Option<&str>, icao: &str) -> String {
    let Some(assigned) = assigned else {
        return String::new();
    };
    let upper = assigned.to_ascii_uppercase();
    if upper == "RAMP" || upper == "APRON" {
        return upper.to_ascii_lowercase();
    }
    let label = if tables::is_north_american(icao) {
        "gate"
    } else {
        "stand"
    };
    if assigned.len() == 1 {
        if let Some(phonetic) = phonetic_letter(assigned.chars().next().unwrap()) {
            return format!("{label} {phonetic}");
        }
    }
    format!("{label} {assigned}")
}

fn phonetic_letter(c: char) -> Option<&'static str> {
    Some(match c.to_ascii_uppercase() {
        'A' => "Alpha",
        'B' => "Bravo",
        'C' => "Charlie",
        'D' => "Delta",
        'E' => "Echo",
        'F' => "Foxtrot",
        'G' => "Golf",
        'H' => "Hotel",
        'I' => "India",
        'J' => "Juliett",
        'K' => "Kilo",
        'L' => "Lima",
        'M' => "Mike",
        'N' => "November",
        'O' => "Oscar",
        'P' => "Papa",
        'Q' => "Quebec",
        'R' => "Romeo",
        'S' => "Sierra",
        'T' => "Tango",
        'U' => "Uniform",
        'V' => "Victor",
        'W' => "Whiskey",
        'X' => "X-ray",
        'Y' => "Yankee",
        'Z' => "Zulu",
        _ => return None,
    })
}

fn render_destination(icao: &str, airports: &AirportDirectory) -> String {
    if let Some(name) = airports.lookup(icao) {
        let mut stripped = name.to_string();
        loop {
            let before = stripped.len();
            for suffix in [" Intl", " Arpt", " Airport", " Regional", " Municipal"] {
                if let Some(trimmed) = stripped.strip_suffix(suffix) {
                    stripped = trimmed.to_string();
                }
            }
            if stripped.len() == before {
                break;
            }
        }
        return stripped;
    }
    icao.chars()
        .filter_map(phonetic_letter)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rounds to the nearest multiple of `nearest`.
fn round_to(value: f64, nearest: f64) -> f64 {
    (value / nearest).round() * nearest
}

fn render_altitude(alt_ft: f64, phase: AtcPhase, transition_altitude_ft: f64) -> String {
    let rounded = if matches!(phase, AtcPhase::Final | AtcPhase::Approach) {
        round_to(alt_ft, 100.0)
    } else {
        round_to(alt_ft, 1000.0)
    };

    if rounded >= transition_altitude_ft || rounded >= 18000.0 {
        let fl = round_to(rounded / 100.0, 10.0) as i64;
        return format!("flight level {fl:03}");
    }

    let thousands = (rounded / 1000.0) as i64;
    let hundreds = ((rounded as i64) % 1000) / 100;
    if hundreds > 0 {
        format!("{thousands} thousand {hundreds} hundred")
    } else {
        format!("{thousands} thousand")
    }
}

fn alt_clearance_word(current_ft: f64, cleared_ft: f64) -> &'static str {
    if cleared_ft > current_ft + 1.0 {
        "climb to"
    } else if cleared_ft < current_ft - 1.0 {
        "descend to"
    } else {
        "maintain"
    }
}

fn render_baro(icao: &str, weather: &Weather) -> String {
    if tables::is_north_american(icao) {
        let in_hg_x100 = (weather.baro.flight_pa / 3386.39 * 100.0).round() as i64;
        format!("altimeter {in_hg_x100:04}")
    } else {
        let hpa = (weather.baro.sea_level_pa / 100.0).round() as i64;
        format!("QNH {hpa:04}")
    }
}

fn render_wind(weather: &Weather) -> String {
    let speed_kt = weather.wind.speed_mps * 1.94384;
    if speed_kt < 4.0 {
        return "calm".to_string();
    }
    let dir = round_to(weather.wind.direction_deg, 10.0) as i64;
    let dir = dir.rem_euclid(360);
    let base = format!("{dir:03} at {} knots", speed_kt.round() as i64);

    let gust_kt = weather.turbulence * 25.0;
    if gust_kt > speed_kt + 9.0 {
        let gust = (speed_kt + gust_kt).round() as i64;
        format!("{base} gusting {gust}")
    } else {
        base
    }
}

fn render_shear(weather: &Weather) -> String {
    let shear_kt = round_to(weather.wind.shear_mps * 1.94384, 5.0);
    if shear_kt >= 15.0 {
        format!("[caution] wind shear [alert, loss or gain of] {} knots", shear_kt as i64)
    } else {
        String::new()
    }
}

fn render_turbulence(weather: &Weather, speaker: EndpointKind) -> String {
    if weather.turbulence < 0.4 {
        return String::new();
    }
    let severity = if weather.turbulence >= 0.7 {
        "severe"
    } else {
        "moderate"
    };
    match speaker {
        EndpointKind::Pilot => format!("{severity} turbulence"),
        EndpointKind::Atc => format!("report of {severity} turbulence"),
    }
}

fn render_frequency(freq: Frequency) -> String {
    let whole = freq.0 / 1000;
    let frac = freq.0 % 1000;
    format!("{whole} decimal {frac:03}")
}

/// Approximates local time of day from the simulated UTC clock and the
/// speaker's longitude (15 degrees per hour), for `{VALEDICTION}` wording.
fn simulated_local_hour(simulated_time: chrono::DateTime<chrono::Utc>, lon_deg: f64) -> u32 {
    use chrono::Timelike;
    let offset_hours = (lon_deg / 15.0).round() as i64;
    let local = simulated_time + chrono::Duration::hours(offset_hours);
    local.hour()
}

fn valediction_word(hour: u32) -> &'static str {
    match hour {
        5..=16 => "good day",
        17..=20 => "good evening",
        _ => "good night",
    }
}

/// Post-expansion cleanup: strip bracket characters (keeping their
/// contents), collapse whitespace and `". ."` runs, and translate every
/// digit character to its English word. Digit translation is applied
/// unconditionally — non-English voices never skip it either.
fn post_expansion_cleanup(text: &str) -> String {
    let no_brackets: String = text.chars().filter(|&c| c != '[' && c != ']').collect();
    let collapsed = no_brackets.replace(". .", ".");
    let collapsed = collapsed.split_whitespace().collect::<Vec<_>>().join(" ");

    collapsed
        .chars()
        .map(|c| match tables::digit_word(c) {
            Some(word) => format!("{word} "),
            None => c.to_string(),
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn altitude_below_transition_renders_thousands() {
        assert_eq!(render_altitude(5400.0, AtcPhase::ClimbOut, 18000.0), "5 thousand");
        assert_eq!(render_altitude(5450.0, AtcPhase::Final, 18000.0), "5 thousand 5 hundred");
    }

    #[test]
    fn altitude_at_or_above_transition_renders_flight_level() {
        let rendered = render_altitude(21000.0, AtcPhase::Cruise, 18000.0);
        assert!(rendered.starts_with("flight level"));
    }

    #[test]
    fn wind_below_four_knots_is_calm() {
        let mut w = Weather::default();
        w.wind.speed_mps = 1.0;
        assert_eq!(render_wind(&w), "calm");
    }

    #[test]
    fn digits_are_translated_to_words() {
        let cleaned = post_expansion_cleanup("squawk 7000");
        assert_eq!(cleaned, "squawk seven zero zero zero");
    }

    #[test]
    fn brackets_are_stripped_but_content_kept() {
        let cleaned = post_expansion_cleanup("[contact] tower");
        assert_eq!(cleaned, "contact tower");
    }

    #[test]
    fn simulated_local_hour_shifts_with_longitude() {
        let utc_noon = chrono::DateTime::from_timestamp(12 * 3600, 0).unwrap();
        assert_eq!(simulated_local_hour(utc_noon, 0.0), 12);
        assert_eq!(simulated_local_hour(utc_noon, -150.0), 2);
    }
}
