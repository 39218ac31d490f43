//! apt.dat-style airport data parser — §6 "Airport data (consumed)".
//!
//! Record codes: 1/16/17 are airport headers (ICAO at field 4, name from
//! field 5 on); 100/101/102 are runway/taxiway endpoints, used only to
//! approximate an airport's center when no frequency-tagged facility pins
//! one down; 1051-1056 are Unicom/Delivery/Ground/Tower/Approach/Departure
//! frequencies, each keyed to the airport header most recently seen.
//! Heliports (`[H]`) and seaports (`[X]`) are skipped, per spec.

use atcwave_core::geo::Point;
use atcwave_core::model::{Controller, Facility, Frequency, Role};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct AirportRecord {
    pub icao: String,
    pub name: String,
    pub runway_points: Vec<Point>,
    pub frequencies: HashMap<Role, Vec<Frequency>>,
}

impl AirportRecord {
    fn center(&self) -> Option<Point> {
        if self.runway_points.is_empty() {
            return None;
        }
        let count = self.runway_points.len() as f64;
        let lat = self.runway_points.iter().map(|p| p.lat).sum::<f64>() / count;
        let lon = self.runway_points.iter().map(|p| p.lon).sum::<f64>() / count;
        Some(Point::new(lat, lon))
    }
}

/// Parsed airport data: per-ICAO name lookup plus the point-facility
/// controllers derived from frequency records.
pub struct ParsedAirports {
    pub names: HashMap<String, String>,
    pub controllers: Vec<Controller>,
}

pub fn parse(contents: &str) -> ParsedAirports {
    let mut records: HashMap<String, AirportRecord> = HashMap::new();
    let mut current_icao: Option<String> = None;

    for line in contents.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let Some(code) = fields.first() else { continue };

        match *code {
            "1" | "16" | "17" => {
                let Some(icao) = fields.get(4) else { continue };
                if icao.starts_with("[H]") || icao.starts_with("[X]") {
                    current_icao = None;
                    continue;
                }
                let name = fields.get(5..).map(|rest| rest.join(" ")).unwrap_or_default();
                let record = records.entry(icao.to_string()).or_default();
                record.icao = icao.to_string();
                record.name = name;
                current_icao = Some(icao.to_string());
            }
            "100" | "101" | "102" => {
                let Some(icao) = &current_icao else { continue };
                let (Some(lat), Some(lon)) = (
                    fields.get(9).and_then(|s| s.parse::<f64>().ok()),
                    fields.get(10).and_then(|s| s.parse::<f64>().ok()),
                ) else {
                    continue;
                };
                if let Some(record) = records.get_mut(icao) {
                    record.runway_points.push(Point::new(lat, lon));
                }
            }
            "1051" | "1052" | "1053" | "1054" | "1055" | "1056" => {
                let Some(icao) = &current_icao else { continue };
                let Some(freq_raw) = fields.get(1).and_then(|s| s.parse::<f64>().ok()) else {
                    continue;
                };
                let role = match *code {
                    "1051" => Role::Unicom,
                    "1052" => Role::Delivery,
                    "1053" => Role::Ground,
                    "1054" => Role::Tower,
                    "1055" => Role::Approach,
                    "1056" => Role::Departure,
                    _ => unreachable!(),
                };
                let freq = Frequency::from_mhz(freq_raw / 1000.0);
                if let Some(record) = records.get_mut(icao) {
                    record.frequencies.entry(role).or_default().push(freq);
                }
            }
            _ => {}
        }
    }

    let mut names = HashMap::new();
    let mut controllers = Vec::new();

    for record in records.values() {
        names.insert(record.icao.clone(), record.name.clone());
        let Some(position) = record.center() else { continue };

        let mut frequencies = record.frequencies.clone();
        // Tower/Unicom imply Ground and Delivery are reachable on the same
        // strip, per spec, when no dedicated frequency is published.
        if let Some(fallback) = frequencies
            .get(&Role::Tower)
            .or_else(|| frequencies.get(&Role::Unicom))
            .cloned()
        {
            frequencies.entry(Role::Ground).or_insert_with(|| fallback.clone());
            frequencies.entry(Role::Delivery).or_insert_with(|| fallback.clone());
        }

        for (role, freqs) in frequencies {
            controllers.push(Controller {
                name: record.name.clone(),
                icao: record.icao.clone(),
                role,
                frequencies: freqs,
                facility: Facility::Point { position },
            });
        }
    }

    ParsedAirports { names, controllers }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tower_frequency_implies_ground_and_delivery() {
        let data = "\
1 0 0 0 KPDX Portland Intl\n\
100 50 1 0 0 0 0 0 0 45.588 -122.597 0 0 0 0 0 0 0 0\n\
1054 118300 0 0 0 Portland Tower\n";
        let parsed = parse(data);
        let tower = parsed
            .controllers
            .iter()
            .find(|c| c.icao == "KPDX" && c.role == Role::Tower)
            .unwrap();
        assert_eq!(tower.frequencies[0], Frequency::from_mhz(118.3));
        assert!(parsed
            .controllers
            .iter()
            .any(|c| c.icao == "KPDX" && c.role == Role::Ground));
        assert!(parsed
            .controllers
            .iter()
            .any(|c| c.icao == "KPDX" && c.role == Role::Delivery));
    }

    #[test]
    fn heliports_are_skipped() {
        let data = "\
1 0 0 0 [H]KXYZ Some Heliport\n\
1054 118300 0 0 0 Heliport Tower\n";
        let parsed = parse(data);
        assert!(parsed.controllers.is_empty());
    }
}
