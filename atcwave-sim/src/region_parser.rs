//! Region/controller text format parser — §6 "Region data (consumed)".
//!
//! Line-oriented keyword format: `CONTROLLER` opens a block closed by
//! `CONTROLLER_END`; `NAME`, `FACILITY_ID`/`ICAO`, `ROLE`, `FREQ`/`CHAN`
//! set scalar fields; `AIRSPACE_POLYGON_BEGIN floor ceiling` / `POINT lat
//! lon` / `AIRSPACE_POLYGON_END` accumulate one airspace. `#` starts a
//! comment line.

use atcwave_core::geo::Point;
use atcwave_core::model::{Airspace, Controller, Facility, Frequency, Role};

fn role_from_keyword(word: &str) -> Option<Role> {
    match word.to_ascii_lowercase().as_str() {
        "del" => Some(Role::Delivery),
        "gnd" => Some(Role::Ground),
        "twr" => Some(Role::Tower),
        "tracon" => Some(Role::Approach),
        "ctr" => Some(Role::Center),
        _ => None,
    }
}

#[derive(Default)]
struct Block {
    name: Option<String>,
    icao: Option<String>,
    role: Option<Role>,
    frequency: Option<Frequency>,
    airspaces: Vec<Airspace>,
}

pub fn parse(contents: &str) -> Vec<Controller> {
    let mut controllers = Vec::new();
    let mut block: Option<Block> = None;
    let mut polygon: Option<(i32, i32, Vec<Point>)> = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else { continue };
        let rest: Vec<&str> = parts.collect();

        match keyword {
            "CONTROLLER" => block = Some(Block::default()),
            "NAME" => {
                if let Some(b) = block.as_mut() {
                    b.name = Some(rest.join(" "));
                }
            }
            "FACILITY_ID" | "ICAO" => {
                if let Some(b) = block.as_mut() {
                    b.icao = rest.first().map(|s| s.to_string());
                }
            }
            "ROLE" => {
                if let Some(b) = block.as_mut() {
                    b.role = rest.first().and_then(|w| role_from_keyword(w));
                }
            }
            "FREQ" | "CHAN" => {
                if let Some(b) = block.as_mut() {
                    b.frequency = rest
                        .first()
                        .and_then(|s| s.parse::<f64>().ok())
                        .map(Frequency::from_mhz);
                }
            }
            "AIRSPACE_POLYGON_BEGIN" => {
                let floor = rest.first().and_then(|s| s.parse::<i32>().ok()).unwrap_or(0);
                let ceiling = rest
                    .get(1)
                    .and_then(|s| s.parse::<i32>().ok())
                    .unwrap_or(60000);
                polygon = Some((floor, ceiling, Vec::new()));
            }
            "POINT" => {
                if let Some((_, _, points)) = polygon.as_mut() {
                    let (Some(lat), Some(lon)) = (
                        rest.first().and_then(|s| s.parse::<f64>().ok()),
                        rest.get(1).and_then(|s| s.parse::<f64>().ok()),
                    ) else {
                        continue;
                    };
                    points.push(Point::new(lat, lon));
                }
            }
            "AIRSPACE_POLYGON_END" => {
                if let (Some(b), Some((floor, ceiling, points))) = (block.as_mut(), polygon.take()) {
                    b.airspaces.push(Airspace::new(floor, ceiling, points));
                }
            }
            "CONTROLLER_END" => {
                if let Some(b) = block.take() {
                    let (Some(icao), Some(role)) = (b.icao, b.role) else {
                        continue;
                    };
                    controllers.push(Controller {
                        name: b.name.unwrap_or_default(),
                        icao,
                        role,
                        frequencies: b.frequency.into_iter().collect(),
                        facility: Facility::Region {
                            airspaces: b.airspaces,
                        },
                    });
                }
            }
            _ => {}
        }
    }

    controllers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_center_block_with_one_polygon() {
        let data = "\
# a center\n\
CONTROLLER\n\
NAME London Control\n\
ICAO EGTT\n\
ROLE ctr\n\
FREQ 129.420\n\
AIRSPACE_POLYGON_BEGIN 0 66000\n\
POINT 49.0 -6.0\n\
POINT 49.0 2.0\n\
POINT 55.0 2.0\n\
AIRSPACE_POLYGON_END\n\
CONTROLLER_END\n";
        let controllers = parse(data);
        assert_eq!(controllers.len(), 1);
        assert_eq!(controllers[0].icao, "EGTT");
        assert_eq!(controllers[0].role, Role::Center);
        assert!(controllers[0].is_region());
    }

    #[test]
    fn block_without_icao_or_role_is_dropped() {
        let data = "CONTROLLER\nNAME Nowhere\nCONTROLLER_END\n";
        assert!(parse(data).is_empty());
    }
}
