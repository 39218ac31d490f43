//! Controller Locator — §4.1. A single linear-scan query engine over the
//! immutable controller database.

use crate::geo::{haversine_nm, Point};
use crate::model::{Controller, Facility, Frequency, Role};

/// Read-only database of controllers, built once at startup.
#[derive(Debug, Default)]
pub struct ControllerDatabase {
    controllers: Vec<Controller>,
}

impl ControllerDatabase {
    pub fn new(controllers: Vec<Controller>) -> Self {
        Self { controllers }
    }

    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

/// A locator query. `label` is for logging only, `frequency` of zero or
/// `role` of `None` mean "any".
#[derive(Debug, Clone)]
pub struct SearchSpec {
    pub label: String,
    pub frequency: Frequency,
    pub role: Option<Role>,
    pub position: Point,
    pub altitude_ft: f64,
    pub icao_hint: Option<String>,
}

impl SearchSpec {
    pub fn new(label: impl Into<String>, position: Point, altitude_ft: f64) -> Self {
        Self {
            label: label.into(),
            frequency: Frequency::from_raw(0),
            role: None,
            position,
            altitude_ft,
            icao_hint: None,
        }
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_icao_hint(mut self, icao: impl Into<String>) -> Self {
        self.icao_hint = Some(icao.into());
        self
    }
}

/// A point-facility candidate, tracked while scanning.
struct PointCandidate<'a> {
    controller: &'a Controller,
    distance_nm: f64,
}

/// A region-facility candidate, tracked while scanning.
struct RegionCandidate<'a> {
    controller: &'a Controller,
    area: f64,
}

/// Tie-break threshold: a point match at or under this range beats any
/// polygon match outright, per spec §4.1 step 5.
const POINT_BEATS_POLYGON_NM: f64 = 2.0;

pub struct ControllerLocator<'a> {
    db: &'a ControllerDatabase,
}

impl<'a> ControllerLocator<'a> {
    pub fn new(db: &'a ControllerDatabase) -> Self {
        Self { db }
    }

    /// Returns the single best matching controller, or `None`. Never
    /// errors, per spec §7.
    pub fn locate(&self, spec: &SearchSpec) -> Option<&'a Controller> {
        if let Some(found) = self.scan(spec, None) {
            return Some(found);
        }
        if let Some(icao) = &spec.icao_hint {
            return self.scan(spec, Some(icao.as_str()));
        }
        None
    }

    fn scan(&self, spec: &SearchSpec, icao_filter: Option<&str>) -> Option<&'a Controller> {
        let mut best_point: Option<PointCandidate<'a>> = None;
        let mut best_region: Option<RegionCandidate<'a>> = None;

        for controller in self.db.controllers() {
            if let Some(role) = spec.role {
                if controller.role != role {
                    continue;
                }
            }
            if !controller.matches_frequency(spec.frequency) {
                continue;
            }
            if let Some(icao) = icao_filter {
                if controller.icao != icao {
                    continue;
                }
            }

            match &controller.facility {
                Facility::Point { position } => {
                    let distance = haversine_nm(spec.position, *position);
                    if distance <= controller.role.max_range_nm()
                        && best_point
                            .as_ref()
                            .map(|c| distance < c.distance_nm)
                            .unwrap_or(true)
                    {
                        best_point = Some(PointCandidate {
                            controller,
                            distance_nm: distance,
                        });
                    }
                }
                Facility::Region { airspaces } => {
                    for airspace in airspaces {
                        if !airspace.altitude_in_range(spec.altitude_ft) {
                            continue;
                        }
                        let bbox_reject = airspace
                            .bbox
                            .map(|b| !b.contains(spec.position))
                            .unwrap_or(false);
                        if bbox_reject {
                            continue;
                        }
                        if crate::geo::point_in_polygon(spec.position, &airspace.points)
                            && best_region
                                .as_ref()
                                .map(|c| airspace.rough_area < c.area)
                                .unwrap_or(true)
                        {
                            best_region = Some(RegionCandidate {
                                controller,
                                area: airspace.rough_area,
                            });
                        }
                    }
                }
            }
        }

        match (best_point, best_region) {
            (Some(p), Some(r)) => {
                if p.distance_nm <= POINT_BEATS_POLYGON_NM {
                    Some(p.controller)
                } else {
                    Some(r.controller)
                }
            }
            (Some(p), None) => Some(p.controller),
            (None, Some(r)) => Some(r.controller),
            (None, None) => {
                tracing::debug!(label = %spec.label, "controller locator: no match");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Airspace, Facility};

    fn point_controller(name: &str, icao: &str, role: Role, freq_mhz: f64, pos: Point) -> Controller {
        Controller {
            name: name.to_string(),
            icao: icao.to_string(),
            role,
            frequencies: vec![Frequency::from_mhz(freq_mhz)],
            facility: Facility::Point { position: pos },
        }
    }

    fn region_controller(
        name: &str,
        icao: &str,
        role: Role,
        floor_ft: i32,
        ceiling_ft: i32,
        points: Vec<Point>,
    ) -> Controller {
        Controller {
            name: name.to_string(),
            icao: icao.to_string(),
            role,
            frequencies: vec![],
            facility: Facility::Region {
                airspaces: vec![Airspace::new(floor_ft, ceiling_ft, points)],
            },
        }
    }

    #[test]
    fn heathrow_tower_by_frequency() {
        let db = ControllerDatabase::new(vec![point_controller(
            "Heathrow Tower",
            "EGLL",
            Role::Tower,
            118.505,
            Point::new(51.4706, -0.4522),
        )]);
        let locator = ControllerLocator::new(&db);
        let spec = SearchSpec::new("test", Point::new(51.4706, -0.4522), 1000.0)
            .with_frequency(Frequency::from_mhz(118.505))
            .with_role(Role::Tower);
        let found = locator.locate(&spec).expect("expected a match");
        assert_eq!(found.icao, "EGLL");
        assert_eq!(found.role, Role::Tower);
    }

    #[test]
    fn london_center_by_polygon() {
        let points = vec![
            Point::new(49.0, -6.0),
            Point::new(49.0, 2.0),
            Point::new(55.0, 2.0),
            Point::new(55.0, -6.0),
        ];
        let db = ControllerDatabase::new(vec![region_controller(
            "London Control",
            "EGTT",
            Role::Center,
            0,
            60000,
            points,
        )]);
        let locator = ControllerLocator::new(&db);
        let spec = SearchSpec::new("test", Point::new(51.5, -0.1), 20000.0).with_role(Role::Center);
        let found = locator.locate(&spec).expect("expected a match");
        assert_eq!(found.icao, "EGTT");
        assert_eq!(found.role, Role::Center);
    }

    #[test]
    fn southern_ocean_void_returns_none() {
        let db = ControllerDatabase::new(vec![point_controller(
            "Heathrow Tower",
            "EGLL",
            Role::Tower,
            118.505,
            Point::new(51.4706, -0.4522),
        )]);
        let locator = ControllerLocator::new(&db);
        let spec = SearchSpec::new("test", Point::new(-80.0, 60.0), 35000.0).with_role(Role::Center);
        assert!(locator.locate(&spec).is_none());
    }

    #[test]
    fn icao_hint_is_a_second_chance_only() {
        let far_away = point_controller(
            "Shoreham Ground",
            "EGKA",
            Role::Ground,
            0.0,
            Point::new(50.835, -0.297),
        );
        let db = ControllerDatabase::new(vec![far_away]);
        let locator = ControllerLocator::new(&db);
        // Way out of range for an unrestricted scan; only the hint saves it.
        let spec = SearchSpec::new("test", Point::new(10.0, 10.0), 50.0)
            .with_role(Role::Ground)
            .with_icao_hint("EGKA");
        assert!(locator.locate(&spec).is_none());
    }

    #[test]
    fn shoreham_ground_by_proximity() {
        let db = ControllerDatabase::new(vec![point_controller(
            "Shoreham Ground",
            "EGKA",
            Role::Ground,
            121.6,
            Point::new(50.835, -0.297),
        )]);
        let locator = ControllerLocator::new(&db);
        let spec = SearchSpec::new("test", Point::new(50.835, -0.297), 50.0).with_role(Role::Ground);
        let found = locator.locate(&spec).expect("proximity match at the query point");
        assert_eq!(found.icao, "EGKA");
        assert_eq!(found.role, Role::Ground);
    }

    #[test]
    fn point_within_two_nm_beats_smaller_polygon() {
        let tower = point_controller(
            "Tiny Tower",
            "ABCD",
            Role::Tower,
            0.0,
            Point::new(0.0, 0.0),
        );
        let polygon = vec![
            Point::new(-0.01, -0.01),
            Point::new(-0.01, 0.01),
            Point::new(0.01, 0.01),
            Point::new(0.01, -0.01),
        ];
        let approach = region_controller("Tiny Approach", "ABCD", Role::Approach, 0, 99999, polygon);
        // Mixed roles: use role=None so both candidate classes compete.
        let mut tower_any_role = tower;
        tower_any_role.role = Role::Approach;
        let db = ControllerDatabase::new(vec![tower_any_role, approach]);
        let locator = ControllerLocator::new(&db);
        let spec = SearchSpec::new("test", Point::new(0.0, 0.0), 5000.0).with_role(Role::Approach);
        let found = locator.locate(&spec).unwrap();
        assert_eq!(found.name, "Tiny Tower");
    }
}
