//! Geodesic primitives: distance, dateline-aware point-in-polygon, rough area.
//!
//! See spec §4.1 "Geometric contracts". Distance uses the haversine formula
//! on a 3440.06 NM-radius sphere; polygon tests normalize longitude across
//! the 180°/-180° meridian before testing.

/// Mean earth radius in nautical miles, as specified.
pub const EARTH_RADIUS_NM: f64 = 3440.06;

/// A geographic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl Default for Point {
    fn default() -> Self {
        Self { lat: 0.0, lon: 0.0 }
    }
}

/// Great-circle distance between two points, in nautical miles.
pub fn haversine_nm(a: Point, b: Point) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = lat2 - lat1;
    let dlon = wrap_longitude_delta(b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().clamp(-1.0, 1.0).asin();
    EARTH_RADIUS_NM * c
}

/// Wraps a longitude difference into (-180, 180].
fn wrap_longitude_delta(mut delta: f64) -> f64 {
    while delta > 180.0 {
        delta -= 360.0;
    }
    while delta <= -180.0 {
        delta += 360.0;
    }
    delta
}

/// Shifts `lon` toward `reference` by whole revolutions, so consecutive
/// polygon vertices never appear to span more than 180 degrees of
/// longitude. Used to make ray-casting and the shoelace formula dateline-
/// safe.
fn dateline_align(lon: f64, reference: f64) -> f64 {
    let mut adjusted = lon;
    while adjusted - reference > 180.0 {
        adjusted -= 360.0;
    }
    while adjusted - reference < -180.0 {
        adjusted += 360.0;
    }
    adjusted
}

/// Ray-casting point-in-polygon test, dateline-aware: each edge's longitude
/// is re-aligned relative to the test point's longitude before the
/// crossing test, per spec §4.1.
pub fn point_in_polygon(pt: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let n = polygon.len();
    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];

        let a_lon = dateline_align(a.lon, pt.lon);
        let b_lon = dateline_align(b.lon, pt.lon);

        let crosses = (a.lat > pt.lat) != (b.lat > pt.lat);
        if crosses {
            let x_at_lat = a_lon + (pt.lat - a.lat) / (b.lat - a.lat) * (b_lon - a_lon);
            if pt.lon < x_at_lat {
                inside = !inside;
            }
        }
    }
    inside
}

/// Rough (not physically meaningful, but monotone for sorting by size)
/// polygon area via the shoelace formula over dateline-normalized
/// longitudes.
pub fn rough_area(polygon: &[Point]) -> f64 {
    if polygon.len() < 3 {
        return 0.0;
    }
    let reference = polygon[0].lon;
    let normalized: Vec<Point> = polygon
        .iter()
        .map(|p| Point::new(p.lat, dateline_align(p.lon, reference)))
        .collect();

    let n = normalized.len();
    let mut sum = 0.0;
    for i in 0..n {
        let a = normalized[i];
        let b = normalized[(i + 1) % n];
        sum += a.lon * b.lat - b.lon * a.lat;
    }
    (sum / 2.0).abs()
}

/// Axis-aligned bounding box, dateline-normalized relative to the first
/// vertex, precomputed once when a polygon is loaded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn from_polygon(polygon: &[Point]) -> Option<Self> {
        let first = polygon.first()?;
        let reference = first.lon;
        let mut min_lat = f64::MAX;
        let mut max_lat = f64::MIN;
        let mut min_lon = f64::MAX;
        let mut max_lon = f64::MIN;
        for p in polygon {
            let lon = dateline_align(p.lon, reference);
            min_lat = min_lat.min(p.lat);
            max_lat = max_lat.max(p.lat);
            min_lon = min_lon.min(lon);
            max_lon = max_lon.max(lon);
        }
        Some(Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        })
    }

    /// Cheap reject before the full ray-casting test.
    pub fn contains(&self, pt: Point) -> bool {
        let lon = dateline_align(pt.lon, self.min_lon);
        pt.lat >= self.min_lat && pt.lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        let p = Point::new(51.5, -0.1);
        assert!(haversine_nm(p, p) < 1e-9);
    }

    #[test]
    fn known_distance_roughly_matches() {
        // Heathrow to Gatwick is about 23-24 NM.
        let lhr = Point::new(51.4706, -0.4619);
        let lgw = Point::new(51.1481, -0.1903);
        let d = haversine_nm(lhr, lgw);
        assert!((20.0..27.0).contains(&d), "got {d}");
    }

    #[test]
    fn square_contains_center() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 2.0),
            Point::new(2.0, 2.0),
            Point::new(2.0, 0.0),
        ];
        assert!(point_in_polygon(Point::new(1.0, 1.0), &square));
        assert!(!point_in_polygon(Point::new(5.0, 5.0), &square));
    }

    #[test]
    fn dateline_crossing_polygon_contains_point_near_180() {
        // A box straddling the antimeridian: 170E to -170E (190E).
        let polygon = [
            Point::new(-1.0, 170.0),
            Point::new(-1.0, -170.0),
            Point::new(1.0, -170.0),
            Point::new(1.0, 170.0),
        ];
        assert!(point_in_polygon(Point::new(0.0, 179.5), &polygon));
        assert!(point_in_polygon(Point::new(0.0, -179.5), &polygon));
        assert!(!point_in_polygon(Point::new(0.0, 0.0), &polygon));
    }

    #[test]
    fn rough_area_is_positive_and_monotone() {
        let small = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 0.0),
        ];
        let big = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 4.0),
            Point::new(4.0, 4.0),
            Point::new(4.0, 0.0),
        ];
        assert!(rough_area(&small) > 0.0);
        assert!(rough_area(&big) > rough_area(&small));
    }
}
