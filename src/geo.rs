use crate::models::Location;

pub const OTHER_REGION: &str = "Other";

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Inclusive latitude/longitude rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub const fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

/// Priority-ordered region table. Earlier entries shadow later overlapping ones.
pub const US_STATE_BOXES: &[(BoundingBox, &str)] = &[
    (BoundingBox::new(32.5, 42.0, -124.5, -114.1), "California"),
    (BoundingBox::new(25.8, 36.5, -106.7, -93.5), "Texas"),
    (BoundingBox::new(38.4, 42.0, -84.8, -80.5), "Ohio"),
    (BoundingBox::new(36.9, 42.5, -91.5, -87.0), "Illinois"),
    (BoundingBox::new(24.5, 31.0, -87.6, -80.0), "Florida"),
];

/// Coarse region lookup standing in for real geocoding.
#[derive(Debug, Clone)]
pub struct GeoClassifier {
    table: &'static [(BoundingBox, &'static str)],
}

impl Default for GeoClassifier {
    fn default() -> Self {
        Self::new(US_STATE_BOXES)
    }
}

impl GeoClassifier {
    pub fn new(table: &'static [(BoundingBox, &'static str)]) -> Self {
        Self { table }
    }

    /// First matching box wins; NaN or out-of-table points land in [`OTHER_REGION`].
    pub fn classify(&self, lat: f64, lon: f64) -> &'static str {
        self.table
            .iter()
            .find(|(bounds, _)| bounds.contains(lat, lon))
            .map(|(_, label)| *label)
            .unwrap_or(OTHER_REGION)
    }

    pub fn classify_location(&self, location: Option<&Location>) -> &'static str {
        match location {
            Some(loc) => self.classify(loc.lat, loc.lon),
            None => OTHER_REGION,
        }
    }

    /// Every label this classifier can return, in priority order.
    pub fn labels(&self) -> Vec<String> {
        self.table
            .iter()
            .map(|(_, label)| label.to_string())
            .chain(std::iter::once(OTHER_REGION.to_string()))
            .collect()
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: &Location, b: &Location) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lon.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lon.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}
