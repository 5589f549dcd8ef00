use crate::models::{BoundingBox, GeoPoint};

/// Earth's radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distance assumed when either side has no usable coordinates
pub const FAR_AWAY_KM: f64 = 999.0;

/// Great-circle distance in km between two (lat, lon) pairs given in degrees.
///
/// Symmetric in its arguments and zero for identical points. Out-of-range
/// coordinates are not rejected.
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair outside [0, 1] for antipodal points.
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Distance between two optional locations, falling back to [`FAR_AWAY_KM`]
#[inline]
pub fn distance_between(a: Option<GeoPoint>, b: Option<GeoPoint>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => {
            let d = haversine_distance(a.latitude, a.longitude, b.latitude, b.longitude);
            if d.is_finite() {
                d
            } else {
                FAR_AWAY_KM
            }
        }
        _ => FAR_AWAY_KM,
    }
}

/// Lat/lon box enclosing a `radius_km` circle around the center.
///
/// Used as a store-side pre-filter; the exact radius is applied afterwards.
pub fn calculate_bounding_box(lat: f64, lon: f64, radius_km: f64) -> BoundingBox {
    // ~111 km per degree of latitude
    let lat_delta = radius_km / 111.0;

    // Near the poles cos(lat) approaches zero; cover every longitude instead.
    let cos_lat = lat.to_radians().cos().abs();
    let lon_delta = if cos_lat < 1e-6 {
        180.0
    } else {
        (radius_km / (111.0 * cos_lat)).min(180.0)
    };

    BoundingBox {
        min_lat: lat - lat_delta,
        max_lat: lat + lat_delta,
        min_lon: lon - lon_delta,
        max_lon: lon + lon_delta,
    }
}

/// Inclusive on every edge
#[inline]
pub fn is_within_bounding_box(lat: f64, lon: f64, bbox: &BoundingBox) -> bool {
    lat >= bbox.min_lat && lat <= bbox.max_lat && lon >= bbox.min_lon && lon <= bbox.max_lon
}
