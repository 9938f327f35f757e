use thiserror::Error;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("Invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },
}

/// Latitude must be within [-90, 90] and longitude within [-180, 180].
pub fn validate_coordinate(lat: f64, lon: f64) -> Result<(), GeoError> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(GeoError::InvalidCoordinate { lat, lon });
    }
    Ok(())
}

/// Great-circle distance between two points in kilometers.
///
/// Pure math, no range checks; validate at the boundary with
/// [`validate_coordinate`].
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    // Rounding can push `a` just past 1.0 near the antipode, where
    // `(1.0 - a).sqrt()` would be NaN.
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Distances from one origin to many points, preserving input order.
/// Rejects any out-of-range coordinate, origin included.
pub fn haversine_km_batch(
    origin: (f64, f64),
    points: &[(f64, f64)],
) -> Result<Vec<f64>, GeoError> {
    validate_coordinate(origin.0, origin.1)?;
    for &(lat, lon) in points {
        validate_coordinate(lat, lon)?;
    }
    Ok(points
        .iter()
        .map(|&(lat, lon)| haversine_km(origin.0, origin.1, lat, lon))
        .collect())
}
