//! Great-circle geometry on a spherical Earth.

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Approximate kilometres per degree of latitude.
pub const KM_PER_DEGREE: f64 = 111.0;

/// Haversine distance between two (lat, lon) points in degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        assert_eq!(haversine_km(-27.59, -48.54, -27.59, -48.54), 0.0);
    }

    #[test]
    fn test_one_degree_latitude() {
        let d = haversine_km(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111.19).abs() < 0.1, "got {d}");
    }

    #[test]
    fn test_florianopolis_joinville() {
        // ~145 km straight line
        let d = haversine_km(-27.5954, -48.5480, -26.3045, -48.8487);
        assert!(d > 140.0 && d < 150.0, "got {d}");
    }

    #[test]
    fn test_symmetry() {
        let a = haversine_km(-27.1, -52.6, -28.7, -49.4);
        let b = haversine_km(-28.7, -49.4, -27.1, -52.6);
        assert!((a - b).abs() < 1e-9);
    }
}
