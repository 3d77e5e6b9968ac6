use helm_proto::GeoCoordinates;

use crate::host::FlightState;

/// Initial great-circle bearing from `from` to `to`, degrees in [0, 360).
pub fn initial_bearing_deg(from: GeoCoordinates, to: GeoCoordinates) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlon = (to.lon - from.lon).to_radians();
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Wrap an angle into (-180, 180].
pub fn normalize_bearing(deg: f64) -> f64 {
    let d = deg % 360.0;
    if d > 180.0 {
        d - 360.0
    } else if d <= -180.0 {
        d + 360.0
    } else {
        d
    }
}

/// Signed smallest rotation taking heading `a` onto heading `b`.
pub fn angle_delta(a: f64, b: f64) -> f64 {
    normalize_bearing(b - a)
}

/// Bearing of a surface point relative to where the vessel is facing.
pub fn relative_bearing(state: &FlightState, to: GeoCoordinates) -> f64 {
    normalize_bearing(initial_bearing_deg(state.position, to) - state.heading_deg)
}

/// Bearing of a compass heading relative to the current heading. Both are
/// rounded to whole degrees first; a non-finite heading centres the wheels.
pub fn compass_bearing(heading: f64, current_heading: f64) -> f64 {
    if !heading.is_finite() {
        return 0.0;
    }
    normalize_bearing(heading.round() - current_heading.round())
}
