// Angle helpers for steering math.
//
// Everything downstream reasons in radians on (-pi, pi]; these two functions
// are the only place wrapping happens.

use std::f64::consts::PI;

/// Wrap an angle to (-pi, pi].
pub fn normalize(angle: f64) -> f64 {
    angle.sin().atan2(angle.cos())
}

/// Smallest rotation that points a steerable wheel along `target`, treating
/// `target` and `target + pi` as equivalent (the drive motor can reverse).
///
/// The result is always within [-pi/2, pi/2].
pub fn min_angular_displacement(current: f64, target: f64) -> f64 {
    let diff = normalize(target - current);
    let opp_diff = normalize(target + PI - current);

    if diff.abs() < opp_diff.abs() {
        diff
    } else {
        opp_diff
    }
}
