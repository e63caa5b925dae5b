// Joystick axis shaping: deadzone, exponential response, rate scaling.
//
// Pure function; the teleop publisher shapes its own axes with it, and the
// chassis reuses it to turn range/vision errors into gentle drive commands.

/// Rescale a raw [-1, 1] axis value.
///
/// `deadzone` is subtracted and the remaining travel is renormalized so the
/// output still sweeps the full range. `exponential` > 0 bends the curve so
/// small deflections give finer control. `rate` scales the final output.
pub fn rescale(value: f64, deadzone: f64, exponential: f64, rate: f64) -> f64 {
    let sign = if value < 0.0 { -1.0 } else { 1.0 };
    let mut value = value.abs().min(1.0);

    if value < deadzone {
        return 0.0;
    }

    if exponential == 0.0 {
        value = (value - deadzone) / (1.0 - deadzone);
    } else {
        let a = (exponential + 1.0).ln() / (1.0 - deadzone);
        value = ((a * (value - deadzone)).exp() - 1.0) / exponential;
    }

    value * sign * rate
}

/// Rate-only rescale, used for sensor-error-to-velocity conversions.
pub fn rescale_rate(value: f64, rate: f64) -> f64 {
    rescale(value, 0.0, 0.0, rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadzone_zeroes_small_inputs() {
        assert_eq!(rescale(0.04, 0.05, 0.0, 1.0), 0.0);
        assert_eq!(rescale(-0.04, 0.05, 0.0, 1.0), 0.0);
    }

    #[test]
    fn full_deflection_maps_to_rate() {
        assert!((rescale(1.0, 0.05, 0.0, 1.0) - 1.0).abs() < 1e-12);
        assert!((rescale(-1.0, 0.05, 0.0, 0.5) - -0.5).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_input_is_capped() {
        assert!((rescale(3.0, 0.0, 0.0, 1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn linear_rescale_is_continuous_at_deadzone_edge() {
        let just_over = rescale(0.0501, 0.05, 0.0, 1.0);
        assert!(just_over > 0.0 && just_over < 0.01);
    }

    #[test]
    fn exponential_softens_small_inputs() {
        let linear = rescale(0.3, 0.05, 0.0, 1.0);
        let expo = rescale(0.3, 0.05, 0.3, 1.0);
        assert!(expo < linear, "expo {expo} should be below linear {linear}");
        // Full deflection still reaches the rate
        assert!((rescale(1.0, 0.05, 0.3, 1.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn sign_is_preserved() {
        assert!(rescale(-0.5, 0.05, 0.3, 1.0) < 0.0);
        assert!(rescale(0.5, 0.05, 0.3, 1.0) > 0.0);
    }
}
