// Value-returning closed-loop controller.
//
// Owned by whichever mode needs it (heading hold, distance legs) and queried
// once per tick: update(measurement, dt) -> output. Continuous mode wraps the
// error through the shorter way around the circle, for heading control.

/// Proportional gains plus optional integral/derivative terms.
#[derive(Debug, Clone, Copy)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidGains {
    pub const fn p(kp: f64) -> Self {
        Self {
            kp,
            ki: 0.0,
            kd: 0.0,
        }
    }
}

#[derive(Debug)]
pub struct Pid {
    gains: PidGains,
    setpoint: f64,
    tolerance: f64,
    output_limit: f64,
    // Continuous input wraps error into (-range/2, range/2], used for angles
    continuous_range: Option<f64>,
    integral: f64,
    prev_error: Option<f64>,
    last_output: f64,
}

impl Pid {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            setpoint: 0.0,
            tolerance: 0.0,
            output_limit: 1.0,
            continuous_range: None,
            integral: 0.0,
            prev_error: None,
            last_output: 0.0,
        }
    }

    /// Treat the input as circular with the given period (e.g. 2*pi for
    /// radians); errors are taken the shorter way around.
    pub fn continuous(mut self, range: f64) -> Self {
        self.continuous_range = Some(range);
        self
    }

    pub fn with_output_limit(mut self, limit: f64) -> Self {
        self.output_limit = limit.abs();
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance.abs();
        self
    }

    pub fn set_setpoint(&mut self, setpoint: f64) {
        if (setpoint - self.setpoint).abs() > f64::EPSILON {
            self.integral = 0.0;
            self.prev_error = None;
        }
        self.setpoint = setpoint;
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn last_output(&self) -> f64 {
        self.last_output
    }

    fn error(&self, measurement: f64) -> f64 {
        let mut error = self.setpoint - measurement;
        if let Some(range) = self.continuous_range {
            let half = range / 2.0;
            while error > half {
                error -= range;
            }
            while error <= -half {
                error += range;
            }
        }
        error
    }

    /// Whether the last measurement was within tolerance of the setpoint.
    pub fn on_target(&self, measurement: f64) -> bool {
        self.error(measurement).abs() <= self.tolerance
    }

    /// One controller step. Output is clamped to the configured limit.
    pub fn update(&mut self, measurement: f64, dt: f64) -> f64 {
        let error = self.error(measurement);

        self.integral += error * dt;
        let derivative = match self.prev_error {
            Some(prev) if dt > 0.0 => (error - prev) / dt,
            _ => 0.0,
        };
        self.prev_error = Some(error);

        let raw = self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative;
        self.last_output = raw.clamp(-self.output_limit, self.output_limit);
        self.last_output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const DT: f64 = 0.02;

    #[test]
    fn proportional_output_tracks_error() {
        let mut pid = Pid::new(PidGains::p(0.5)).with_output_limit(10.0);
        pid.set_setpoint(2.0);
        let out = pid.update(1.0, DT);
        assert!((out - 0.5).abs() < 1e-12);
    }

    #[test]
    fn output_is_clamped() {
        let mut pid = Pid::new(PidGains::p(10.0));
        pid.set_setpoint(100.0);
        assert_eq!(pid.update(0.0, DT), 1.0);
        pid.set_setpoint(-100.0);
        assert_eq!(pid.update(0.0, DT), -1.0);
    }

    #[test]
    fn continuous_error_wraps_the_short_way() {
        let mut pid = Pid::new(PidGains::p(1.0))
            .continuous(2.0 * PI)
            .with_output_limit(10.0);
        // Setpoint just below pi, measurement just above -pi: the short way
        // is a small error across the wrap, not nearly a full turn.
        pid.set_setpoint(PI - 0.1);
        let out = pid.update(-PI + 0.1, DT);
        assert!(
            (out - -0.2).abs() < 1e-9,
            "expected short-way error, got {out}"
        );
    }

    #[test]
    fn on_target_respects_tolerance() {
        let mut pid = Pid::new(PidGains::p(1.0)).with_tolerance(0.05);
        pid.set_setpoint(1.0);
        assert!(pid.on_target(1.04));
        assert!(!pid.on_target(1.06));
    }
}
