// Robot geometry and per-corner rotation contributions.
//
// Corners are laid out looking down at the robot:
//
//   A - D
//   |   |
//   B - C
//
// Each corner has a unit-ish vector that a rotation command contributes to
// that module's translation; the four vectors are the four sign combinations
// of the same magnitude pair.

/// The four swerve module positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    A,
    B,
    C,
    D,
}

impl Corner {
    pub const ALL: [Corner; 4] = [Corner::A, Corner::B, Corner::C, Corner::D];

    /// Position of this corner in `ALL`, and in every corner-ordered array.
    pub const fn index(self) -> usize {
        match self {
            Corner::A => 0,
            Corner::B => 1,
            Corner::C => 2,
            Corner::D => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Corner::A => "a",
            Corner::B => "b",
            Corner::C => "c",
            Corner::D => "d",
        }
    }
}

/// Chassis footprint, fixed at construction. Units only need to be
/// consistent between length and width (the rotation vectors are ratios).
#[derive(Debug, Clone, Copy)]
pub struct RobotGeometry {
    pub length: f64,
    pub width: f64,
}

impl RobotGeometry {
    pub fn new(length: f64, width: f64) -> Self {
        Self { length, width }
    }

    /// Distance of each module from the robot center.
    pub fn motor_dist(&self) -> f64 {
        ((self.width / 2.0).powi(2) + (self.length / 2.0).powi(2)).sqrt()
    }

    /// Rotation-contribution vector for one corner: multiply by vz and add
    /// to the translation command to get that module's target vector.
    pub fn rotation_vector(&self, corner: Corner) -> (f64, f64) {
        let dist = self.motor_dist();
        let x = (self.width / 2.0) / dist;
        let y = (self.length / 2.0) / dist;
        match corner {
            Corner::A => (-x, y),
            Corner::B => (-x, -y),
            Corner::C => (x, -y),
            Corner::D => (x, y),
        }
    }
}
