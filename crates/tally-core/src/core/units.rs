use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical reporting unit of an accumulated quantity.
///
/// Units are attached to slots at registration time and are purely
/// descriptive: the accumulator never converts between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    KiloJoulePerMole,
    Bar,
    Kelvin,
    Nanometer,
    CubicNanometer,
    KilogramPerCubicMeter,
    Debye,
    NanometerPerPicosecond,
    PerPicosecond,
    BarNanometer,
    PerPascalSecond,
    Dimensionless,
}

impl Unit {
    pub fn label(&self) -> &'static str {
        match self {
            Unit::KiloJoulePerMole => "kJ/mol",
            Unit::Bar => "bar",
            Unit::Kelvin => "K",
            Unit::Nanometer => "nm",
            Unit::CubicNanometer => "nm^3",
            Unit::KilogramPerCubicMeter => "kg/m^3",
            Unit::Debye => "D",
            Unit::NanometerPerPicosecond => "nm/ps",
            Unit::PerPicosecond => "1/ps",
            Unit::BarNanometer => "bar nm",
            Unit::PerPascalSecond => "1/(Pa s)",
            Unit::Dimensionless => "",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Physical constants for the derived-scalar computations.
pub mod constants {
    /// Atomic mass unit, kg.
    pub const AMU_KG: f64 = 1.660_538_921e-27;

    /// Meters per nanometer.
    pub const NANO: f64 = 1e-9;

    /// Seconds per picosecond.
    pub const PICO: f64 = 1e-12;

    /// bar per (kJ mol^-1 nm^-3).
    pub const PRESSURE_FACTOR_BAR: f64 = 16.6054;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_matches_display() {
        assert_eq!(Unit::KiloJoulePerMole.label(), "kJ/mol");
        assert_eq!(format!("{}", Unit::Bar), "bar");
        assert_eq!(Unit::Dimensionless.label(), "");
    }
}
