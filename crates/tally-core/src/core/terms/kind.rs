use crate::core::units::Unit;
use serde::{Deserialize, Serialize};

/// A scalar quantity the energy record can carry.
///
/// The declaration order is the canonical output order: downstream consumers
/// rely on column positions, so variants must never be reordered, only
/// appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionKind {
    Bond,
    Angle,
    ProperDihedral,
    ImproperDihedral,
    LennardJones14,
    Coulomb14,
    LennardJones,
    Buckingham,
    CoulombShortRange,
    CoulombReciprocal,
    LennardJonesReciprocal,
    DispersionCorrection,
    PositionRestraint,
    DistanceRestraint,
    DistanceRestraintViolation,
    OrientationRestraint,
    OrientationRestraintDeviation,
    PullPotential,
    QuantumEnergy,
    Potential,
    KineticEnergy,
    TotalEnergy,
    ConservedEnergy,
    Temperature,
    PressureDispersionCorrection,
    Pressure,
    DvdlCoupling,
    DvdlMass,
    DvdlCoulomb,
    DvdlVanDerWaals,
    DvdlBonded,
    DvdlRestraint,
}

impl InteractionKind {
    pub const COUNT: usize = 32;

    /// Every kind, in canonical output order.
    pub const ALL: [InteractionKind; Self::COUNT] = [
        InteractionKind::Bond,
        InteractionKind::Angle,
        InteractionKind::ProperDihedral,
        InteractionKind::ImproperDihedral,
        InteractionKind::LennardJones14,
        InteractionKind::Coulomb14,
        InteractionKind::LennardJones,
        InteractionKind::Buckingham,
        InteractionKind::CoulombShortRange,
        InteractionKind::CoulombReciprocal,
        InteractionKind::LennardJonesReciprocal,
        InteractionKind::DispersionCorrection,
        InteractionKind::PositionRestraint,
        InteractionKind::DistanceRestraint,
        InteractionKind::DistanceRestraintViolation,
        InteractionKind::OrientationRestraint,
        InteractionKind::OrientationRestraintDeviation,
        InteractionKind::PullPotential,
        InteractionKind::QuantumEnergy,
        InteractionKind::Potential,
        InteractionKind::KineticEnergy,
        InteractionKind::TotalEnergy,
        InteractionKind::ConservedEnergy,
        InteractionKind::Temperature,
        InteractionKind::PressureDispersionCorrection,
        InteractionKind::Pressure,
        InteractionKind::DvdlCoupling,
        InteractionKind::DvdlMass,
        InteractionKind::DvdlCoulomb,
        InteractionKind::DvdlVanDerWaals,
        InteractionKind::DvdlBonded,
        InteractionKind::DvdlRestraint,
    ];

    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            InteractionKind::Bond => "Bond",
            InteractionKind::Angle => "Angle",
            InteractionKind::ProperDihedral => "Proper Dih.",
            InteractionKind::ImproperDihedral => "Improper Dih.",
            InteractionKind::LennardJones14 => "LJ-14",
            InteractionKind::Coulomb14 => "Coulomb-14",
            InteractionKind::LennardJones => "LJ (SR)",
            InteractionKind::Buckingham => "Buckingham (SR)",
            InteractionKind::CoulombShortRange => "Coulomb (SR)",
            InteractionKind::CoulombReciprocal => "Coulomb recip.",
            InteractionKind::LennardJonesReciprocal => "LJ recip.",
            InteractionKind::DispersionCorrection => "Disper. corr.",
            InteractionKind::PositionRestraint => "Position Rest.",
            InteractionKind::DistanceRestraint => "Dist. Rest.",
            InteractionKind::DistanceRestraintViolation => "Dist. Rest. Viol.",
            InteractionKind::OrientationRestraint => "Orient. Rest.",
            InteractionKind::OrientationRestraintDeviation => "Orient. Rest. Dev.",
            InteractionKind::PullPotential => "COM Pull En.",
            InteractionKind::QuantumEnergy => "Quantum En.",
            InteractionKind::Potential => "Potential",
            InteractionKind::KineticEnergy => "Kinetic En.",
            InteractionKind::TotalEnergy => "Total Energy",
            InteractionKind::ConservedEnergy => "Conserved En.",
            InteractionKind::Temperature => "Temperature",
            InteractionKind::PressureDispersionCorrection => "Pres. DC",
            InteractionKind::Pressure => "Pressure",
            InteractionKind::DvdlCoupling => "dVcoupling/dl",
            InteractionKind::DvdlMass => "dEkin/dl",
            InteractionKind::DvdlCoulomb => "dVcoul/dl",
            InteractionKind::DvdlVanDerWaals => "dVvdw/dl",
            InteractionKind::DvdlBonded => "dVbonded/dl",
            InteractionKind::DvdlRestraint => "dVrestraint/dl",
        }
    }

    pub fn unit(&self) -> Unit {
        match self {
            InteractionKind::Temperature => Unit::Kelvin,
            InteractionKind::Pressure | InteractionKind::PressureDispersionCorrection => Unit::Bar,
            InteractionKind::DistanceRestraintViolation => Unit::Nanometer,
            InteractionKind::OrientationRestraintDeviation => Unit::Dimensionless,
            _ => Unit::KiloJoulePerMole,
        }
    }
}

/// Non-bonded sub-kinds reported per energy-group pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NonBondedKind {
    CoulombShortRange,
    LennardJonesShortRange,
    BuckinghamShortRange,
    Coulomb14,
    LennardJones14,
}

impl NonBondedKind {
    pub const COUNT: usize = 5;

    pub const ALL: [NonBondedKind; Self::COUNT] = [
        NonBondedKind::CoulombShortRange,
        NonBondedKind::LennardJonesShortRange,
        NonBondedKind::BuckinghamShortRange,
        NonBondedKind::Coulomb14,
        NonBondedKind::LennardJones14,
    ];

    #[inline]
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn label(&self) -> &'static str {
        match self {
            NonBondedKind::CoulombShortRange => "Coul-SR",
            NonBondedKind::LennardJonesShortRange => "LJ-SR",
            NonBondedKind::BuckinghamShortRange => "Buck-SR",
            NonBondedKind::Coulomb14 => "Coul-14",
            NonBondedKind::LennardJones14 => "LJ-14",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_is_aligned_with_discriminants() {
        for (i, kind) in InteractionKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        for (i, kind) in NonBondedKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn units_cover_non_energy_kinds() {
        assert_eq!(InteractionKind::Temperature.unit(), Unit::Kelvin);
        assert_eq!(InteractionKind::Pressure.unit(), Unit::Bar);
        assert_eq!(InteractionKind::Bond.unit(), Unit::KiloJoulePerMole);
        assert_eq!(
            InteractionKind::DistanceRestraintViolation.unit(),
            Unit::Nanometer
        );
    }
}
