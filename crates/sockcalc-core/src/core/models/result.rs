use nalgebra::{Matrix3, Vector3};
use std::fmt;

/// Properties a caller may ask for. Purely advisory: the engine always
/// computes the full tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Energy,
    Forces,
    Stress,
    Extra,
}

impl Property {
    pub const ALL: [Property; 4] = [
        Property::Energy,
        Property::Forces,
        Property::Stress,
        Property::Extra,
    ];
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Property::Energy => "energy",
            Property::Forces => "forces",
            Property::Stress => "stress",
            Property::Extra => "extra",
        };
        f.write_str(name)
    }
}

/// Result tuple as handed back by the engine, in atomic units.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResult {
    /// Potential energy in Hartree.
    pub potential: f64,
    /// Flattened forces in Hartree/Bohr.
    pub forces: Vec<f64>,
    /// Virial in Hartree.
    pub virial: Matrix3<f64>,
    /// Engine-defined payload, passed through uninterpreted.
    pub extra: String,
}

/// Result of one structural evaluation in caller units (eV, Å).
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationResult {
    /// Potential energy in eV.
    pub energy: f64,
    /// Per-atom forces in eV/Å.
    pub forces: Vec<Vector3<f64>>,
    /// Stress in eV/Å³.
    pub stress: Matrix3<f64>,
    pub extra: String,
}
