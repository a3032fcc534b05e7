//! Conversion between caller-side structures (Å, row-vector cells) and the
//! engine's native representation (Bohr, column-vector cells).
//!
//! Two conventions here have never been checked against an independent reference
//! calculation: the direction of the cell transpose and the sign of the stress
//! derived from the engine's virial. Both are exposed through [`Conventions`];
//! the defaults reproduce the behaviour deployments already depend on.

use crate::core::models::result::{CalculationResult, RawResult};
use crate::core::models::structure::StructureSnapshot;
use crate::core::units::{BOHR, HARTREE, angstrom_to_bohr, bohr_to_angstrom};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Determinants at or below this magnitude are treated as singular.
const SINGULAR_DETERMINANT_EPS: f64 = 1e-12;

/// Fractional coordinates within this distance below a cell face stay put when
/// wrapping, so atoms sitting exactly on a face are not flipped to the far side.
const WRAP_EPS: f64 = 1e-7;

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("Cell matrix is singular (determinant {determinant:e}); it cannot be inverted")]
    SingularCell { determinant: f64 },

    #[error("Flat position vector has length {0}, which is not a multiple of 3")]
    MalformedPositions(usize),

    #[error("Position vector describes {actual} atoms but the reference structure has {expected}")]
    AtomCountMismatch { expected: usize, actual: usize },

    #[error("Engine returned {actual} force components, expected {expected}")]
    MalformedForces { expected: usize, actual: usize },

    #[error("Structure contains non-finite coordinates or cell entries")]
    NonFinite,
}

/// How the caller's row-vector cell is laid out for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CellConvention {
    /// Lattice vectors become columns (the caller's cell is transposed).
    #[default]
    ColumnVectors,
    /// Lattice vectors stay rows.
    RowVectors,
}

/// Sign applied to the stress derived from the engine's virial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StressConvention {
    /// `stress = virial / volume`.
    #[default]
    AsReported,
    /// `stress = -virial / volume`.
    Negated,
}

impl StressConvention {
    fn sign(self) -> f64 {
        match self {
            StressConvention::AsReported => 1.0,
            StressConvention::Negated => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Conventions {
    pub cell: CellConvention,
    pub stress: StressConvention,
}

/// A structure converted into engine-native units, ready to be queued.
///
/// Carries the reference cell and periodicity so the protocol layer can ask for
/// positions to be wrapped into the primary cell mid-protocol.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStructure {
    positions: Vec<f64>,
    cell: Matrix3<f64>,
    inverse_cell: Matrix3<f64>,
    reference_cell: Matrix3<f64>,
    pbc: [bool; 3],
}

impl EngineStructure {
    /// Flattened positions in Bohr.
    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    /// Cell matrix in Bohr, laid out per the configured [`CellConvention`].
    pub fn cell(&self) -> &Matrix3<f64> {
        &self.cell
    }

    pub fn inverse_cell(&self) -> &Matrix3<f64> {
        &self.inverse_cell
    }

    pub fn n_atoms(&self) -> usize {
        self.positions.len() / 3
    }

    /// Wraps engine-native positions into the primary cell of the structure this
    /// payload was built from, overwriting `raw`.
    pub fn wrap_in_place(&self, raw: &mut [f64]) -> Result<(), GeometryError> {
        wrap_engine_positions(raw, &self.reference_cell, self.pbc, self.n_atoms())
    }
}

/// Converts structures and results between caller and engine conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GeometryAdapter {
    conventions: Conventions,
}

impl GeometryAdapter {
    pub fn new(conventions: Conventions) -> Self {
        Self { conventions }
    }

    pub fn conventions(&self) -> Conventions {
        self.conventions
    }

    /// Flattened positions divided by the Bohr length.
    pub fn to_engine_units(&self, snapshot: &StructureSnapshot) -> Vec<f64> {
        snapshot
            .flattened_positions()
            .into_iter()
            .map(angstrom_to_bohr)
            .collect()
    }

    /// Inverse of [`to_engine_units`](Self::to_engine_units): Bohr back to Å,
    /// regrouped per atom.
    pub fn from_engine_units(&self, raw: &[f64]) -> Result<Vec<Vector3<f64>>, GeometryError> {
        if raw.len() % 3 != 0 {
            return Err(GeometryError::MalformedPositions(raw.len()));
        }
        Ok(raw
            .chunks_exact(3)
            .map(|c| Vector3::new(c[0], c[1], c[2]).map(bohr_to_angstrom))
            .collect())
    }

    /// Rebuilds caller-unit positions from `raw`, wraps them into the primary cell
    /// of `reference` along its periodic directions, and writes them back to `raw`
    /// in engine units.
    pub fn wrap_and_convert(
        &self,
        raw: &mut [f64],
        reference: &StructureSnapshot,
    ) -> Result<(), GeometryError> {
        wrap_engine_positions(raw, reference.cell(), reference.pbc(), reference.n_atoms())
    }

    /// The snapshot's cell in Bohr, in the engine's layout.
    pub fn cell_matrix(&self, snapshot: &StructureSnapshot) -> Matrix3<f64> {
        let cell = match self.conventions.cell {
            CellConvention::ColumnVectors => snapshot.cell().transpose(),
            CellConvention::RowVectors => *snapshot.cell(),
        };
        cell / BOHR
    }

    /// General 3×3 inverse; no triangular form is assumed.
    pub fn inverse_cell_matrix(cell: &Matrix3<f64>) -> Result<Matrix3<f64>, GeometryError> {
        let determinant = cell.determinant();
        if !determinant.is_finite() || determinant.abs() <= SINGULAR_DETERMINANT_EPS {
            return Err(GeometryError::SingularCell { determinant });
        }
        cell.try_inverse()
            .ok_or(GeometryError::SingularCell { determinant })
    }

    /// Builds the request payload. Fails before any session work if the cell
    /// cannot be inverted.
    pub fn prepare(&self, snapshot: &StructureSnapshot) -> Result<EngineStructure, GeometryError> {
        let cell = self.cell_matrix(snapshot);
        let inverse_cell = Self::inverse_cell_matrix(&cell)?;
        Ok(EngineStructure {
            positions: self.to_engine_units(snapshot),
            cell,
            inverse_cell,
            reference_cell: *snapshot.cell(),
            pbc: snapshot.pbc(),
        })
    }

    /// Converts an engine result into caller units. Stress is the converted
    /// virial divided by the volume of `reference`.
    pub fn convert_result(
        &self,
        raw: RawResult,
        reference: &StructureSnapshot,
    ) -> Result<CalculationResult, GeometryError> {
        let expected = reference.n_atoms() * 3;
        if raw.forces.len() != expected {
            return Err(GeometryError::MalformedForces {
                expected,
                actual: raw.forces.len(),
            });
        }

        let volume = reference.volume();
        if volume <= SINGULAR_DETERMINANT_EPS {
            return Err(GeometryError::SingularCell {
                determinant: volume,
            });
        }

        let force_unit = HARTREE / BOHR;
        let forces = raw
            .forces
            .chunks_exact(3)
            .map(|c| Vector3::new(c[0], c[1], c[2]) * force_unit)
            .collect();
        let stress = raw.virial * (HARTREE * self.conventions.stress.sign() / volume);

        Ok(CalculationResult {
            energy: raw.potential * HARTREE,
            forces,
            stress,
            extra: raw.extra,
        })
    }
}

fn wrap_engine_positions(
    raw: &mut [f64],
    cell: &Matrix3<f64>,
    pbc: [bool; 3],
    n_atoms: usize,
) -> Result<(), GeometryError> {
    if raw.len() % 3 != 0 {
        return Err(GeometryError::MalformedPositions(raw.len()));
    }
    if raw.len() / 3 != n_atoms {
        return Err(GeometryError::AtomCountMismatch {
            expected: n_atoms,
            actual: raw.len() / 3,
        });
    }
    if !pbc.iter().any(|&p| p) {
        return Ok(());
    }

    // Row-vector cell: r = cellᵀ·f, so f = (cellᵀ)⁻¹·r.
    let lattice = cell.transpose();
    let to_fractional = GeometryAdapter::inverse_cell_matrix(&lattice)?;

    for chunk in raw.chunks_exact_mut(3) {
        let position = Vector3::new(chunk[0], chunk[1], chunk[2]).map(bohr_to_angstrom);
        let mut fractional = to_fractional * position;
        for axis in 0..3 {
            if pbc[axis] {
                fractional[axis] = (fractional[axis] + WRAP_EPS).rem_euclid(1.0) - WRAP_EPS;
            }
        }
        let wrapped = lattice * fractional;
        for axis in 0..3 {
            chunk[axis] = angstrom_to_bohr(wrapped[axis]);
        }
    }
    Ok(())
}
