use crate::core::geometry::GeometryError;
use nalgebra::{Matrix3, Vector3};

/// The part of a structure a running engine session is bound to.
///
/// A session started for one shape cannot serve a structure with a different
/// atom count or different periodic flags; positions and cell may change freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructureShape {
    pub n_atoms: usize,
    pub pbc: [bool; 3],
}

/// Immutable view of an atomic configuration at the moment of a request.
///
/// Positions and cell are in Ångström. The cell follows the row-vector
/// convention: row `i` of `cell` is lattice vector `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureSnapshot {
    positions: Vec<Vector3<f64>>,
    cell: Matrix3<f64>,
    pbc: [bool; 3],
}

impl StructureSnapshot {
    /// Creates a snapshot, rejecting non-finite coordinates or cell entries.
    pub fn new(
        positions: Vec<Vector3<f64>>,
        cell: Matrix3<f64>,
        pbc: [bool; 3],
    ) -> Result<Self, GeometryError> {
        let finite = positions
            .iter()
            .all(|p| p.iter().all(|x| x.is_finite()))
            && cell.iter().all(|x| x.is_finite());
        if !finite {
            return Err(GeometryError::NonFinite);
        }
        Ok(Self {
            positions,
            cell,
            pbc,
        })
    }

    /// Creates a snapshot from a flat `[x0, y0, z0, x1, ...]` position vector.
    pub fn from_flat(
        flat: &[f64],
        cell: Matrix3<f64>,
        pbc: [bool; 3],
    ) -> Result<Self, GeometryError> {
        if flat.len() % 3 != 0 {
            return Err(GeometryError::MalformedPositions(flat.len()));
        }
        let positions = flat
            .chunks_exact(3)
            .map(|c| Vector3::new(c[0], c[1], c[2]))
            .collect();
        Self::new(positions, cell, pbc)
    }

    /// Builds a cell matrix from three lattice vectors given as rows.
    pub fn cell_from_rows(rows: [[f64; 3]; 3]) -> Matrix3<f64> {
        Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ])
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn cell(&self) -> &Matrix3<f64> {
        &self.cell
    }

    pub fn pbc(&self) -> [bool; 3] {
        self.pbc
    }

    pub fn n_atoms(&self) -> usize {
        self.positions.len()
    }

    pub fn shape(&self) -> StructureShape {
        StructureShape {
            n_atoms: self.n_atoms(),
            pbc: self.pbc,
        }
    }

    /// Cell volume in Å³.
    pub fn volume(&self) -> f64 {
        self.cell.determinant().abs()
    }

    /// Positions flattened atom by atom, in Ångström.
    pub fn flattened_positions(&self) -> Vec<f64> {
        self.positions
            .iter()
            .flat_map(|p| [p.x, p.y, p.z])
            .collect()
    }
}
