use crate::cli::GeometryArgs;
use crate::error::{CliError, Result};
use nalgebra::{Matrix3, Vector3};
use serde::Deserialize;
use sockcalc::core::geometry::{Conventions, GeometryAdapter};
use sockcalc::core::models::structure::StructureSnapshot;
use sockcalc::engine::error::EngineError;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, info};

/// A structure as written by hand: lattice vectors as rows, everything in Å.
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct StructureFile {
    cell: [[f64; 3]; 3],
    #[serde(default = "all_periodic")]
    pbc: [bool; 3],
    positions: Vec<[f64; 3]>,
    symbols: Option<Vec<String>>,
}

fn all_periodic() -> [bool; 3] {
    [true; 3]
}

struct LoadedStructure {
    snapshot: StructureSnapshot,
    symbols: Vec<String>,
}

fn load_structure(path: &Path) -> Result<LoadedStructure> {
    debug!("Loading structure from file: {:?}", path);
    let content = std::fs::read_to_string(path)?;
    let file: StructureFile = toml::from_str(&content).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })?;

    let symbols = match file.symbols {
        Some(symbols) if symbols.len() != file.positions.len() => {
            return Err(CliError::FileParsing {
                path: path.to_path_buf(),
                source: anyhow::anyhow!(
                    "{} symbols given for {} positions",
                    symbols.len(),
                    file.positions.len()
                ),
            });
        }
        Some(symbols) => symbols,
        None => vec!["X".to_string(); file.positions.len()],
    };

    let positions = file
        .positions
        .iter()
        .map(|p| Vector3::new(p[0], p[1], p[2]))
        .collect();
    let snapshot = StructureSnapshot::new(
        positions,
        StructureSnapshot::cell_from_rows(file.cell),
        file.pbc,
    )
    .map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })?;

    Ok(LoadedStructure { snapshot, symbols })
}

pub fn run(args: GeometryArgs) -> Result<()> {
    let loaded = load_structure(&args.structure)?;
    let conventions = Conventions {
        cell: args.cell_convention,
        stress: args.stress_convention,
    };
    let report = render(&loaded, conventions, args.wrap)?;
    info!(
        n_atoms = loaded.snapshot.n_atoms(),
        wrapped = args.wrap,
        "Engine geometry computed."
    );
    print!("{}", report);
    Ok(())
}

fn render(loaded: &LoadedStructure, conventions: Conventions, wrap: bool) -> Result<String> {
    let adapter = GeometryAdapter::new(conventions);
    let payload = adapter
        .prepare(&loaded.snapshot)
        .map_err(EngineError::from)?;

    let mut positions = payload.positions().to_vec();
    if wrap {
        payload
            .wrap_in_place(&mut positions)
            .map_err(EngineError::from)?;
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "# cell convention: {}, stress convention: {}",
        conventions.cell, conventions.stress
    );
    let _ = writeln!(out, "# periodic: {:?}", loaded.snapshot.pbc());
    let _ = writeln!(out, "volume [Å^3]: {:.6}", loaded.snapshot.volume());
    write_matrix(&mut out, "cell [Bohr]", payload.cell());
    write_matrix(&mut out, "inverse cell [1/Bohr]", payload.inverse_cell());
    let _ = writeln!(
        out,
        "positions [Bohr]{}:",
        if wrap { " (wrapped)" } else { "" }
    );
    for (symbol, xyz) in loaded.symbols.iter().zip(positions.chunks_exact(3)) {
        let _ = writeln!(
            out,
            "  {:<3} {:>14.8} {:>14.8} {:>14.8}",
            symbol, xyz[0], xyz[1], xyz[2]
        );
    }
    Ok(out)
}

fn write_matrix(out: &mut String, title: &str, m: &Matrix3<f64>) {
    let _ = writeln!(out, "{}:", title);
    for row in m.row_iter() {
        let _ = writeln!(out, "  {:>14.8} {:>14.8} {:>14.8}", row[0], row[1], row[2]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sockcalc::core::geometry::CellConvention;
    use sockcalc::core::units::BOHR;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_structure(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("structure.toml");
        fs::write(&path, content).unwrap();
        path
    }

    const WATER_BOX: &str = r#"
        cell = [[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]]
        symbols = ["O", "H", "H"]
        positions = [[0.0, 0.0, 0.0], [0.76, 0.59, 0.0], [-0.76, 0.59, 0.0]]
    "#;

    #[test]
    fn structure_file_defaults_to_fully_periodic() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_structure(&write_structure(&dir, WATER_BOX)).unwrap();

        assert_eq!(loaded.snapshot.pbc(), [true; 3]);
        assert_eq!(loaded.snapshot.n_atoms(), 3);
        assert_eq!(loaded.symbols, ["O", "H", "H"]);
    }

    #[test]
    fn symbol_count_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_structure(
            &dir,
            r#"
            cell = [[5.0, 0.0, 0.0], [0.0, 5.0, 0.0], [0.0, 0.0, 5.0]]
            symbols = ["Si"]
            positions = [[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]]
            "#,
        );

        assert!(matches!(
            load_structure(&path),
            Err(CliError::FileParsing { .. })
        ));
    }

    #[test]
    fn report_lists_cell_and_positions_in_bohr() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_structure(&write_structure(&dir, WATER_BOX)).unwrap();

        let report = render(&loaded, Conventions::default(), false).unwrap();

        let edge = format!("{:>14.8}", 10.0 / BOHR);
        assert!(report.contains(&edge));
        assert!(report.contains("volume [Å^3]: 1000.000000"));
        assert!(report.contains("cell convention: column-vectors"));
        assert_eq!(report.lines().filter(|l| l.trim_start().starts_with('H')).count(), 2);
    }

    #[test]
    fn wrapping_moves_negative_coordinates_into_the_cell() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_structure(&write_structure(&dir, WATER_BOX)).unwrap();

        let report = render(&loaded, Conventions::default(), true).unwrap();

        let wrapped_x = format!("{:>14.8}", (10.0 - 0.76) / BOHR);
        assert!(report.contains("(wrapped)"));
        assert!(report.contains(&wrapped_x));
        assert!(!report.contains(&format!("{:>14.8}", -0.76 / BOHR)));
    }

    #[test]
    fn singular_cell_is_reported_as_engine_error() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_structure(&write_structure(
            &dir,
            r#"
            cell = [[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 1.0]]
            positions = [[0.0, 0.0, 0.0]]
            "#,
        ))
        .unwrap();

        let conventions = Conventions {
            cell: CellConvention::RowVectors,
            ..Conventions::default()
        };
        assert!(matches!(
            render(&loaded, conventions, false),
            Err(CliError::Engine(_))
        ));
    }
}
