/// Bohr radius in Ångström (CODATA 2014).
pub const BOHR: f64 = 0.529_177_210_67;

/// Hartree energy in electronvolt (CODATA 2014).
pub const HARTREE: f64 = 27.211_386_024_367_243;

/// Converts a length in Ångström to Bohr.
#[inline]
pub fn angstrom_to_bohr(value: f64) -> f64 {
    value / BOHR
}

/// Converts a length in Bohr to Ångström.
#[inline]
pub fn bohr_to_angstrom(value: f64) -> f64 {
    value * BOHR
}

/// Converts an energy in Hartree to electronvolt.
#[inline]
pub fn hartree_to_ev(value: f64) -> f64 {
    value * HARTREE
}
