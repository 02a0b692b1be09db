//! Physical constants in SI units unless noted otherwise

/// reduced Planck constant in J s
pub const HBAR: f64 = 1.054_571_817e-34;

/// atomic mass unit in kg
pub const AMU: f64 = 1.660_539_066_60e-27;

/// speed of light in m/s
pub const C: f64 = 299_792_458.0;

/// Hartree energy in J
pub const E_H: f64 = 4.359_744_722_207_1e-18;

/// Avogadro constant in 1/mol
pub const NA: f64 = 6.022_140_76e23;

/// Bohr radius in m
pub const BOHR: f64 = 0.529_177_210_903e-10;

/// kcal/mol per Hartree
pub const KCAL_PER_HARTREE: f64 = 627.509_474;
