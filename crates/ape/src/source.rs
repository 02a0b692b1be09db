//! Loading the optimized geometry, Hessian, and related data from a frequency
//! calculation

use std::{fs::read_to_string, path::PathBuf};

use molecule::{Atom, Molecule};
use qcjob::QmmmSection;
use redint::DMat;
use serde::{Deserialize, Serialize};

use crate::ApeError;

fn one() -> usize {
    1
}

/// QM/MM partitioning reported by the frequency calculation
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QmmmData {
    /// 1-based indices of the QM atoms in the full system
    pub qm_atoms: Vec<usize>,

    /// isotope records for the hydrogen capping atoms at the QM/MM boundary
    #[serde(default)]
    pub isotopes: Vec<String>,

    #[serde(default)]
    pub force_field_params: String,

    /// number of MM atoms held fixed
    pub n_fixed: usize,

    /// connection record for each QM atom. atoms without MM neighbors end in
    /// `0  0  0  0`
    pub user_connect: Vec<String>,

    #[serde(default)]
    pub fixed_molecule: String,

    #[serde(default)]
    pub opt: String,
}

impl QmmmData {
    pub fn n_hcap(&self) -> usize {
        self.isotopes.len()
    }

    /// indices of the QM atoms that are not connected to the MM region
    pub fn unconnected(&self) -> Vec<usize> {
        self.user_connect
            .iter()
            .enumerate()
            .filter(|(_, c)| c.trim_end().ends_with("0  0  0  0"))
            .map(|(i, _)| i)
            .collect()
    }
}

impl From<&QmmmData> for QmmmSection {
    fn from(q: &QmmmData) -> Self {
        Self {
            qm_atoms: q.qm_atoms.clone(),
            user_connect: q.user_connect.clone(),
            isotopes: q.isotopes.clone(),
            force_field_params: q.force_field_params.clone(),
            fixed_molecule: q.fixed_molecule.clone(),
            opt: q.opt.clone(),
        }
    }
}

/// The results of a frequency calculation. For QM/MM calculations the
/// geometry and Hessian cover only the QM atoms
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FreqData {
    pub atomic_numbers: Vec<usize>,

    /// Cartesian coordinates in Å, three per atom
    pub coords: Vec<f64>,

    /// atomic masses in amu. the most abundant isotopes are used if absent
    #[serde(default)]
    pub masses: Option<Vec<f64>>,

    /// Cartesian force constants in Hartree/bohr², 3N × 3N in row-major order
    pub hessian: Vec<f64>,

    /// electronic energy in Hartree
    pub energy: f64,

    /// zero-point energy in J/mol
    pub zpe: f64,

    #[serde(default)]
    pub charge: isize,

    #[serde(default = "one")]
    pub multiplicity: usize,

    #[serde(default)]
    pub unrestricted: bool,

    #[serde(default = "one")]
    pub optical_isomers: usize,

    /// harmonic frequencies in cm⁻¹, with imaginary frequencies negative
    #[serde(default)]
    pub frequencies: Vec<f64>,

    #[serde(default)]
    pub qmmm: Option<QmmmData>,
}

impl FreqData {
    pub fn natoms(&self) -> usize {
        self.atomic_numbers.len()
    }

    /// check that the sizes of all the fields agree
    pub fn validate(&self) -> Result<(), ApeError> {
        let n = self.natoms();
        if n == 0 {
            return Err(ApeError::Input("no atoms in frequency data".into()));
        }
        if self.coords.len() != 3 * n {
            return Err(ApeError::Input(format!(
                "expected {} coordinates for {n} atoms, found {}",
                3 * n,
                self.coords.len()
            )));
        }
        if self.hessian.len() != 9 * n * n {
            return Err(ApeError::Input(format!(
                "expected a {0}×{0} Hessian, found {1} elements",
                3 * n,
                self.hessian.len()
            )));
        }
        if let Some(m) = &self.masses
            && m.len() != n
        {
            return Err(ApeError::Input(format!(
                "expected {n} masses, found {}",
                m.len()
            )));
        }
        if let Some(q) = &self.qmmm {
            if q.qm_atoms.len() != n {
                return Err(ApeError::Input(format!(
                    "{} QM atoms listed for {n} atoms in the QM region",
                    q.qm_atoms.len()
                )));
            }
            if q.user_connect.len() != n {
                return Err(ApeError::Input(format!(
                    "{} connection records for {n} QM atoms",
                    q.user_connect.len()
                )));
            }
        }
        if self.atomic_numbers.iter().any(|&z| z == 0 || z > 36) {
            return Err(ApeError::Input(
                "atomic numbers must be between 1 and 36".into(),
            ));
        }
        Ok(())
    }

    /// the geometry with any mass overrides attached to the atoms
    pub fn molecule(&self) -> Molecule {
        let mut atoms: Vec<Atom> = self
            .atomic_numbers
            .iter()
            .zip(self.coords.chunks_exact(3))
            .map(|(&z, c)| Atom::new(z, c[0], c[1], c[2]))
            .collect();
        if let Some(masses) = &self.masses {
            for (atom, &m) in atoms.iter_mut().zip(masses) {
                atom.weight = Some(m);
            }
        }
        Molecule::new(atoms)
    }

    pub fn hessian(&self) -> DMat {
        let n = 3 * self.natoms();
        DMat::from_row_slice(n, n, &self.hessian)
    }

    /// the most negative harmonic frequency, if any
    pub fn negative_frequency(&self) -> Option<f64> {
        self.frequencies
            .iter()
            .copied()
            .filter(|&f| f < 0.0)
            .min_by(f64::total_cmp)
    }
}

/// Anything that can supply the results of a frequency calculation
pub trait GeometrySource {
    fn load(&self) -> Result<FreqData, ApeError>;
}

/// Frequency data stored as JSON, as written by a quantum chemistry log
/// parser
#[derive(Clone, Debug, PartialEq)]
pub struct JsonSource {
    pub path: PathBuf,
}

impl JsonSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GeometrySource for JsonSource {
    fn load(&self) -> Result<FreqData, ApeError> {
        let contents = read_to_string(&self.path).map_err(|e| {
            ApeError::Input(format!(
                "failed to read {}: {e}",
                self.path.display()
            ))
        })?;
        let data: FreqData = serde_json::from_str(&contents)?;
        data.validate()?;
        Ok(data)
    }
}

impl GeometrySource for FreqData {
    fn load(&self) -> Result<FreqData, ApeError> {
        self.validate()?;
        Ok(self.clone())
    }
}
