use std::{error::Error, fmt::Display, path::PathBuf};

use molecule::Molecule;
use serde::{Deserialize, Serialize};

pub mod qchem;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramResult {
    pub energy: f64,
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    FileNotFound(String),
    ErrorInOutput(String),
    EnergyNotFound(String),
    EnergyParseError(String),
    ReadFileError(String, std::io::ErrorKind),
    WriteFileError(String, std::io::ErrorKind),
}

impl Display for ProgramError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for ProgramError {}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub header: String,
}

impl Template {
    pub fn from(s: &str) -> Self {
        Self {
            header: s.to_string(),
        }
    }
}

impl From<String> for Template {
    fn from(header: String) -> Self {
        Self { header }
    }
}

/// The sections of a QM/MM calculation that are carried over verbatim from the
/// frequency calculation into every single point
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QmmmSection {
    /// 1-based indices of the QM atoms in the full system
    pub qm_atoms: Vec<usize>,

    /// the MM atom type and connectivity record following each QM atom's
    /// coordinates
    pub user_connect: Vec<String>,

    /// body of the `$isotopes` section
    pub isotopes: Vec<String>,

    /// body of the `$force_field_params` section
    pub force_field_params: String,

    /// the MM atoms, appended to the `$molecule` section
    pub fixed_molecule: String,

    /// body of the `$opt` section, usually fixing the MM atoms
    pub opt: String,
}

/// Everything needed to compute one single-point energy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SinglePoint {
    /// name of the calculation, unique within `dir`
    pub name: String,

    /// the directory to run the calculation in
    pub dir: PathBuf,

    /// geometry in Å
    pub geom: Molecule,

    pub charge: isize,

    pub multiplicity: usize,

    /// level of theory, spliced in for {{.method}}
    pub method: String,

    pub basis: String,

    pub ncpus: usize,

    /// whether to request an unrestricted reference, needed for radicals
    pub unrestricted: bool,

    pub qmmm: Option<QmmmSection>,
}

/// A trait for describing programs runnable by [crate::local::Local]
pub trait Program {
    /// returns the file associated with the program's input. it should not
    /// include an extension
    fn filename(&self) -> String;

    /// return the output of `self.filename()` with ".out" appended
    fn outfile(&self) -> String {
        self.filename() + ".out"
    }

    /// return the input file associated with `self`
    fn infile(&self) -> String {
        format!("{}.{}", self.filename(), self.extension())
    }

    /// the template for writing input files
    fn template(&self) -> &Template;

    /// the file extension for the input file
    fn extension(&self) -> String;

    /// write the input file to the name returned by `infile`
    fn write_input(&self) -> Result<(), ProgramError>;

    /// read the output file associated with `filename`
    fn read_output(filename: &str) -> Result<ProgramResult, ProgramError>;

    fn new(filename: String, template: Template, point: SinglePoint) -> Self;
}

/// parse the captured energy `s` into a float and return
/// [ProgramError::EnergyParseError] containing `outname` if it fails
#[inline]
fn parse_energy(s: &str, outname: &str) -> Result<f64, ProgramError> {
    s.parse::<f64>()
        .map_err(|_| ProgramError::EnergyParseError(outname.to_owned()))
}
