//! The sampling job: parse the frequency data, classify the modes, sample
//! them, and save the results

use std::{
    fmt::Display,
    fs::{create_dir_all, remove_file},
    path::{Path, PathBuf},
    str::FromStr,
};

use molecule::Molecule;
use qcjob::{Evaluator, QmmmSection, SinglePoint};
use redint::{DMat, RedundantCoords};
use serde::{Deserialize, Serialize};

use crate::{
    ApeError,
    classify::{ModeCount, classify},
    consts::{E_H, NA},
    output::{write_csv, write_trajectories},
    projection::project_and_diagonalize,
    rotors::{Rotor, RotorDetector, TopologyDetector},
    sampling::{Sampler, SamplingResult, SamplingSettings, work_dir},
    source::{GeometrySource, JsonSource, QmmmData},
};


/// default thread count for QM/MM single points
const QMMM_NCPUS: usize = 8;

/// upper bound on the heavy-atom thread count heuristic
const MAX_NCPUS: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    /// torsions are scanned as hindered rotors and projected out of the
    /// vibrations
    #[serde(alias = "umvt")]
    UMVT,

    /// every mode is treated as a normal-mode vibration
    #[serde(alias = "umn")]
    UMN,
}

impl FromStr for Protocol {
    type Err = ApeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "UMVT" => Ok(Self::UMVT),
            "UMN" => Ok(Self::UMN),
            _ => Err(ApeError::Input(format!(
                "unrecognized protocol {s:?}, expected UMVT or UMN"
            ))),
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::UMVT => write!(f, "UMVT"),
            Protocol::UMN => write!(f, "UMN"),
        }
    }
}

/// The molecular state that the thermodynamic analysis starts from
#[derive(Clone, Debug, PartialEq)]
pub struct Conformer {
    /// geometry in Å with the masses used throughout
    pub molecule: Molecule,

    /// electronic energy of the optimized geometry in Hartree
    pub energy: f64,

    /// zero-point energy in J/mol
    pub zpe: f64,

    pub multiplicity: usize,

    pub optical_isomers: usize,

    /// ground-state energy in J/mol, set after sampling
    pub e0: Option<f64>,
}

/// Everything [SamplingJob::parse] derives from the frequency data
#[derive(Clone, Debug)]
pub struct Parsed {
    pub conformer: Conformer,

    /// Cartesian Hessian in Hartree/bohr²
    pub hessian: DMat,

    pub internal: RedundantCoords,

    pub rotors: Vec<Rotor>,

    pub linear: bool,

    pub qmmm: Option<QmmmData>,

    pub counts: ModeCount,

    pub unrestricted: bool,

    pub charge: isize,

    pub multiplicity: usize,

    pub ncpus: usize,

    /// reaction coordinate frequency of a transition state in cm⁻¹, negative
    pub imaginary_frequency: Option<f64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SamplingJob {
    pub label: String,

    /// JSON frequency data for this species
    pub input_file: PathBuf,

    pub output_directory: PathBuf,

    /// defaults to UMVT when left unset
    pub protocol: Option<Protocol>,

    /// overrides the multiplicity from the frequency data
    pub multiplicity: Option<usize>,

    /// overrides the charge from the frequency data
    pub charge: Option<isize>,

    pub level_of_theory: String,

    pub basis: String,

    pub ncpus: Option<usize>,

    pub is_ts: bool,

    pub settings: SamplingSettings,

    #[serde(skip)]
    pub parsed: Option<Parsed>,
}

impl SamplingJob {
    pub fn new(
        label: impl Into<String>,
        input_file: impl Into<PathBuf>,
        output_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            label: label.into(),
            input_file: input_file.into(),
            output_directory: output_directory.into(),
            protocol: None,
            multiplicity: None,
            charge: None,
            level_of_theory: String::new(),
            basis: String::new(),
            ncpus: None,
            is_ts: false,
            settings: SamplingSettings::default(),
            parsed: None,
        }
    }

    /// the sampling record for this job
    pub fn csv_path(&self) -> PathBuf {
        self.output_directory
            .join(format!("{}_sampling_result.csv", self.label))
    }

    /// the directory holding the trajectory of each mode
    pub fn plot_dir(&self) -> PathBuf {
        self.output_directory.join("plot").join(&self.label)
    }

    pub fn work_dir(&self) -> PathBuf {
        work_dir(&self.output_directory, &self.label)
    }

    /// the parsed state, or an error if [SamplingJob::parse] has not run
    pub fn parsed(&self) -> Result<&Parsed, ApeError> {
        self.parsed.as_ref().ok_or_else(|| {
            ApeError::Input(format!(
                "job {} must be parsed before sampling",
                self.label
            ))
        })
    }

    /// load the frequency data from `source`, detect rotors with `detector`
    /// under UMVT, and count the modes
    pub fn parse(
        &mut self,
        source: &dyn GeometrySource,
        detector: &dyn RotorDetector,
    ) -> Result<(), ApeError> {
        self.settings.validate()?;
        let data = source.load()?;
        let protocol = *self.protocol.get_or_insert(Protocol::UMVT);
        let mol = data.molecule();
        let linear = mol.is_linear();

        let imaginary_frequency = data.negative_frequency();
        if self.is_ts && !data.frequencies.is_empty() {
            let nneg = data.frequencies.iter().filter(|&&f| f < 0.0).count();
            if nneg != 1 {
                return Err(ApeError::Input(format!(
                    "transition state {} has {nneg} imaginary frequencies, \
                     expected exactly one",
                    self.label
                )));
            }
        }

        let rotors = match protocol {
            Protocol::UMN => Vec::new(),
            Protocol::UMVT => detect_rotors(&mol, data.qmmm.as_ref(), detector),
        };
        let n_qm = data.qmmm.as_ref().map(|q| q.qm_atoms.len());
        let counts = classify(mol.len(), linear, self.is_ts, rotors.len(), n_qm)?;

        let scans: Vec<[usize; 4]> = rotors.iter().map(|r| r.scan).collect();
        let mut internal = RedundantCoords::new(&mol, &scans)?;
        if let Some(q) = &data.qmmm {
            internal.n_hcap = q.n_hcap();
        }

        let ncpus = match (self.ncpus, &data.qmmm) {
            (Some(n), _) => n,
            (None, Some(_)) => QMMM_NCPUS,
            (None, None) => mol.heavy_atoms().clamp(1, MAX_NCPUS),
        };

        log::info!(
            "parsed {}: {} atoms, {} modes ({} torsions, {} vibrations), \
             linear: {linear}, protocol {protocol}",
            self.label,
            mol.len(),
            counts.nmode,
            counts.n_rotors,
            counts.n_vib,
        );

        self.parsed = Some(Parsed {
            conformer: Conformer {
                molecule: mol,
                energy: data.energy,
                zpe: data.zpe,
                multiplicity: self.multiplicity.unwrap_or(data.multiplicity),
                optical_isomers: data.optical_isomers,
                e0: None,
            },
            hessian: data.hessian(),
            internal,
            rotors,
            linear,
            counts,
            unrestricted: data.unrestricted,
            charge: self.charge.unwrap_or(data.charge),
            multiplicity: self.multiplicity.unwrap_or(data.multiplicity),
            ncpus,
            imaginary_frequency,
            qmmm: data.qmmm,
        });
        Ok(())
    }

    /// [SamplingJob::parse] the JSON in `self.input_file` with the default
    /// [TopologyDetector]
    pub fn parse_file(&mut self) -> Result<(), ApeError> {
        let source = JsonSource::new(&self.input_file);
        self.parse(&source, &TopologyDetector::default())
    }

    /// sample every mode, evaluating the energies with `evaluator`, and
    /// attach the ground-state energy to the conformer
    pub fn sampling<E: Evaluator>(
        &mut self,
        evaluator: &mut E,
    ) -> Result<SamplingResult, ApeError> {
        let Some(protocol) = self.protocol else {
            return Err(ApeError::Input(format!(
                "no sampling protocol resolved for {}",
                self.label
            )));
        };
        let dir = self.work_dir();
        let parsed = self.parsed()?;
        create_dir_all(&dir)?;

        let use_rotors = protocol == Protocol::UMVT && !parsed.rotors.is_empty();
        let rotors: &[Rotor] = if use_rotors { &parsed.rotors } else { &[] };
        let mol = &parsed.conformer.molecule;
        let modes = project_and_diagonalize(
            mol,
            &parsed.hessian,
            rotors,
            parsed.linear,
            self.is_ts,
            parsed.counts.n_vib,
            parsed.qmmm.is_none(),
        )?;

        let base = SinglePoint {
            name: "eq".to_owned(),
            dir,
            geom: mol.clone(),
            charge: parsed.charge,
            multiplicity: parsed.multiplicity,
            method: self.level_of_theory.clone(),
            basis: self.basis.clone(),
            ncpus: parsed.ncpus,
            unrestricted: parsed.unrestricted,
            qmmm: parsed.qmmm.as_ref().map(QmmmSection::from),
        };
        let e_eq = evaluator.energy(&base)?;
        if !e_eq.is_finite() {
            return Err(ApeError::Computation(format!(
                "non-finite equilibrium energy {e_eq} for {}",
                self.label
            )));
        }
        log::info!("equilibrium energy of {}: {e_eq:.10} Eh", self.label);

        let mut sampler = Sampler {
            mol,
            internal: &parsed.internal,
            settings: &self.settings,
            evaluator,
            base,
            e_eq,
            multiplicity: parsed.multiplicity,
        };
        let mut records = Vec::with_capacity(parsed.counts.nmode);
        for (i, rotor) in rotors.iter().enumerate() {
            records.push(sampler.torsion(i + 1, i, rotor)?);
        }
        for (k, &freq) in modes.frequencies.iter().enumerate() {
            let mode = rotors.len() + k + 1;
            let vector = modes.vectors.column(k).into_owned();
            records.push(sampler.vibration(mode, freq, vector)?);
        }

        let result = SamplingResult::new(records);
        let zpe = parsed.conformer.zpe;
        let e0 = result.min_elect * E_H * NA + zpe;
        log::info!(
            "lowest sampled energy of {}: {:.10} Eh, E0 = {e0:.2} J/mol",
            self.label,
            result.min_elect
        );

        if let Some(parsed) = self.parsed.as_mut() {
            parsed.conformer.e0 = Some(e0);
            if parsed.imaginary_frequency.is_none() {
                parsed.imaginary_frequency = modes.reaction_frequency;
            }
        }
        Ok(result)
    }

    /// write the sampling record and per-mode trajectories for `result`
    pub fn save(&self, result: &SamplingResult) -> Result<(), ApeError> {
        let natom = self.parsed()?.conformer.molecule.len();
        if let Some(dir) = self.csv_path().parent() {
            create_dir_all(dir)?;
        }
        write_csv(self.csv_path(), result)?;
        write_trajectories(self.plot_dir(), natom, result)?;
        Ok(())
    }

    /// run the whole job, replacing any previous sampling record. `save`
    /// controls whether the record and trajectories are written
    pub fn execute<E: Evaluator>(
        &mut self,
        evaluator: &mut E,
        save: bool,
    ) -> Result<SamplingResult, ApeError> {
        remove_stale(&self.csv_path())?;
        self.parse_file()?;
        let result = self.sampling(evaluator)?;
        if save {
            self.save(&result)?;
        }
        Ok(result)
    }
}

fn remove_stale(path: &Path) -> Result<(), ApeError> {
    match remove_file(path) {
        Ok(()) => {
            log::info!("removed previous sampling record {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// detect the rotors of `mol`. for QM/MM systems only QM atoms without MM
/// neighbors may take part
fn detect_rotors(
    mol: &Molecule,
    qmmm: Option<&QmmmData>,
    detector: &dyn RotorDetector,
) -> Vec<Rotor> {
    let Some(qmmm) = qmmm else {
        return detector.rotors(mol);
    };
    let free = qmmm.unconnected();
    if free.is_empty() {
        return Vec::new();
    }
    detector
        .rotors(&mol.subset(&free))
        .iter()
        .map(|r| r.remap(&free))
        .collect()
}
