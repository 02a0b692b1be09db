//! Loading the declarative input file into a [ParseSession] of species,
//! transition states, reactions, and the jobs to run on them

use std::{
    collections::BTreeMap,
    fmt::Display,
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::{
    ApeError,
    job::{Protocol, SamplingJob},
    sampling::SamplingSettings,
};

#[cfg(test)]
mod tests;

/// Templates can either be literal strings in the input file, or the name of
/// a file to be loaded relative to the input file
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(untagged)]
pub enum TemplateSrc {
    Literal(String),
    File { file: PathBuf },
}

impl TemplateSrc {
    fn load(self, directory: &Path) -> Result<String, ApeError> {
        match self {
            TemplateSrc::Literal(s) => Ok(s),
            TemplateSrc::File { file } => {
                let path = directory.join(&file);
                read_to_string(&path).map_err(|e| {
                    ApeError::Input(format!(
                        "failed to load template file {}: {e}",
                        path.display()
                    ))
                })
            }
        }
    }
}

fn default_command() -> String {
    "qchem".to_owned()
}

fn default_timeout() -> u64 {
    86400
}

fn default_retries() -> usize {
    2
}

fn default_backoff() -> u64 {
    5
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProgram {
    /// The command used to run Q-Chem. The thread count, input file, and
    /// output file are appended to it.
    #[serde(default = "default_command")]
    command: String,

    /// The time in seconds to wait for a single-point energy before killing
    /// it.
    #[serde(default = "default_timeout")]
    timeout: u64,

    /// The number of times to retry a single point that fails in a way that
    /// might succeed on a second attempt, such as a missing output file.
    #[serde(default = "default_retries")]
    retries: usize,

    /// The time in seconds to wait before retrying a failed single point.
    #[serde(default = "default_backoff")]
    backoff: u64,

    /// An optional replacement for the default Q-Chem input template.
    /// Supported formatting directives are {{.charge}}, {{.mult}},
    /// {{.geom}}, {{.method}}, {{.basis}}, and {{.unrestricted}}.
    template: Option<TemplateSrc>,
}

impl Default for RawProgram {
    fn default() -> Self {
        Self {
            command: default_command(),
            timeout: default_timeout(),
            retries: default_retries(),
            backoff: default_backoff(),
            template: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSpecies {
    label: String,

    /// JSON frequency data for the species, relative to the input file
    path: PathBuf,

    /// "UMVT" or "UMN", case-insensitive. Defaults to UMVT.
    protocol: Option<String>,

    /// Overrides the spin multiplicity in the frequency data.
    multiplicity: Option<usize>,

    /// Overrides the charge in the frequency data.
    charge: Option<isize>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTransitionState {
    label: String,

    /// JSON frequency data for the transition state. Mutually exclusive with
    /// the explicit fields below.
    path: Option<PathBuf>,

    /// Only valid together with `path`.
    protocol: Option<String>,

    /// Ground-state energy in J/mol.
    #[serde(rename = "E0")]
    e0: Option<f64>,

    /// Harmonic frequencies of the real modes in cm⁻¹.
    modes: Option<Vec<f64>>,

    #[serde(alias = "spinMultiplicity")]
    spin_multiplicity: Option<usize>,

    #[serde(alias = "opticalIsomers")]
    optical_isomers: Option<usize>,

    /// Imaginary frequency of the reaction coordinate in cm⁻¹.
    frequency: Option<f64>,
}

impl RawTransitionState {
    fn has_explicit(&self) -> bool {
        self.e0.is_some()
            || self.modes.is_some()
            || self.spin_multiplicity.is_some()
            || self.optical_isomers.is_some()
            || self.frequency.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReaction {
    label: String,
    reactants: Vec<String>,
    products: Vec<String>,

    #[serde(alias = "transitionState")]
    transition_state: Option<String>,

    /// "wigner", "eckart", or "none"/empty for no tunneling correction.
    #[serde(default)]
    tunneling: String,
}

fn default_temperatures() -> Vec<f64> {
    vec![298.15]
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawThermo {
    label: String,

    /// Temperatures in K. Defaults to 298.15 K.
    #[serde(alias = "Tlist", default = "default_temperatures")]
    temperatures: Vec<f64>,
}

fn yes() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawKinetics {
    label: String,

    #[serde(alias = "Tmin")]
    tmin: Option<f64>,

    #[serde(alias = "Tmax")]
    tmax: Option<f64>,

    #[serde(alias = "Tlist")]
    tlist: Option<Vec<f64>>,

    #[serde(alias = "Tcount", default)]
    tcount: usize,

    #[serde(default = "yes")]
    three_params: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInput {
    /// The method for the single-point energies, spliced into the template
    /// with {{.method}}.
    level_of_theory: String,

    /// The basis set for the single-point energies, spliced into the template
    /// with {{.basis}}.
    basis: String,

    /// Threads per single-point energy. Defaults to 8 for QM/MM and the
    /// number of heavy atoms, at most 8, otherwise.
    ncpus: Option<usize>,

    /// Where to write the results, relative to the input file. Defaults to the
    /// directory of the input file.
    output_directory: Option<PathBuf>,

    #[serde(default)]
    program: RawProgram,

    #[serde(default)]
    sampling: SamplingSettings,

    #[serde(default)]
    species: Vec<RawSpecies>,

    #[serde(default)]
    transition_state: Vec<RawTransitionState>,

    #[serde(default)]
    reaction: Vec<RawReaction>,

    #[serde(default)]
    thermo: Vec<RawThermo>,

    #[serde(default)]
    kinetics: Vec<RawKinetics>,
}

/// How the single-point energies are run
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProgramSettings {
    pub command: String,
    pub timeout: Duration,
    pub retries: usize,
    pub backoff: Duration,

    /// the contents of the input template, if one was given
    pub template: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Species {
    pub label: String,
    pub path: PathBuf,
}

/// The explicit data for a transition state that is not sampled
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExplicitConformer {
    pub e0: Option<f64>,
    pub modes: Vec<f64>,
    pub spin_multiplicity: usize,
    pub optical_isomers: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransitionState {
    pub label: String,
    pub path: Option<PathBuf>,
    pub conformer: Option<ExplicitConformer>,
    pub frequency: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Tunneling {
    Wigner,
    Eckart,
}

impl FromStr for Tunneling {
    type Err = ApeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "wigner" => Ok(Self::Wigner),
            "eckart" => Ok(Self::Eckart),
            _ => Err(ApeError::Value(format!("unknown tunneling model {s:?}"))),
        }
    }
}

impl Display for Tunneling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tunneling::Wigner => write!(f, "wigner"),
            Tunneling::Eckart => write!(f, "eckart"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Reaction {
    pub label: String,

    /// reactant labels, sorted
    pub reactants: Vec<String>,

    /// product labels, sorted
    pub products: Vec<String>,

    pub transition_state: Option<String>,
    pub tunneling: Option<Tunneling>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThermoJob {
    pub label: String,
    pub input_file: PathBuf,
    pub temperatures: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct KineticsJob {
    pub reaction: String,
    pub tmin: Option<f64>,
    pub tmax: Option<f64>,
    pub tlist: Option<Vec<f64>>,
    pub tcount: usize,
    pub three_params: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum Job {
    Sampling(SamplingJob),
    Thermo(ThermoJob),
    Kinetics(KineticsJob),
}

fn sorted<S, V>(map: &FxHashMap<String, V>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    map.iter().collect::<BTreeMap<_, _>>().serialize(s)
}

/// Everything defined by one input file. Construct with [ParseSession::load]
/// or [ParseSession::from_str]
#[derive(Clone, Debug, Serialize)]
pub struct ParseSession {
    /// the directory of the input file
    pub directory: PathBuf,
    pub output_directory: PathBuf,
    pub level_of_theory: String,
    pub basis: String,
    pub program: ProgramSettings,

    #[serde(serialize_with = "sorted")]
    pub species: FxHashMap<String, Species>,

    #[serde(serialize_with = "sorted")]
    pub transition_states: FxHashMap<String, TransitionState>,

    #[serde(serialize_with = "sorted")]
    pub reactions: FxHashMap<String, Reaction>,

    /// jobs in the order they were defined, with every sampling job ahead of
    /// the thermo and kinetics jobs that depend on it
    pub jobs: Vec<Job>,
}

fn protocol(s: Option<&String>) -> Result<Option<Protocol>, ApeError> {
    s.map(|p| p.parse::<Protocol>()).transpose()
}

impl ParseSession {
    /// load the TOML input file at `path`. relative paths inside it are
    /// resolved against its directory
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ApeError> {
        let path = path.as_ref();
        let contents = read_to_string(path).map_err(|e| {
            ApeError::Input(format!("failed to read {}: {e}", path.display()))
        })?;
        let directory = path.parent().unwrap_or(Path::new("")).to_path_buf();
        Self::from_str(&contents, directory)
    }

    /// parse the TOML in `contents` as if it were read from a file in
    /// `directory`
    pub fn from_str(
        contents: &str,
        directory: impl Into<PathBuf>,
    ) -> Result<Self, ApeError> {
        let raw: RawInput = toml::from_str(contents).map_err(ApeError::from_toml)?;
        let directory = directory.into();
        raw.sampling.validate()?;

        let output_directory = match &raw.output_directory {
            Some(d) => directory.join(d),
            None => directory.clone(),
        };
        let template = raw
            .program
            .template
            .map(|t| t.load(&directory))
            .transpose()?;
        let program = ProgramSettings {
            command: raw.program.command,
            timeout: Duration::from_secs(raw.program.timeout),
            retries: raw.program.retries,
            backoff: Duration::from_secs(raw.program.backoff),
            template,
        };

        let mut session = Self {
            directory,
            output_directory,
            level_of_theory: raw.level_of_theory,
            basis: raw.basis,
            program,
            species: FxHashMap::default(),
            transition_states: FxHashMap::default(),
            reactions: FxHashMap::default(),
            jobs: Vec::new(),
        };

        for s in raw.species {
            session.add_species(s, &raw.sampling, raw.ncpus)?;
        }
        for ts in raw.transition_state {
            session.add_transition_state(ts, &raw.sampling, raw.ncpus)?;
        }
        for rxn in raw.reaction {
            session.add_reaction(rxn)?;
        }
        for t in raw.thermo {
            session.add_thermo(t)?;
        }
        for k in raw.kinetics {
            session.add_kinetics(k)?;
        }
        Ok(session)
    }

    fn sampling_job(
        &self,
        label: &str,
        path: &Path,
        settings: &SamplingSettings,
        ncpus: Option<usize>,
    ) -> SamplingJob {
        let mut job = SamplingJob::new(
            label,
            self.directory.join(path),
            &self.output_directory,
        );
        job.level_of_theory = self.level_of_theory.clone();
        job.basis = self.basis.clone();
        job.settings = settings.clone();
        job.ncpus = ncpus;
        job
    }

    fn add_species(
        &mut self,
        raw: RawSpecies,
        settings: &SamplingSettings,
        ncpus: Option<usize>,
    ) -> Result<(), ApeError> {
        if self.species.contains_key(&raw.label) {
            return Err(ApeError::Value(format!(
                "multiple occurrences of species with label {:?}",
                raw.label
            )));
        }
        log::info!("loading species {}", raw.label);
        let mut job = self.sampling_job(&raw.label, &raw.path, settings, ncpus);
        job.protocol = protocol(raw.protocol.as_ref())?;
        job.multiplicity = raw.multiplicity;
        job.charge = raw.charge;
        self.species.insert(
            raw.label.clone(),
            Species {
                path: job.input_file.clone(),
                label: raw.label,
            },
        );
        self.jobs.push(Job::Sampling(job));
        Ok(())
    }

    fn add_transition_state(
        &mut self,
        raw: RawTransitionState,
        settings: &SamplingSettings,
        ncpus: Option<usize>,
    ) -> Result<(), ApeError> {
        if self.transition_states.contains_key(&raw.label) {
            return Err(ApeError::Value(format!(
                "multiple occurrences of transition state with label {:?}",
                raw.label
            )));
        }
        log::info!("loading transition state {}", raw.label);
        let ts = match (&raw.path, raw.has_explicit()) {
            (Some(_), true) => {
                return Err(ApeError::Input(format!(
                    "transition state {} can only link a frequency file or \
                     give its data directly, not both",
                    raw.label
                )));
            }
            (None, false) => {
                return Err(ApeError::Input(format!(
                    "transition state {} needs a frequency file or explicit \
                     kinetic data",
                    raw.label
                )));
            }
            (Some(path), false) => {
                let mut job = self.sampling_job(&raw.label, path, settings, ncpus);
                job.protocol = protocol(raw.protocol.as_ref())?;
                job.is_ts = true;
                let path = job.input_file.clone();
                self.jobs.push(Job::Sampling(job));
                TransitionState {
                    label: raw.label.clone(),
                    path: Some(path),
                    conformer: None,
                    frequency: None,
                }
            }
            (None, true) => {
                if raw.protocol.is_some() {
                    return Err(ApeError::Type(format!(
                        "transition state {} got an unexpected key \
                         \"protocol\" without a frequency file",
                        raw.label
                    )));
                }
                TransitionState {
                    label: raw.label.clone(),
                    path: None,
                    conformer: Some(ExplicitConformer {
                        e0: raw.e0,
                        modes: raw.modes.unwrap_or_default(),
                        spin_multiplicity: raw.spin_multiplicity.unwrap_or(1),
                        optical_isomers: raw.optical_isomers.unwrap_or(1),
                    }),
                    frequency: raw.frequency,
                }
            }
        };
        self.transition_states.insert(raw.label, ts);
        Ok(())
    }

    fn add_reaction(&mut self, raw: RawReaction) -> Result<(), ApeError> {
        let mut label = raw.label;
        if self.reactions.contains_key(&label) {
            match &raw.transition_state {
                Some(ts) if !self.reactions.contains_key(&(label.clone() + ts)) => {
                    label.push_str(ts);
                }
                _ => {
                    return Err(ApeError::Value(format!(
                        "multiple occurrences of reaction with label {label:?}"
                    )));
                }
            }
        }
        log::info!("loading reaction {label}");
        let mut reactants = self.lookup_species(&raw.reactants, &label)?;
        let mut products = self.lookup_species(&raw.products, &label)?;
        reactants.sort();
        products.sort();
        if let Some(ts) = &raw.transition_state
            && !self.transition_states.contains_key(ts)
        {
            return Err(ApeError::Value(format!(
                "unknown transition state {ts:?} in reaction {label}"
            )));
        }
        let tunneling = match raw.tunneling.trim() {
            t if t.is_empty() || t.eq_ignore_ascii_case("none") => None,
            t => Some(t.parse::<Tunneling>()?),
        };
        self.reactions.insert(
            label.clone(),
            Reaction {
                label,
                reactants,
                products,
                transition_state: raw.transition_state,
                tunneling,
            },
        );
        Ok(())
    }

    fn lookup_species(
        &self,
        labels: &[String],
        reaction: &str,
    ) -> Result<Vec<String>, ApeError> {
        labels
            .iter()
            .map(|l| {
                if self.species.contains_key(l) {
                    Ok(l.clone())
                } else {
                    Err(ApeError::Value(format!(
                        "unknown species {l:?} in reaction {reaction}"
                    )))
                }
            })
            .collect()
    }

    fn add_thermo(&mut self, raw: RawThermo) -> Result<(), ApeError> {
        let Some(species) = self.species.get(&raw.label) else {
            return Err(ApeError::Value(format!(
                "unknown species label {:?} for thermo job",
                raw.label
            )));
        };
        self.jobs.push(Job::Thermo(ThermoJob {
            input_file: species.path.clone(),
            label: raw.label,
            temperatures: raw.temperatures,
        }));
        Ok(())
    }

    fn add_kinetics(&mut self, raw: RawKinetics) -> Result<(), ApeError> {
        if !self.reactions.contains_key(&raw.label) {
            return Err(ApeError::Value(format!(
                "unknown reaction label {:?} for kinetics job",
                raw.label
            )));
        }
        self.jobs.push(Job::Kinetics(KineticsJob {
            reaction: raw.label,
            tmin: raw.tmin,
            tmax: raw.tmax,
            tlist: raw.tlist,
            tcount: raw.tcount,
            three_params: raw.three_params,
        }));
        Ok(())
    }

    /// the sampling jobs, in the order they were defined
    pub fn sampling_jobs(&mut self) -> impl Iterator<Item = &mut SamplingJob> {
        self.jobs.iter_mut().filter_map(|j| match j {
            Job::Sampling(s) => Some(s),
            _ => None,
        })
    }
}
