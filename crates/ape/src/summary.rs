//! The machine-readable record of a whole run, written next to the sampling
//! records for the thermodynamic and kinetic analyses that follow

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{
    ApeError,
    classify::ModeCount,
    input::{Job, KineticsJob, ParseSession, Reaction, ThermoJob},
    job::{Protocol, SamplingJob},
    sampling::SamplingResult,
};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct JobSummary {
    pub label: String,
    pub protocol: Option<Protocol>,
    pub is_ts: bool,
    pub counts: Option<ModeCount>,

    /// the lowest sampled electronic energy in Hartree
    pub min_elect: f64,

    /// ground-state energy in J/mol
    pub e0: Option<f64>,

    /// imaginary frequency of a transition state in cm⁻¹
    pub imaginary_frequency: Option<f64>,

    pub csv: PathBuf,
}

impl JobSummary {
    pub fn new(job: &SamplingJob, result: &SamplingResult) -> Self {
        let parsed = job.parsed.as_ref();
        Self {
            label: job.label.clone(),
            protocol: job.protocol,
            is_ts: job.is_ts,
            counts: parsed.map(|p| p.counts),
            min_elect: result.min_elect,
            e0: parsed.and_then(|p| p.conformer.e0),
            imaginary_frequency: parsed.and_then(|p| p.imaginary_frequency),
            csv: job.csv_path(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Summary {
    pub jobs: Vec<JobSummary>,

    /// labels of the sampling jobs that failed, with the reason
    pub failed: BTreeMap<String, String>,

    pub reactions: Vec<Reaction>,
    pub thermo: Vec<ThermoJob>,
    pub kinetics: Vec<KineticsJob>,
}

impl Summary {
    /// collect the reactions and the thermo and kinetics requests of
    /// `session`. sampling jobs are added with [Summary::push] as they finish
    pub fn new(session: &ParseSession) -> Self {
        let mut reactions: Vec<_> = session.reactions.values().cloned().collect();
        reactions.sort_by(|a, b| a.label.cmp(&b.label));
        let mut ret = Self {
            reactions,
            ..Self::default()
        };
        for job in &session.jobs {
            match job {
                Job::Thermo(t) => ret.thermo.push(t.clone()),
                Job::Kinetics(k) => ret.kinetics.push(k.clone()),
                Job::Sampling(_) => {}
            }
        }
        ret
    }

    pub fn push(&mut self, job: &SamplingJob, result: &SamplingResult) {
        self.jobs.push(JobSummary::new(job, result));
    }

    pub fn fail(&mut self, job: &SamplingJob, err: &ApeError) {
        self.failed.insert(job.label.clone(), err.to_string());
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), ApeError> {
        let mut f = BufWriter::new(File::create(path)?);
        writeln!(f, "{}", serde_json::to_string_pretty(self)?)?;
        f.flush()?;
        Ok(())
    }
}
