use std::{
    error::Error,
    fmt::Display,
    fs::create_dir_all,
    thread::sleep,
    time::Duration,
};

use crate::{
    local::Local,
    program::{
        Program, ProgramError, SinglePoint, Template,
        qchem::{DEFAULT_TEMPLATE, QChem},
    },
};


#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// the program ran but its output could not be used
    Program(ProgramError),

    /// the program did not finish within the timeout
    Timeout(String),

    /// the program could not be started or waited on
    Spawn(String),

    /// any other failure reported by an evaluator
    Other(String),
}

impl EvalError {
    /// whether retrying the same calculation could succeed. Errors reported
    /// by the program itself are deterministic, but missing output may just
    /// mean the job was interrupted
    pub fn is_transient(&self) -> bool {
        match self {
            EvalError::Timeout(_) | EvalError::Spawn(_) => true,
            EvalError::Program(e) => matches!(
                e,
                ProgramError::FileNotFound(_)
                    | ProgramError::EnergyNotFound(_)
                    | ProgramError::ReadFileError(..)
            ),
            EvalError::Other(_) => false,
        }
    }
}

impl Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::Program(e) => write!(f, "{e}"),
            EvalError::Timeout(s) => write!(f, "{s} timed out"),
            EvalError::Spawn(s) => write!(f, "{s}"),
            EvalError::Other(s) => write!(f, "{s}"),
        }
    }
}

impl Error for EvalError {}

impl From<ProgramError> for EvalError {
    fn from(value: ProgramError) -> Self {
        Self::Program(value)
    }
}

/// Anything that can turn a [SinglePoint] into an electronic energy in
/// Hartree
pub trait Evaluator {
    fn energy(&mut self, point: &SinglePoint) -> Result<f64, EvalError>;
}

impl<F> Evaluator for F
where
    F: FnMut(&SinglePoint) -> Result<f64, EvalError>,
{
    fn energy(&mut self, point: &SinglePoint) -> Result<f64, EvalError> {
        self(point)
    }
}

/// Q-Chem run through a [Local] runner
#[derive(Clone, Debug)]
pub struct QChemEvaluator {
    pub local: Local,
    pub template: Template,
}

impl Default for QChemEvaluator {
    fn default() -> Self {
        Self {
            local: Local::default(),
            template: Template::from(DEFAULT_TEMPLATE),
        }
    }
}

impl QChemEvaluator {
    pub fn new(local: Local, template: Option<Template>) -> Self {
        Self {
            local,
            template: template.unwrap_or_else(|| Template::from(DEFAULT_TEMPLATE)),
        }
    }
}

impl Evaluator for QChemEvaluator {
    fn energy(&mut self, point: &SinglePoint) -> Result<f64, EvalError> {
        create_dir_all(&point.dir).map_err(|e| {
            EvalError::Spawn(format!(
                "failed to create {}: {e}",
                point.dir.display()
            ))
        })?;
        let filename =
            point.dir.join(&point.name).to_string_lossy().to_string();
        let prog = QChem::new(filename, self.template.clone(), point.clone());
        self.local.run(&prog, point.ncpus)
    }
}

/// Retry transient failures of the wrapped [Evaluator] up to `retries` extra
/// times, sleeping `backoff` between attempts
#[derive(Clone, Debug)]
pub struct Retry<E> {
    pub inner: E,
    pub retries: usize,
    pub backoff: Duration,
}

impl<E> Retry<E> {
    pub fn new(inner: E, retries: usize, backoff: Duration) -> Self {
        Self {
            inner,
            retries,
            backoff,
        }
    }
}

impl<E: Evaluator> Evaluator for Retry<E> {
    fn energy(&mut self, point: &SinglePoint) -> Result<f64, EvalError> {
        let mut attempt = 0;
        loop {
            match self.inner.energy(point) {
                Ok(e) => return Ok(e),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    log::warn!(
                        "{} failed with {e}, retrying ({attempt}/{})",
                        point.name,
                        self.retries
                    );
                    sleep(self.backoff);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
