use std::{
    process::{Command, Stdio},
    thread::sleep,
    time::{Duration, Instant},
};

use crate::{evaluator::EvalError, program::Program};

/// Run one calculation at a time on the current machine, waiting for each to
/// finish
#[derive(Clone, Debug, PartialEq)]
pub struct Local {
    /// the program to run, possibly followed by fixed arguments. the thread
    /// count, input file, and output file are appended to it
    pub command: String,

    /// give up on a calculation after this long
    pub timeout: Duration,

    /// interval between checks for a finished calculation
    pub poll: Duration,
}

impl Default for Local {
    fn default() -> Self {
        Self {
            command: "qchem".to_owned(),
            timeout: Duration::from_secs(24 * 3600),
            poll: Duration::from_millis(100),
        }
    }
}

impl Local {
    pub fn new(command: &str, timeout: Duration) -> Self {
        Self {
            command: command.to_owned(),
            timeout,
            ..Default::default()
        }
    }

    /// write the input for `prog`, run it with `ncpus` threads, and read its
    /// output. the input and output files are left in place
    pub fn run<P: Program>(
        &self,
        prog: &P,
        ncpus: usize,
    ) -> Result<f64, EvalError> {
        prog.write_input()?;

        let mut words = self.command.split_whitespace();
        let Some(exe) = words.next() else {
            return Err(EvalError::Spawn("empty program command".to_owned()));
        };
        let mut child = Command::new(exe)
            .args(words)
            .arg("-nt")
            .arg(ncpus.to_string())
            .arg(prog.infile())
            .arg(prog.outfile())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                EvalError::Spawn(format!("failed to run {exe}: {e}"))
            })?;

        let start = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if !status.success() {
                        log::warn!(
                            "{} exited with {status} for {}",
                            self.command,
                            prog.infile()
                        );
                    }
                    break;
                }
                Ok(None) if start.elapsed() > self.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(EvalError::Timeout(prog.infile()));
                }
                Ok(None) => sleep(self.poll),
                Err(e) => {
                    return Err(EvalError::Spawn(format!(
                        "failed to wait on {}: {e}",
                        prog.infile()
                    )));
                }
            }
        }

        let res = P::read_output(&prog.filename())?;
        log::trace!("{} finished in {:.1} s", prog.infile(), res.time);
        Ok(res.energy)
    }
}
