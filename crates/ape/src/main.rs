use std::{fs::File, os::unix::prelude::AsRawFd, path::Path};

use ape::{
    die,
    input::ParseSession,
    job::SamplingJob,
    sampling::{ModeKind, SamplingResult},
    summary::Summary,
};
use clap::Parser;
use qcjob::{Local, QChemEvaluator, Retry, program::Template};

include!(concat!(env!("OUT_DIR"), "/version.rs"));

/// anharmonic vibrational sampling
#[derive(Parser, Debug)]
#[command(author, about, long_about = None)]
struct Args {
    /// input file
    #[arg(value_parser, default_value_t = String::from("ape.toml"))]
    infile: String,

    /// Overwrite existing output from a previous run. Defaults to false.
    #[arg(short, long, default_value_t = false)]
    overwrite: bool,

    /// Print the git commit hash and exit. Defaults to false.
    #[arg(short, long, default_value_t = false)]
    version: bool,

    /// Serialize the parsed input file to JSON and exit.
    #[arg(short, default_value_t = false, hide = true)]
    json: bool,

    /// Run the single points without writing the sampling records or
    /// trajectories. Defaults to false.
    #[arg(short, long, default_value_t = false)]
    no_save: bool,
}

fn print_result(job: &SamplingJob, result: &SamplingResult) {
    println!("{} sampling results:", job.label);
    println!(
        "{:>5}{:>6}{:>12}{:>10}{:>10}{:>9}",
        "Mode", "Kind", "Freq", "Step", "Samples", "Sigma"
    );
    for mode in &result.modes {
        let freq = match mode.frequency {
            Some(f) => format!("{f:12.2}"),
            None => format!("{:>12}", "-"),
        };
        let sigma = match mode.symmetry_number {
            Some(s) => format!("{s:9}"),
            None => format!("{:>9}", "-"),
        };
        let kind = match mode.kind {
            ModeKind::Torsion => "tors",
            ModeKind::Vibration => "vib",
        };
        println!(
            "{:5}{kind:>6}{freq}{:10.4}{:10}{sigma}",
            mode.mode,
            mode.step_size,
            mode.energy.len(),
        );
    }
    println!("min_elect = {:.10} Eh", result.min_elect);
    if let Some(e0) = job.parsed.as_ref().and_then(|p| p.conformer.e0) {
        println!("E0 = {e0:.2} J/mol");
    }
    println!();
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    if args.version {
        println!("version: {}", version());
        return Ok(());
    }
    if args.json {
        let session = match ParseSession::load(&args.infile) {
            Ok(s) => s,
            Err(e) => die!("failed to load {} with {e}", args.infile),
        };
        println!("{}", serde_json::to_string(&session)?);
        return Ok(());
    }
    let path = Path::new("ape.out");
    if path.exists() && !args.overwrite {
        die!("existing ape output. overwrite with -o/--overwrite");
    }
    let outfile = File::create(path)?;
    let logfile = File::create("ape.log")?;
    let out_fd = outfile.as_raw_fd();
    let log_fd = logfile.as_raw_fd();
    // redirect stdout to outfile and stderr to logfile
    unsafe {
        libc::dup2(out_fd, 1);
        libc::dup2(log_fd, 2);
    }
    let mut session = match ParseSession::load(&args.infile) {
        Ok(s) => s,
        Err(e) => die!("failed to load {} with {e}", args.infile),
    };
    println!("PID: {}", std::process::id());
    println!("version: {}", version());
    println!();

    let program = &session.program;
    let template = program.template.as_deref().map(Template::from);
    let local = Local::new(&program.command, program.timeout);
    let mut evaluator = Retry::new(
        QChemEvaluator::new(local, template),
        program.retries,
        program.backoff,
    );

    let mut summary = Summary::new(&session);
    for job in session.sampling_jobs() {
        log::info!("starting sampling job {}", job.label);
        match job.execute(&mut evaluator, !args.no_save) {
            Ok(result) => {
                print_result(job, &result);
                summary.push(job, &result);
            }
            Err(e) => {
                log::error!("sampling job {} failed: {e}", job.label);
                println!("{} failed: {e}\n", job.label);
                summary.fail(job, &e);
            }
        }
    }

    std::fs::create_dir_all(&session.output_directory)?;
    summary.write(session.output_directory.join("summary.json"))?;

    if !summary.failed.is_empty() {
        anyhow::bail!("{} sampling jobs failed", summary.failed.len());
    }

    println!("normal termination of ape");

    Ok(())
}
