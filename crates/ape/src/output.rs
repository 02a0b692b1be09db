//! Writing and reading the sampling record and the per-mode trajectories

use std::{
    collections::BTreeMap,
    fs::{File, OpenOptions, create_dir_all},
    io::{BufWriter, Write},
    path::Path,
};

use csv::{ReaderBuilder, Terminator, WriterBuilder};

use crate::{
    ApeError,
    sampling::{ModeKind, SamplingResult},
};

const BANNER: &str = "=------------------------------------------------------------------------------=";

/// The contents of a sampling record read back from disk
#[derive(Clone, Debug, PartialEq)]
pub struct CsvRecord {
    pub min_elect: f64,
    pub modes: Vec<CsvMode>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CsvMode {
    pub mode: usize,
    pub kind: ModeKind,
    pub symmetry_number: Option<usize>,
    pub m: usize,
    pub k: usize,
    pub step_size: f64,

    /// electronic energy in Hartree of each sample
    pub samples: BTreeMap<i32, f64>,
}

/// append `result` to the CSV file at `path`. the global minimum is only
/// written when the file is created
pub fn write_csv(
    path: impl AsRef<Path>,
    result: &SamplingResult,
) -> Result<(), ApeError> {
    let path = path.as_ref();
    let new = !path.exists();
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut w = WriterBuilder::new()
        .flexible(true)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(file);
    if new {
        w.write_record(["min_elect", result.min_elect.to_string().as_str()])?;
    }
    for mode in &result.modes {
        w.write_record([mode.name()])?;
        if let Some(sigma) = mode.symmetry_number {
            w.write_record(["symmetry_number", sigma.to_string().as_str()])?;
        }
        w.write_record(["M", mode.m.to_string().as_str()])?;
        w.write_record(["K", mode.k.to_string().as_str()])?;
        w.write_record(["step_size", mode.step_size.to_string().as_str()])?;
        w.write_record(["sample", "total energy(HARTREE)"])?;
        for (sample, e) in &mode.energy {
            w.write_record([sample.to_string(), e.to_string()])?;
        }
    }
    w.flush()?;
    Ok(())
}

fn parse_field<T: std::str::FromStr>(
    s: &str,
    line: usize,
) -> Result<T, ApeError> {
    s.trim().parse().map_err(|_| {
        ApeError::Input(format!(
            "failed to parse {s:?} on line {line} of sampling record"
        ))
    })
}

/// split a mode name like `mode_3_vib` into its number and kind
fn parse_name(name: &str) -> Option<(usize, ModeKind)> {
    let rest = name.strip_prefix("mode_")?;
    let (num, kind) = rest.split_once('_')?;
    let kind = match kind {
        "tors" => ModeKind::Torsion,
        "vib" => ModeKind::Vibration,
        _ => return None,
    };
    Some((num.parse().ok()?, kind))
}

/// read a sampling record written by [write_csv]
pub fn read_csv(path: impl AsRef<Path>) -> Result<CsvRecord, ApeError> {
    let mut r = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut min_elect = None;
    let mut modes: Vec<CsvMode> = Vec::new();
    for (i, row) in r.records().enumerate() {
        let row = row?;
        let line = i + 1;
        let key = row.get(0).unwrap_or_default();
        let value = row.get(1);
        if let Some((mode, kind)) = parse_name(key) {
            modes.push(CsvMode {
                mode,
                kind,
                symmetry_number: None,
                m: 0,
                k: 0,
                step_size: 0.0,
                samples: BTreeMap::new(),
            });
            continue;
        }
        let Some(value) = value else {
            return Err(ApeError::Input(format!(
                "missing value on line {line} of sampling record"
            )));
        };
        if key == "min_elect" {
            min_elect = Some(parse_field(value, line)?);
            continue;
        }
        let Some(cur) = modes.last_mut() else {
            return Err(ApeError::Input(format!(
                "{key:?} before the first mode on line {line} of sampling \
                 record"
            )));
        };
        match key {
            "symmetry_number" => {
                cur.symmetry_number = Some(parse_field(value, line)?)
            }
            "M" => cur.m = parse_field(value, line)?,
            "K" => cur.k = parse_field(value, line)?,
            "step_size" => cur.step_size = parse_field(value, line)?,
            "sample" => {}
            _ => {
                let sample = parse_field(key, line)?;
                cur.samples.insert(sample, parse_field(value, line)?);
            }
        }
    }
    let Some(min_elect) = min_elect else {
        return Err(ApeError::Input("no min_elect in sampling record".into()));
    };
    Ok(CsvRecord { min_elect, modes })
}

/// write the geometry and energy of every sample of mode `i` to
/// `dir/mode_<i>.txt` in XYZ trajectory format, followed by a timestamp
pub fn write_trajectories(
    dir: impl AsRef<Path>,
    natom: usize,
    result: &SamplingResult,
) -> Result<(), ApeError> {
    let dir = dir.as_ref();
    create_dir_all(dir)?;
    let now = jiff::Timestamp::now().strftime("%Y-%m-%d %H:%M:%S");
    for mode in &result.modes {
        let path = dir.join(format!("mode_{}.txt", mode.mode));
        let mut f = BufWriter::new(File::create(path)?);
        for (sample, mol) in &mode.xyz {
            let e = mode.energy[sample];
            write!(
                f,
                "{natom}\n# Point {sample} Energy = {e}\n{}",
                mol.xyz_string()
            )?;
        }
        writeln!(f, "\n    This sampling was finished on:   {now}")?;
        writeln!(f, "{BANNER}")?;
        writeln!(f, "Sampling finished.")?;
        writeln!(f, "{BANNER}")?;
        f.flush()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use molecule::molecule;

    use super::*;
    use crate::sampling::ModeRecord;

    fn record(mode: usize, kind: ModeKind, energies: &[(i32, f64)]) -> ModeRecord {
        let mol = molecule![
            H 0.0 0.0 0.0
            H 0.0 0.0 0.74
        ];
        let torsion = kind == ModeKind::Torsion;
        ModeRecord {
            mode,
            kind,
            frequency: (!torsion).then_some(4401.2),
            reduced_mass: (!torsion).then_some(0.504),
            step_size: if torsion { 0.5 } else { 0.125 },
            symmetry_number: torsion.then_some(3),
            m: 1,
            k: mode,
            qj: vec![1.0],
            periodic: None,
            xyz: energies.iter().map(|&(s, _)| (s, mol.clone())).collect(),
            energy: energies.iter().copied().collect::<BTreeMap<_, _>>(),
        }
    }

    fn result() -> SamplingResult {
        SamplingResult::new(vec![
            record(1, ModeKind::Torsion, &[(0, -1.5), (1, -1.25), (2, -1.375)]),
            record(2, ModeKind::Vibration, &[(-1, -1.25), (0, -1.5), (1, -1.4375)]),
        ])
    }

    #[test]
    fn csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h2_sampling_result.csv");
        write_csv(&path, &result()).unwrap();
        let got = std::fs::read_to_string(&path).unwrap();
        insta::assert_snapshot!(got, @r"
        min_elect,-1.5
        mode_1_tors
        symmetry_number,3
        M,1
        K,1
        step_size,0.5
        sample,total energy(HARTREE)
        0,-1.5
        1,-1.25
        2,-1.375
        mode_2_vib
        M,1
        K,2
        step_size,0.125
        sample,total energy(HARTREE)
        -1,-1.25
        0,-1.5
        1,-1.4375
        ");
    }

    #[test]
    fn csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h2_sampling_result.csv");
        let want = result();
        write_csv(&path, &want).unwrap();
        let got = read_csv(&path).unwrap();
        assert_eq!(got.min_elect, want.min_elect);
        assert_eq!(got.modes.len(), 2);
        for (g, w) in got.modes.iter().zip(&want.modes) {
            assert_eq!(g.mode, w.mode);
            assert_eq!(g.kind, w.kind);
            assert_eq!(g.symmetry_number, w.symmetry_number);
            assert_eq!(g.m, w.m);
            assert_eq!(g.k, w.k);
            assert_eq!(g.step_size, w.step_size);
            assert_eq!(g.samples, w.energy);
        }
    }

    #[test]
    fn append_keeps_one_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h2_sampling_result.csv");
        write_csv(&path, &result()).unwrap();
        write_csv(&path, &result()).unwrap();
        let got = std::fs::read_to_string(&path).unwrap();
        assert_eq!(got.matches("min_elect").count(), 1);
        assert_eq!(got.matches("mode_2_vib").count(), 2);
    }

    #[test]
    fn trajectories() {
        let dir = tempfile::tempdir().unwrap();
        write_trajectories(dir.path(), 2, &result()).unwrap();
        let got =
            std::fs::read_to_string(dir.path().join("mode_2.txt")).unwrap();
        let mut lines = got.lines();
        assert_eq!(lines.next(), Some("2"));
        assert_eq!(lines.next(), Some("# Point -1 Energy = -1.25"));
        assert_eq!(got.matches("# Point").count(), 3);
        assert!(got.contains("This sampling was finished on:"));
        assert!(got.trim_end().ends_with(BANNER));
        assert!(dir.path().join("mode_1.txt").exists());
    }
}
