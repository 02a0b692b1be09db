use std::{fs::read_to_string, path::Path};

use assert_cmd::Command;
use insta::{assert_snapshot, with_settings};
use tempfile::{TempDir, tempdir};

const FILES: [&str; 3] = ["ape.toml", "water.json", "fake_qchem.sh"];

fn setup() -> std::io::Result<TempDir> {
    let dir = tempdir()?;
    for file in FILES {
        std::fs::copy(
            Path::new("tests/testfiles").join(file),
            dir.path().join(file),
        )?;
    }
    Ok(dir)
}

#[test]
#[cfg(unix)]
fn run() -> std::io::Result<()> {
    let dir = setup()?;
    let mut cmd = Command::cargo_bin("ape").unwrap();
    let assert = cmd.arg("ape.toml").current_dir(&dir).assert();
    let output = assert.get_output();

    assert!(
        output.status.success(),
        "stderr: {}\nlog: {}",
        String::from_utf8_lossy(&output.stderr),
        read_to_string(dir.path().join("ape.log"))?,
    );

    let out = read_to_string(dir.path().join("ape.out"))?;
    with_settings!({
        filters => vec![
            (r"(?m)^PID: \d+$", "PID: [PID]"),
            (r"(?m)^version: [a-z0-9]+$", "version: [version]"),
            (r"(?m)^( +\d+ +vib) +\S+ +\S+( +3 +-)$", "$1 [freq] [step]$2"),
            (r"(?m)^E0 = .*$", "E0 = [E0]"),
        ]
    }, {
        assert_snapshot!(out, @r"
        PID: [PID]
        version: [version]

        water sampling results:
         Mode  Kind        Freq      Step   Samples    Sigma
            1   vib [freq] [step]         3        -
            2   vib [freq] [step]         3        -
            3   vib [freq] [step]         3        -
        min_elect = -76.0266327341 Eh
        E0 = [E0]

        normal termination of ape
        ");
    });

    let csv = read_to_string(dir.path().join("water_sampling_result.csv"))?;
    assert!(csv.starts_with("min_elect,-76.0266327341\nmode_1_vib\nM,1\nK,"));
    assert_eq!(csv.matches("_vib").count(), 3);

    for i in 1..=3 {
        let traj = dir.path().join(format!("plot/water/mode_{i}.txt"));
        assert!(read_to_string(traj)?.contains("Sampling finished."));
    }
    assert!(dir.path().join("output_file/water/eq.in").exists());

    let summary: serde_json::Value =
        serde_json::from_str(&read_to_string(dir.path().join("summary.json"))?)?;
    assert_eq!(summary["jobs"][0]["label"], "water");
    assert_eq!(summary["jobs"][0]["counts"]["n_vib"], 3);
    assert_eq!(summary["thermo"][0]["temperatures"][1], 500.0);
    Ok(())
}

#[test]
#[cfg(unix)]
fn existing_output() -> std::io::Result<()> {
    let dir = setup()?;
    std::fs::write(dir.path().join("ape.out"), "")?;
    let mut cmd = Command::cargo_bin("ape").unwrap();
    cmd.arg("ape.toml").current_dir(&dir).assert().failure();
    Ok(())
}

#[test]
fn json() -> std::io::Result<()> {
    let dir = setup()?;
    let mut cmd = Command::cargo_bin("ape").unwrap();
    let assert = cmd.arg("-j").arg("ape.toml").current_dir(&dir).assert();
    let output = assert.success().get_output().clone();
    let got: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(got["level_of_theory"], "HF");
    assert_eq!(got["program"]["command"], "sh fake_qchem.sh");
    assert_eq!(got["jobs"][0]["type"], "Sampling");
    assert_eq!(got["jobs"][0]["label"], "water");
    assert_eq!(got["jobs"][1]["type"], "Thermo");
    assert!(got["species"]["water"].is_object());
    assert!(!dir.path().join("ape.out").exists());
    Ok(())
}
