use std::path::Path;

use test_case::test_case;

use super::*;

const HEAD: &str = r#"
level_of_theory = "B3LYP"
basis = "6-31G*"
"#;

fn session(body: &str) -> Result<ParseSession, ApeError> {
    ParseSession::from_str(&format!("{HEAD}{body}"), "inputs")
}

const FULL: &str = r#"
ncpus = 4
output_directory = "out"

[program]
command = "qchem -save"
timeout = 600
retries = 1

[sampling]
scan_res = 20.0

[[species]]
label = "CH3OH"
path = "ch3oh.json"

[[species]]
label = "OH"
path = "oh.json"
protocol = "umn"
multiplicity = 2

[[species]]
label = "CH2OH"
path = "ch2oh.json"

[[species]]
label = "H2O"
path = "h2o.json"

[[transition_state]]
label = "TS"
path = "ts.json"

[[reaction]]
label = "abstraction"
reactants = ["OH", "CH3OH"]
products = ["H2O", "CH2OH"]
transition_state = "TS"
tunneling = "Eckart"

[[thermo]]
label = "CH3OH"

[[kinetics]]
label = "abstraction"
Tmin = 300.0
Tmax = 2000.0
Tcount = 8
"#;

#[test]
fn full() {
    let got = session(FULL).unwrap();
    assert_eq!(got.output_directory, Path::new("inputs/out"));
    assert_eq!(got.program.command, "qchem -save");
    assert_eq!(got.program.timeout, Duration::from_secs(600));
    assert_eq!(got.program.retries, 1);
    assert_eq!(got.program.template, None);
    assert_eq!(got.species.len(), 4);
    assert_eq!(got.jobs.len(), 7);

    let sampling: Vec<&SamplingJob> = got
        .jobs
        .iter()
        .filter_map(|j| match j {
            Job::Sampling(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(sampling.len(), 5);
    let oh = sampling[1];
    assert_eq!(oh.label, "OH");
    assert_eq!(oh.input_file, Path::new("inputs/oh.json"));
    assert_eq!(oh.output_directory, Path::new("inputs/out"));
    assert_eq!(oh.protocol, Some(Protocol::UMN));
    assert_eq!(oh.multiplicity, Some(2));
    assert_eq!(oh.ncpus, Some(4));
    assert_eq!(oh.level_of_theory, "B3LYP");
    assert_eq!(oh.settings.scan_res, 20.0);
    assert!(!oh.is_ts);
    assert_eq!(sampling[0].protocol, None);

    let ts = sampling[4];
    assert_eq!(ts.label, "TS");
    assert!(ts.is_ts);

    let rxn = &got.reactions["abstraction"];
    assert_eq!(rxn.reactants, vec!["CH3OH", "OH"]);
    assert_eq!(rxn.products, vec!["CH2OH", "H2O"]);
    assert_eq!(rxn.tunneling, Some(Tunneling::Eckart));

    let Job::Thermo(thermo) = &got.jobs[5] else {
        panic!("expected a thermo job, got {:?}", got.jobs[5]);
    };
    assert_eq!(thermo.temperatures, vec![298.15]);
    assert_eq!(thermo.input_file, Path::new("inputs/ch3oh.json"));

    let Job::Kinetics(kinetics) = &got.jobs[6] else {
        panic!("expected a kinetics job, got {:?}", got.jobs[6]);
    };
    assert_eq!(kinetics.reaction, "abstraction");
    assert_eq!(kinetics.tmin, Some(300.0));
    assert_eq!(kinetics.tcount, 8);
    assert!(kinetics.three_params);
}

#[test]
fn defaults() {
    let got = session("").unwrap();
    assert_eq!(got.output_directory, Path::new("inputs"));
    assert_eq!(got.program.command, "qchem");
    assert_eq!(got.program.timeout, Duration::from_secs(86400));
    assert_eq!(got.program.retries, 2);
    assert!(got.jobs.is_empty());
}

#[test]
fn literal_template() {
    let got = session(
        r#"
[program]
template = "$rem\nmethod {{.method}}\n$end"
"#,
    )
    .unwrap();
    assert_eq!(
        got.program.template.as_deref(),
        Some("$rem\nmethod {{.method}}\n$end")
    );
}

#[test]
fn template_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("template.in"), "$rem\n$end\n").unwrap();
    let input = format!(
        "{HEAD}
[program]
template = {{ file = \"template.in\" }}
"
    );
    let got = ParseSession::from_str(&input, dir.path()).unwrap();
    assert_eq!(got.program.template.as_deref(), Some("$rem\n$end\n"));

    let missing = ParseSession::from_str(&input, "nowhere").unwrap_err();
    assert!(missing.is_input());
}

#[test]
fn explicit_ts() {
    let got = session(
        r#"
[[transition_state]]
label = "TS"
E0 = -1.5e5
spinMultiplicity = 2
frequency = -1500.0
"#,
    )
    .unwrap();
    assert!(got.jobs.is_empty());
    let ts = &got.transition_states["TS"];
    assert_eq!(ts.frequency, Some(-1500.0));
    let conf = ts.conformer.as_ref().unwrap();
    assert_eq!(conf.spin_multiplicity, 2);
    assert_eq!(conf.optical_isomers, 1);
}

#[test]
fn renamed_reaction() {
    let got = session(
        r#"
[[species]]
label = "A"
path = "a.json"

[[transition_state]]
label = "TS1"
path = "ts1.json"

[[reaction]]
label = "rxn"
reactants = ["A"]
products = ["A"]

[[reaction]]
label = "rxn"
reactants = ["A"]
products = ["A"]
transition_state = "TS1"
"#,
    )
    .unwrap();
    assert!(got.reactions.contains_key("rxn"));
    assert!(got.reactions.contains_key("rxnTS1"));
}

#[test]
fn no_tunneling() {
    let got = session(
        r#"
[[species]]
label = "A"
path = "a.json"

[[reaction]]
label = "rxn"
reactants = ["A"]
products = ["A"]
tunneling = "None"
"#,
    )
    .unwrap();
    assert_eq!(got.reactions["rxn"].tunneling, None);
}

#[test]
fn sorted_json() {
    let got = session(
        r#"
[[species]]
label = "b"
path = "b.json"

[[species]]
label = "a"
path = "a.json"
"#,
    )
    .unwrap();
    let json = serde_json::to_string(&got).unwrap();
    let a = json.find("\"a\":").unwrap();
    let b = json.find("\"b\":").unwrap();
    assert!(a < b);
}

#[test_case(r#"
[[species]]
label = "A"
path = "a.json"
[[species]]
label = "A"
path = "b.json"
"# ; "duplicate species")]
#[test_case(r#"
[[transition_state]]
label = "TS"
path = "a.json"
[[transition_state]]
label = "TS"
path = "b.json"
"# ; "duplicate ts")]
#[test_case(r#"
[[species]]
label = "A"
path = "a.json"
[[reaction]]
label = "rxn"
reactants = ["A"]
products = ["A"]
[[reaction]]
label = "rxn"
reactants = ["A"]
products = ["A"]
"# ; "duplicate reaction")]
#[test_case(r#"
[[species]]
label = "A"
path = "a.json"
[[reaction]]
label = "rxn"
reactants = ["A"]
products = ["B"]
"# ; "unknown species")]
#[test_case(r#"
[[species]]
label = "A"
path = "a.json"
[[reaction]]
label = "rxn"
reactants = ["A"]
products = ["A"]
transition_state = "TS"
"# ; "unknown ts")]
#[test_case(r#"
[[species]]
label = "A"
path = "a.json"
[[reaction]]
label = "rxn"
reactants = ["A"]
products = ["A"]
tunneling = "bell"
"# ; "unknown tunneling")]
#[test_case(r#"
[[thermo]]
label = "A"
"# ; "unknown thermo")]
#[test_case(r#"
[[kinetics]]
label = "rxn"
"# ; "unknown kinetics")]
fn value_errors(body: &str) {
    let got = session(body).unwrap_err();
    assert!(got.is_value(), "{got}");
}

#[test_case(r#"
[[transition_state]]
label = "TS"
path = "ts.json"
E0 = 0.0
"# ; "path and explicit")]
#[test_case(r#"
[[transition_state]]
label = "TS"
"# ; "neither")]
#[test_case(r#"
[[species]]
label = "A"
path = "a.json"
protocol = "RRHO"
"# ; "bad protocol")]
#[test_case(r#"
[sampling]
scan_res = 0.0
"# ; "bad scan_res")]
fn input_errors(body: &str) {
    let got = session(body).unwrap_err();
    assert!(got.is_input(), "{got}");
}

#[test_case(r#"
[[transition_state]]
label = "TS"
E0 = 0.0
protocol = "UMN"
"# ; "explicit protocol")]
#[test_case(r#"
[[species]]
label = "A"
path = "a.json"
symmetry = 2
"# ; "unknown species key")]
#[test_case(r#"
[sampling]
resolution = 5.0
"# ; "unknown sampling key")]
#[test_case(r#"
nprocs = 4
"# ; "unknown global key")]
fn type_errors(body: &str) {
    let got = session(body).unwrap_err();
    assert!(got.is_type(), "{got}");
}
