use std::{
    fmt::Write as _,
    fs::{read_to_string, write},
    sync::OnceLock,
};

use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};

use super::{
    Program, ProgramError, ProgramResult, SinglePoint, Template, parse_energy,
};


/// The default single-point template. `{{.charge}}`, `{{.mult}}`,
/// `{{.geom}}`, `{{.method}}`, `{{.basis}}`, and `{{.unrestricted}}` are
/// replaced by the corresponding fields of the [SinglePoint]
pub const DEFAULT_TEMPLATE: &str = "$molecule
{{.charge}} {{.mult}}
{{.geom}}
$end

$rem
JOBTYPE          SP
METHOD           {{.method}}
BASIS            {{.basis}}
UNRESTRICTED     {{.unrestricted}}
SCF_CONVERGENCE  8
SYM_IGNORE       TRUE
$end
";

const QMMM_REM: &str = "QM_MM_INTERFACE  JANUS
USER_CONNECT     TRUE
FORCE_FIELD      READ
ISOTOPES         TRUE
";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QChem {
    filename: String,
    template: Template,
    point: SinglePoint,
}

static INPUT_CELL: OnceLock<[Regex; 7]> = OnceLock::new();
static OUTPUT_CELL: OnceLock<[Regex; 3]> = OnceLock::new();

impl QChem {
    /// the body of the `$molecule` section between the charge line and
    /// `$end`, including the user_connect records and fixed MM atoms of a
    /// QM/MM calculation
    fn geom_string(&self) -> String {
        let mut ret = String::new();
        let connect = self.point.qmmm.as_ref().map(|q| &q.user_connect);
        for (i, atom) in self.point.geom.atoms.iter().enumerate() {
            if i > 0 {
                ret.push('\n');
            }
            write!(
                ret,
                "{:<2} {:15.10} {:15.10} {:15.10}",
                atom.label(),
                atom.x,
                atom.y,
                atom.z
            )
            .unwrap();
            if let Some(c) = connect.and_then(|c| c.get(i)) {
                write!(ret, "  {c}").unwrap();
            }
        }
        if let Some(qmmm) = &self.point.qmmm {
            let fixed = qmmm.fixed_molecule.trim_end();
            if !fixed.is_empty() {
                write!(ret, "\n{fixed}").unwrap();
            }
        }
        ret
    }

    /// the extra sections appended after the template for QM/MM
    fn qmmm_sections(&self) -> String {
        let Some(qmmm) = &self.point.qmmm else {
            return String::new();
        };
        let mut ret = String::new();
        let atoms: Vec<_> =
            qmmm.qm_atoms.iter().map(|a| a.to_string()).collect();
        writeln!(ret, "\n$qm_atoms\n{}\n$end", atoms.join(" ")).unwrap();
        for (name, body) in [
            ("force_field_params", qmmm.force_field_params.trim_end()),
            ("opt", qmmm.opt.trim_end()),
        ] {
            if !body.is_empty() {
                writeln!(ret, "\n${name}\n{body}\n$end").unwrap();
            }
        }
        if !qmmm.isotopes.is_empty() {
            writeln!(ret, "\n$isotopes\n{}\n$end", qmmm.isotopes.join("\n"))
                .unwrap();
        }
        ret
    }

    /// the complete input file contents
    pub fn input(&self) -> String {
        let [charge, mult, geom, method, basis, unrestricted, rem] = INPUT_CELL
            .get_or_init(|| {
                [
                    Regex::new(r"\{\{.charge\}\}").unwrap(),
                    Regex::new(r"\{\{.mult\}\}").unwrap(),
                    Regex::new(r"\{\{.geom\}\}").unwrap(),
                    Regex::new(r"\{\{.method\}\}").unwrap(),
                    Regex::new(r"\{\{.basis\}\}").unwrap(),
                    Regex::new(r"\{\{.unrestricted\}\}").unwrap(),
                    Regex::new(r"(?mi)^\$rem[ \t]*\n").unwrap(),
                ]
            });
        let p = &self.point;
        let mut body = self.template.header.clone();
        body = geom.replace(&body, NoExpand(&self.geom_string())).to_string();
        body = charge
            .replace(&body, NoExpand(&p.charge.to_string()))
            .to_string();
        body = mult
            .replace(&body, NoExpand(&p.multiplicity.to_string()))
            .to_string();
        body = method.replace(&body, NoExpand(&p.method)).to_string();
        body = basis.replace(&body, NoExpand(&p.basis)).to_string();
        let u = if p.unrestricted { "TRUE" } else { "FALSE" };
        body = unrestricted.replace(&body, NoExpand(u)).to_string();
        if p.qmmm.is_some() {
            let with_rem = format!("$rem\n{QMMM_REM}");
            body = rem.replace(&body, NoExpand(&with_rem)).to_string();
            body.push_str(&self.qmmm_sections());
        }
        body
    }
}

impl Program for QChem {
    fn new(filename: String, template: Template, point: SinglePoint) -> Self {
        Self {
            filename,
            template,
            point,
        }
    }

    fn filename(&self) -> String {
        self.filename.clone()
    }

    fn template(&self) -> &Template {
        &self.template
    }

    fn extension(&self) -> String {
        String::from("in")
    }

    fn write_input(&self) -> Result<(), ProgramError> {
        let infile = self.infile();
        write(&infile, self.input())
            .map_err(|e| ProgramError::WriteFileError(infile, e.kind()))
    }

    /// read `filename`.out, returning the last total energy printed. Post-HF
    /// methods print their correlated total energy after the SCF energy, so
    /// the last match is the energy of the requested method
    fn read_output(filename: &str) -> Result<ProgramResult, ProgramError> {
        let outfile = format!("{filename}.out");
        if !std::path::Path::new(&outfile).exists() {
            return Err(ProgramError::FileNotFound(outfile));
        }
        let contents = match read_to_string(&outfile) {
            Ok(s) => s,
            Err(e) => {
                return Err(ProgramError::ReadFileError(outfile, e.kind()));
            }
        };

        let [error_re, energy_re, time_re] = OUTPUT_CELL.get_or_init(|| {
            [
                Regex::new(r"(?i)Q-Chem fatal error|error occurred").unwrap(),
                Regex::new(
                    r"(?im)total energy(?: in the final basis set)?\s*=\s*(\S+?)(?:\s*au)?\s*$",
                )
                .unwrap(),
                Regex::new(r"(?m)^\s*Total job time:\s*([\d.]+)s\(wall\)")
                    .unwrap(),
            ]
        });

        if error_re.is_match(&contents) {
            return Err(ProgramError::ErrorInOutput(outfile));
        }

        let Some(cap) = energy_re.captures_iter(&contents).last() else {
            return Err(ProgramError::EnergyNotFound(outfile));
        };
        let energy = parse_energy(&cap[1], &outfile)?;

        let time = time_re
            .captures(&contents)
            .and_then(|c| c[1].parse().ok())
            .unwrap_or_default();

        Ok(ProgramResult { energy, time })
    }
}
