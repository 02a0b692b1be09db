//! Sampling the potential energy along torsional and vibrational modes

use std::{collections::BTreeMap, f64::consts::PI, fmt::Display, path::PathBuf};

use molecule::Molecule;
use qcjob::{EvalError, Evaluator, SinglePoint};
use redint::{DVec, RedundantCoords, geom::Geom};
use serde::{Deserialize, Serialize};

use crate::{
    ApeError,
    consts::{AMU, C, E_H, HBAR, KCAL_PER_HARTREE},
    rotors::Rotor,
};

/// Settings controlling the extent of each scan
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SamplingSettings {
    /// fraction of the harmonic energy increment below which a vibrational
    /// ladder is considered flat. also the fraction of `energy_cutoff` by
    /// which the end of a torsional scan may miss its start
    pub thresh: f64,

    /// torsional scan resolution in degrees
    pub scan_res: f64,

    /// maximum number of steps in each direction of a vibrational ladder
    pub max_steps: usize,

    /// stop a vibrational ladder once the energy rises this far above the
    /// equilibrium, in kcal/mol
    pub energy_cutoff: f64,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            thresh: 0.05,
            scan_res: 10.0,
            max_steps: 20,
            energy_cutoff: 20.0,
        }
    }
}

impl SamplingSettings {
    /// `energy_cutoff` in Hartree
    pub fn cutoff(&self) -> f64 {
        self.energy_cutoff / KCAL_PER_HARTREE
    }

    pub(crate) fn validate(&self) -> Result<(), ApeError> {
        if !(self.scan_res > 0.0 && self.scan_res <= 360.0) {
            return Err(ApeError::Input(format!(
                "scan_res must be in (0, 360] degrees, got {}",
                self.scan_res
            )));
        }
        if !(self.thresh > 0.0) || !(self.energy_cutoff > 0.0) {
            return Err(ApeError::Input(
                "thresh and energy_cutoff must be positive".into(),
            ));
        }
        if self.max_steps == 0 {
            return Err(ApeError::Input("max_steps must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModeKind {
    Torsion,
    Vibration,
}

impl Display for ModeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModeKind::Torsion => write!(f, "tors"),
            ModeKind::Vibration => write!(f, "vib"),
        }
    }
}

/// The samples collected along one mode
#[derive(Clone, Debug, PartialEq)]
pub struct ModeRecord {
    /// 1-based mode number. torsions come first
    pub mode: usize,

    pub kind: ModeKind,

    /// harmonic frequency in cm⁻¹ for vibrations
    pub frequency: Option<f64>,

    /// reduced mass in amu for vibrations
    pub reduced_mass: Option<f64>,

    /// Å for vibrations, radians for torsions
    pub step_size: f64,

    pub symmetry_number: Option<usize>,

    /// spin multiplicity of the sampled species
    pub m: usize,

    /// 1-based index of the internal coordinate dominating the mode
    pub k: usize,

    /// displacement in internal coordinates per Å along the normalized
    /// Cartesian mode
    pub qj: Vec<f64>,

    /// whether the end of a torsional scan reproduced its start
    pub periodic: Option<bool>,

    pub xyz: BTreeMap<i32, Molecule>,

    /// electronic energy in Hartree of each sample
    pub energy: BTreeMap<i32, f64>,
}

impl ModeRecord {
    /// the name of the mode in the sampling record, like `mode_3_vib`
    pub fn name(&self) -> String {
        format!("mode_{}_{}", self.mode, self.kind)
    }

    fn new(mode: usize, kind: ModeKind, m: usize, k: usize) -> Self {
        Self {
            mode,
            kind,
            frequency: None,
            reduced_mass: None,
            step_size: 0.0,
            symmetry_number: None,
            m,
            k,
            qj: Vec::new(),
            periodic: None,
            xyz: BTreeMap::new(),
            energy: BTreeMap::new(),
        }
    }

    fn insert(&mut self, sample: i32, mol: Molecule, energy: f64) {
        self.xyz.insert(sample, mol);
        self.energy.insert(sample, energy);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SamplingResult {
    /// one record per mode, in ascending mode order
    pub modes: Vec<ModeRecord>,

    /// the lowest electronic energy found in any sample
    pub min_elect: f64,
}

impl SamplingResult {
    pub fn new(modes: Vec<ModeRecord>) -> Self {
        let min_elect = global_minimum(&modes);
        Self { modes, min_elect }
    }
}

/// the minimum energy over every sample of every mode. Infinity if there are
/// no samples
pub fn global_minimum(modes: &[ModeRecord]) -> f64 {
    modes
        .iter()
        .flat_map(|m| m.energy.values())
        .copied()
        .fold(f64::INFINITY, f64::min)
}

/// Drives the energy evaluations for the modes of one molecule
pub(crate) struct Sampler<'a, E> {
    pub mol: &'a Molecule,
    pub internal: &'a RedundantCoords,
    pub settings: &'a SamplingSettings,
    pub evaluator: &'a mut E,

    /// every single point is a copy of this with the name and geometry
    /// replaced
    pub base: SinglePoint,

    /// energy of the undisplaced geometry
    pub e_eq: f64,

    pub multiplicity: usize,
}

impl<E: Evaluator> Sampler<'_, E> {
    fn evaluate(&mut self, name: String, mol: &Molecule) -> Result<f64, EvalError> {
        let point = SinglePoint {
            name,
            geom: mol.clone(),
            ..self.base.clone()
        };
        let e = self.evaluator.energy(&point)?;
        if !e.is_finite() {
            return Err(EvalError::Other(format!(
                "non-finite energy for {}",
                point.name
            )));
        }
        Ok(e)
    }

    fn with_geom(&self, geom: &Geom) -> Molecule {
        let mut ret = self.mol.clone();
        ret.set_coords(DVec::from(geom).as_slice());
        ret
    }

    /// sample vibrational `mode` with harmonic frequency `freq` in cm⁻¹ and
    /// Cartesian displacement vector `vector` by stepping out in both
    /// directions from the equilibrium geometry
    pub fn vibration(
        &mut self,
        mode: usize,
        freq: f64,
        vector: DVec,
    ) -> Result<ModeRecord, ApeError> {
        let norm2 = vector.norm_squared();
        if !(norm2 > 0.0 && norm2.is_finite()) {
            return Err(ApeError::Computation(format!(
                "zero reduced mass denominator for mode {mode}"
            )));
        }
        if !(freq > 0.0 && freq.is_finite()) {
            return Err(ApeError::Computation(format!(
                "mode {mode} has non-positive frequency {freq}"
            )));
        }
        let reduced_mass = 1.0 / norm2;
        let omega = 2.0 * PI * C * 100.0 * freq;
        let step = (HBAR / (reduced_mass * AMU * omega)).sqrt() * 1e10;
        let hw = HBAR * omega / E_H;

        let geom0 = Geom::from(self.mol);
        let unit = vector / norm2.sqrt();
        let qj = self.internal.rotor_projector()
            * (self.internal.b_matrix(&geom0) * unit);
        let k = qj.iamax() + 1;
        log::info!(
            "sampling mode {mode}: {freq:.2} cm⁻¹, μ = {reduced_mass:.4} amu, \
             step = {step:.4} Å, K = {k}"
        );

        let mut record =
            ModeRecord::new(mode, ModeKind::Vibration, self.multiplicity, k);
        record.frequency = Some(freq);
        record.reduced_mass = Some(reduced_mass);
        record.step_size = step;
        record.insert(0, self.mol.clone(), self.e_eq);

        let cutoff = self.settings.cutoff();
        for dir in [1, -1] {
            // energy and step of the last sample that succeeded
            let (mut prev, mut last) = (self.e_eq, 0);
            for s in 1..=self.settings.max_steps as i32 {
                let sample = dir * s;
                let dq = &qj * (sample as f64 * step);
                let geom = match self.internal.displace(&geom0, &dq) {
                    Ok(g) => g,
                    Err(e) => {
                        log::warn!("mode {mode} sample {sample}: {e}");
                        break;
                    }
                };
                let mol = self.with_geom(&geom);
                let e = match self.evaluate(format!("mode_{mode}_{sample}"), &mol)
                {
                    Ok(e) => e,
                    Err(e) => {
                        log::warn!("skipping mode {mode} sample {sample}: {e}");
                        continue;
                    }
                };
                record.insert(sample, mol, e);
                let de = e - self.e_eq;
                log::debug!("mode {mode} sample {sample}: ΔE = {de:.8} Eh");
                if de >= cutoff {
                    break;
                }
                let harmonic = 0.5 * hw * (s * s - last * last) as f64;
                if e - prev < self.settings.thresh * harmonic {
                    log::warn!(
                        "energy along mode {mode} flattens out at sample \
                         {sample}"
                    );
                    break;
                }
                (prev, last) = (e, s);
            }
        }
        record.qj = qj.as_slice().to_vec();

        let has_both = record.energy.keys().any(|&s| s > 0)
            && record.energy.keys().any(|&s| s < 0);
        if !has_both {
            return Err(ApeError::Computation(format!(
                "mode {mode} needs at least one sample on each side of the \
                 equilibrium, found {}",
                record.energy.len()
            )));
        }
        Ok(record)
    }

    /// scan torsional `mode` by rigidly turning the top of `rotor`, the
    /// `index`th rotor, over one symmetry-unique period
    pub fn torsion(
        &mut self,
        mode: usize,
        index: usize,
        rotor: &Rotor,
    ) -> Result<ModeRecord, ApeError> {
        let scan_res = self.settings.scan_res;
        let sigma = rotor.symmetry.max(1);
        let full = ((360.0 / scan_res).round() as usize).max(1);
        let npoints = ((360.0 / (sigma as f64 * scan_res)).round() as usize)
            .clamp(1, full);
        let row = self.internal.rotor_rows().start + index;
        let axis = rotor.axis(self.mol);
        let origin = self.mol.atoms[rotor.pivots.1].coord();
        log::info!(
            "sampling mode {mode}: torsion {} with symmetry number {sigma}, \
             {npoints} points",
            self.internal.coords[row]
        );

        let mut record =
            ModeRecord::new(mode, ModeKind::Torsion, self.multiplicity, row + 1);
        record.symmetry_number = Some(sigma);
        record.step_size = scan_res.to_radians();
        let mut qj = vec![0.0; self.internal.len()];
        qj[row] = 1.0;
        record.qj = qj;

        for i in 0..npoints {
            let sample = i as i32;
            if i == 0 {
                record.insert(0, self.mol.clone(), self.e_eq);
                continue;
            }
            let angle = (i as f64 * scan_res).to_radians();
            let mol = self.mol.rotate_about(&rotor.top, origin, axis, angle);
            let tau = self.internal.values(&Geom::from(&mol))[row];
            match self.evaluate(format!("mode_{mode}_{sample}"), &mol) {
                Ok(e) => {
                    log::debug!(
                        "mode {mode} sample {sample}: τ = {:.2}°, E = {e:.8}",
                        tau.to_degrees()
                    );
                    record.insert(sample, mol, e);
                }
                Err(e) => {
                    log::warn!("skipping mode {mode} sample {sample}: {e}");
                }
            }
        }

        record.periodic = if sigma == 1 {
            Some(true)
        } else {
            let period = (360.0 / sigma as f64).to_radians();
            let mol = self.mol.rotate_about(&rotor.top, origin, axis, period);
            match self.evaluate(format!("mode_{mode}_close"), &mol) {
                Ok(e) => {
                    let gap = (e - self.e_eq).abs();
                    let periodic =
                        gap <= self.settings.thresh * self.settings.cutoff();
                    if !periodic {
                        log::warn!(
                            "torsional scan of mode {mode} is not periodic: \
                             the end differs from the start by {:.4} kcal/mol",
                            gap * KCAL_PER_HARTREE
                        );
                    }
                    Some(periodic)
                }
                Err(e) => {
                    log::warn!(
                        "unable to check periodicity of mode {mode}: {e}"
                    );
                    None
                }
            }
        };

        let need = 3usize.max(npoints.div_ceil(2)).min(npoints);
        if record.energy.len() < need {
            return Err(ApeError::Computation(format!(
                "torsional scan of mode {mode} collected {} of the {need} \
                 required points",
                record.energy.len()
            )));
        }
        Ok(record)
    }
}

/// the directory for the single-point calculations of a job
pub(crate) fn work_dir(output_directory: &std::path::Path, label: &str) -> PathBuf {
    output_directory.join("output_file").join(label)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn record(mode: usize, energies: &[(i32, f64)]) -> ModeRecord {
        let mut ret = ModeRecord::new(mode, ModeKind::Vibration, 1, 1);
        for &(s, e) in energies {
            ret.energy.insert(s, e);
        }
        ret
    }

    #[test]
    fn minimum_is_order_independent() {
        let a = record(1, &[(0, -1.0), (1, -0.5), (-1, -1.25)]);
        let b = record(2, &[(0, -1.0), (2, -1.5)]);
        let c = record(3, &[]);
        let want = -1.5;
        assert_eq!(global_minimum(&[a.clone(), b.clone(), c.clone()]), want);
        assert_eq!(global_minimum(&[c, b, a]), want);
        assert_eq!(global_minimum(&[]), f64::INFINITY);
    }

    #[test]
    fn mode_names() {
        assert_eq!(record(3, &[]).name(), "mode_3_vib");
        let tors = ModeRecord::new(1, ModeKind::Torsion, 2, 16);
        assert_eq!(tors.name(), "mode_1_tors");
    }

    #[test]
    fn cutoff_in_hartree() {
        let s = SamplingSettings::default();
        assert!((s.cutoff() - 0.031872).abs() < 1e-6);
        assert!(s.validate().is_ok());
    }

    #[test_case(SamplingSettings { scan_res: 0.0, ..Default::default() } ; "zero resolution")]
    #[test_case(SamplingSettings { scan_res: 400.0, ..Default::default() } ; "wide resolution")]
    #[test_case(SamplingSettings { thresh: -0.1, ..Default::default() } ; "negative thresh")]
    #[test_case(SamplingSettings { energy_cutoff: f64::NAN, ..Default::default() } ; "nan cutoff")]
    #[test_case(SamplingSettings { max_steps: 0, ..Default::default() } ; "no steps")]
    fn invalid_settings(s: SamplingSettings) {
        assert!(s.validate().unwrap_err().is_input());
    }
}
