//! Mass weighting, projection, and diagonalization of Cartesian Hessians

use molecule::{Molecule, Vec3};
use nalgebra as na;
use redint::{DMat, DVec};

use crate::{
    ApeError,
    consts::{AMU, BOHR, C, E_H},
    rotors::Rotor,
};

#[cfg(test)]
mod tests;

/// vectors shorter than this after orthogonalization are linearly dependent
/// on the ones before them
const GS_TOL: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq)]
pub struct NormalModes {
    /// harmonic frequencies in cm⁻¹, in ascending order
    pub frequencies: Vec<f64>,

    /// Cartesian displacement vectors, one column per frequency, with the
    /// mass weighting removed
    pub vectors: DMat,

    /// the imaginary frequency of the reaction coordinate for a transition
    /// state, as a negative number
    pub reaction_frequency: Option<f64>,
}

/// mass weight `hessian`, dividing each element by the square root of the
/// masses of the two atoms it couples
pub fn mass_weight(hessian: &DMat, masses: &[f64]) -> DMat {
    let mut ret = hessian.clone();
    for i in 0..ret.nrows() {
        for j in 0..ret.ncols() {
            ret[(i, j)] /= (masses[i / 3] * masses[j / 3]).sqrt();
        }
    }
    ret
}

/// convert an eigenvalue of a mass-weighted Hessian in Hartree/(bohr² amu) to
/// a wavenumber in cm⁻¹, negative for negative eigenvalues
pub fn to_wavenumber(lambda: f64) -> f64 {
    let si = lambda.abs() * E_H / (BOHR * BOHR * AMU);
    lambda.signum() * si.sqrt() / (2.0 * std::f64::consts::PI * C * 100.0)
}

/// the mass-weighted rigid-body motions of `mol`: three translations followed
/// by three rotations about the center of mass
fn external_motions(mol: &Molecule) -> Vec<DVec> {
    let n = 3 * mol.len();
    let com = mol.com();
    let mut ret = Vec::with_capacity(6);
    for a in 0..3 {
        let mut t = DVec::zeros(n);
        for (i, atom) in mol.atoms.iter().enumerate() {
            t[3 * i + a] = atom.weight().sqrt();
        }
        ret.push(t);
    }
    for a in 0..3 {
        let e = Vec3::ith(a, 1.0);
        let mut r = DVec::zeros(n);
        for (i, atom) in mol.atoms.iter().enumerate() {
            let v = atom.weight().sqrt() * e.cross(&(atom.coord() - com));
            r.fixed_rows_mut::<3>(3 * i).copy_from(&v);
        }
        ret.push(r);
    }
    ret
}

/// the mass-weighted internal rotation of `rotor`'s top about its axis
fn rotor_motion(mol: &Molecule, rotor: &Rotor) -> DVec {
    let axis = rotor.axis(mol).normalize();
    let pivot = mol.atoms[rotor.pivots.1].coord();
    let mut ret = DVec::zeros(3 * mol.len());
    for &i in &rotor.top {
        let atom = &mol.atoms[i];
        let v = atom.weight().sqrt() * axis.cross(&(atom.coord() - pivot));
        ret.fixed_rows_mut::<3>(3 * i).copy_from(&v);
    }
    ret
}

/// orthonormalize `vecs` with modified Gram-Schmidt, dropping any that are
/// linearly dependent on earlier ones
fn orthonormalize(vecs: Vec<DVec>) -> Vec<DVec> {
    let mut ret: Vec<DVec> = Vec::with_capacity(vecs.len());
    for mut v in vecs {
        let scale = v.norm();
        if scale == 0.0 {
            continue;
        }
        for u in &ret {
            let p = u.dot(&v);
            v.axpy(-p, u, 1.0);
        }
        let norm = v.norm();
        if norm > GS_TOL * scale {
            ret.push(v / norm);
        }
    }
    ret
}

/// Mass weight `hessian` (in Hartree/bohr²), project out the rigid-body
/// motions when `project_external` is set and the internal rotation of each
/// of `rotors`, diagonalize the result, and return the `n_vib` highest modes.
/// For a transition state the most negative eigenvalue is set aside as the
/// reaction coordinate first
pub fn project_and_diagonalize(
    mol: &Molecule,
    hessian: &DMat,
    rotors: &[Rotor],
    linear: bool,
    is_ts: bool,
    n_vib: usize,
    project_external: bool,
) -> Result<NormalModes, ApeError> {
    let n = 3 * mol.len();
    if hessian.shape() != (n, n) {
        return Err(ApeError::Input(format!(
            "expected a {n}×{n} Hessian for {} atoms, found {:?}",
            mol.len(),
            hessian.shape()
        )));
    }
    let masses = mol.weights();
    let mw = mass_weight(hessian, &masses);

    let mut motions = Vec::new();
    if project_external {
        motions.extend(external_motions(mol));
    }
    motions.extend(rotors.iter().map(|r| rotor_motion(mol, r)));
    let basis = orthonormalize(motions);
    if project_external {
        let want = if linear { 5 } else { 6 };
        let got = basis.len() - rotors.len().min(basis.len());
        if got != want {
            log::warn!(
                "found {got} independent rigid-body motions, expected {want}"
            );
        }
    }

    let mut proj = DMat::identity(n, n);
    for u in &basis {
        proj -= u * u.transpose();
    }
    let projected = &proj * mw * &proj;
    // symmetrize away the round-off from the projection
    let projected = (&projected + projected.transpose()) * 0.5;

    let sym = na::SymmetricEigen::new(projected);
    let mut pairs: Vec<(f64, DVec)> = sym
        .eigenvalues
        .iter()
        .zip(sym.eigenvectors.column_iter())
        .map(|(&l, v)| (l, v.into_owned()))
        .filter(|(_, v)| {
            let overlap: f64 = basis.iter().map(|u| u.dot(v).powi(2)).sum();
            overlap < 0.5
        })
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let reaction_frequency = if is_ts {
        match pairs.first() {
            Some(&(l, _)) if l < 0.0 => {
                pairs.remove(0);
                Some(to_wavenumber(l))
            }
            _ => {
                return Err(ApeError::Input(
                    "no negative eigenvalue found for the reaction \
                     coordinate of a transition state"
                        .into(),
                ));
            }
        }
    } else {
        None
    };

    if pairs.len() < n_vib {
        return Err(ApeError::Computation(format!(
            "only {} modes left after projection, but {n_vib} were requested",
            pairs.len()
        )));
    }
    let kept = &pairs[pairs.len() - n_vib..];

    let mut frequencies = Vec::with_capacity(n_vib);
    let mut vectors = DMat::zeros(n, n_vib);
    for (k, (l, v)) in kept.iter().enumerate() {
        let freq = to_wavenumber(*l);
        if !freq.is_finite() || freq < 0.0 {
            return Err(ApeError::Computation(format!(
                "unexpected imaginary frequency {freq:.2} cm⁻¹ in mode {}",
                k + 1
            )));
        }
        frequencies.push(freq);
        for i in 0..n {
            vectors[(i, k)] = v[i] / masses[i / 3].sqrt();
        }
    }
    log::debug!("harmonic frequencies (cm⁻¹): {frequencies:.2?}");
    if let Some(f) = reaction_frequency {
        log::debug!("reaction coordinate frequency: {f:.2} cm⁻¹");
    }

    Ok(NormalModes {
        frequencies,
        vectors,
        reaction_frequency,
    })
}
