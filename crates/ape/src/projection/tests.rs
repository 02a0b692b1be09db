use approx::assert_abs_diff_eq;

use super::*;
use crate::{
    rotors::{RotorDetector, TopologyDetector},
    testing::{ModelPotential, methanol, water},
};

fn water_modes(is_ts: bool, n_vib: usize) -> Result<NormalModes, ApeError> {
    let mol = water();
    let hess = ModelPotential::water().hessian(&mol);
    project_and_diagonalize(&mol, &hess, &[], false, is_ts, n_vib, true)
}

#[test]
fn water_frequencies() {
    let got = water_modes(false, 3).unwrap();
    let want = [1657.3, 3823.8, 3879.1];
    assert_eq!(got.frequencies.len(), 3);
    for (g, w) in got.frequencies.iter().zip(want) {
        assert_abs_diff_eq!(*g, w, epsilon = 2.0);
    }
    assert_eq!(got.vectors.shape(), (9, 3));
    assert_eq!(got.reaction_frequency, None);
}

#[test]
fn unweighted_vectors() {
    let mol = water();
    let hess = ModelPotential::water().hessian(&mol);
    let got =
        project_and_diagonalize(&mol, &hess, &[], false, false, 3, true).unwrap();
    let masses = mol.weights();
    let mw = mass_weight(&hess, &masses);
    for (k, &freq) in got.frequencies.iter().enumerate() {
        // restoring the mass weighting recovers a normalized eigenvector
        let mut w = got.vectors.column(k).into_owned();
        for i in 0..w.len() {
            w[i] *= masses[i / 3].sqrt();
        }
        assert_abs_diff_eq!(w.norm(), 1.0, epsilon = 1e-8);
        let hw = &mw * &w;
        let lambda = w.dot(&hw);
        assert_abs_diff_eq!(to_wavenumber(lambda), freq, epsilon = 1e-6);
        assert_abs_diff_eq!((hw - lambda * w).norm(), 0.0, epsilon = 1e-8);
    }
}

#[test]
fn wavenumber_sign() {
    assert_eq!(to_wavenumber(0.0), 0.0);
    let x = to_wavenumber(0.5);
    assert!(x > 0.0);
    assert_eq!(to_wavenumber(-0.5), -x);
}

#[test]
fn transition_state() {
    let mol = water();
    let mut model = ModelPotential::water();
    // a negative bend constant turns the bend into a reaction coordinate
    model.k[2] = -0.16;
    let hess = model.hessian(&mol);
    let got =
        project_and_diagonalize(&mol, &hess, &[], false, true, 2, true).unwrap();
    assert_eq!(got.frequencies.len(), 2);
    assert!(got.frequencies.iter().all(|&f| f > 3000.0));
    let imag = got.reaction_frequency.unwrap();
    assert!(imag < -1000.0, "{imag}");
}

#[test]
fn transition_state_without_imaginary() {
    let got = water_modes(true, 2).unwrap_err();
    assert!(got.is_input());
}

#[test]
fn too_many_modes() {
    let got = water_modes(false, 4).unwrap_err();
    assert!(got.is_computation());
}

#[test]
fn wrong_shape() {
    let mol = water();
    let hess = DMat::zeros(6, 6);
    let got = project_and_diagonalize(&mol, &hess, &[], false, false, 3, true)
        .unwrap_err();
    assert!(got.is_input());
}

#[test]
fn methanol_rotor_projected() {
    let mol = methanol();
    let rotors = TopologyDetector::default().rotors(&mol);
    let scans: Vec<_> = rotors.iter().map(|r| r.scan).collect();
    let hess = ModelPotential::methanol(&scans).hessian(&mol);

    let got =
        project_and_diagonalize(&mol, &hess, &rotors, false, false, 11, true)
            .unwrap();
    assert_eq!(got.frequencies.len(), 11);
    assert!(got.frequencies.iter().all(|&f| f > 100.0));
    assert!(got.frequencies.windows(2).all(|w| w[0] <= w[1]));

    // without the rotor projection the torsion is the softest mode
    let all =
        project_and_diagonalize(&mol, &hess, &[], false, false, 12, true).unwrap();
    assert!(all.frequencies[0] < got.frequencies[0]);
}
