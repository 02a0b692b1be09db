use approx::assert_abs_diff_eq;
use molecule::{Molecule, molecule};
use test_case::test_case;

use super::*;

fn water() -> Molecule {
    molecule![
        O 0.0000000000 0.0000000000 -0.0657441568
        H 0.0000000000 0.7574590974 0.5217905143
        H 0.0000000000 -0.7574590974 0.5217905143
    ]
}

/// methanol with an exactly threefold methyl group
fn methanol() -> Molecule {
    molecule![
        C 0.0 0.0 0.0
        O 0.0 0.0 1.43
        H 1.0276618553 0.0 -0.3633333333
        H -0.5138309277 0.8899812732 -0.3633333333
        H -0.5138309277 -0.8899812732 -0.3633333333
        H 0.4551953545 0.7884214814 1.7346124701
    ]
}

fn co2() -> Molecule {
    molecule![
        O 0.0 0.0 -1.16
        C 0.0 0.0 0.0
        O 0.0 0.0 1.16
    ]
}

/// central finite difference of every coordinate, wrapping torsions
fn numerical_b(coords: &RedundantCoords, geom: &Geom) -> DMat {
    let h = 1e-6;
    let cart = DVec::from(geom);
    let mut ret = DMat::zeros(coords.len(), cart.len());
    for k in 0..cart.len() {
        let mut plus = cart.clone();
        let mut minus = cart.clone();
        plus[k] += h;
        minus[k] -= h;
        let vp = coords.values(&Geom::from(&plus));
        let vm = coords.values(&Geom::from(&minus));
        for (i, ic) in coords.coords.iter().enumerate() {
            let mut d = vp[i] - vm[i];
            if ic.is_torsion() {
                d = wrap_angle(d);
            }
            ret[(i, k)] = d / (2.0 * h);
        }
    }
    ret
}

fn rank(b: &DMat) -> usize {
    b.clone()
        .svd(false, false)
        .singular_values
        .iter()
        .filter(|&&s| s > 1e-6)
        .count()
}

#[test]
fn water_coords() {
    let mol = water();
    let got = RedundantCoords::new(&mol, &[]).unwrap();
    assert_eq!(
        got.coords,
        vec![Siic::Stretch(0, 1), Siic::Stretch(0, 2), Siic::Bend(1, 0, 2)]
    );
    assert_eq!(got.n_rotors, 0);
    let vals = got.values(&Geom::from(&mol));
    assert_abs_diff_eq!(vals[0], 0.9586, epsilon = 1e-4);
    assert_abs_diff_eq!(vals[2].to_degrees(), 104.401, epsilon = 1e-3);
}

#[test]
fn methanol_coords() {
    let mol = methanol();
    let got = RedundantCoords::new(&mol, &[[2, 0, 1, 5]]).unwrap();
    // 5 bonds, 7 angles, 3 dihedrals, and the rotor
    assert_eq!(got.len(), 16);
    assert_eq!(got.rotor_rows(), 15..16);
    assert_eq!(got.coords[15], Siic::Torsion(2, 0, 1, 5));
    let b = got.b_matrix(&Geom::from(&mol));
    assert_eq!(b.shape(), (16, 18));
    assert_eq!(rank(&b), 3 * 6 - 6);
}

#[test]
fn co2_linear_bends() {
    let mol = co2();
    let got = RedundantCoords::new(&mol, &[]).unwrap();
    assert_eq!(got.len(), 4);
    let nlin = got
        .coords
        .iter()
        .filter(|c| matches!(c, Siic::LinearBend { .. }))
        .count();
    assert_eq!(nlin, 2);
    let b = got.b_matrix(&Geom::from(&mol));
    assert_eq!(rank(&b), 3 * 3 - 5);
}

#[test]
fn disconnected_fragments() {
    let mut atoms = water().atoms;
    for mut atom in water().atoms {
        atom.x += 4.0;
        atoms.push(atom);
    }
    let mol = Molecule::new(atoms);
    assert_eq!(fragments(6, &mol.bonds(BOND_SCALE)).len(), 2);
    let got = RedundantCoords::new(&mol, &[]).unwrap();
    let stretches = got
        .coords
        .iter()
        .filter(|c| matches!(c, Siic::Stretch(..)))
        .count();
    assert_eq!(stretches, 5);
    let b = got.b_matrix(&Geom::from(&mol));
    assert_eq!(rank(&b), 3 * 6 - 6);
}

#[test_case(water(), &[] ; "water")]
#[test_case(methanol(), &[[2, 0, 1, 5]] ; "methanol")]
#[test_case(co2(), &[] ; "co2")]
fn b_matrix(mol: Molecule, rotors: &[[usize; 4]]) {
    let coords = RedundantCoords::new(&mol, rotors).unwrap();
    let geom = Geom::from(&mol);
    let got = coords.b_matrix(&geom);
    let want = numerical_b(&coords, &geom);
    assert_abs_diff_eq!(got, want, epsilon = 1e-6);
}

#[test]
fn projector_idempotent() {
    let coords = RedundantCoords::new(&methanol(), &[[2, 0, 1, 5]]).unwrap();
    let p = coords.rotor_projector();
    assert_abs_diff_eq!(&p * &p, p.clone(), epsilon = 0.0);
    assert_eq!(p[(15, 15)], 0.0);
    assert_eq!(p.trace(), 15.0);

    let coords = RedundantCoords::new(&water(), &[]).unwrap();
    let p = coords.rotor_projector();
    assert_eq!(p, DMat::identity(3, 3));
}

#[test]
fn displace_water() {
    let mol = water();
    let coords = RedundantCoords::new(&mol, &[]).unwrap();
    let geom = Geom::from(&mol);
    let dq = DVec::from_vec(vec![0.05, -0.03, 0.1]);
    let got = coords.displace(&geom, &dq).unwrap();
    let want = coords.values(&geom) + &dq;
    assert_abs_diff_eq!(coords.values(&got), want, epsilon = 1e-8);
}

#[test]
fn displace_methanol_rotor() {
    // turning only the rotor is inconsistent with the other dihedrals, but
    // the least-squares geometry should still move toward it
    let mol = methanol();
    let coords = RedundantCoords::new(&mol, &[[2, 0, 1, 5]]).unwrap();
    let geom = Geom::from(&mol);
    let mut dq = DVec::zeros(coords.len());
    dq[15] = 0.1;
    let got = coords.displace(&geom, &dq).unwrap();
    let before = coords.values(&geom)[15];
    let after = coords.values(&got)[15];
    assert!(wrap_angle(after - before) > 0.0);
    // bonds are nearly untouched
    for i in 0..5 {
        assert_abs_diff_eq!(
            coords.values(&got)[i],
            coords.values(&geom)[i],
            epsilon = 1e-3
        );
    }
}

#[test]
fn no_atoms() {
    let got = RedundantCoords::new(&Molecule::default(), &[]);
    assert!(matches!(got, Err(CoordError::InputError(_))));
}

#[test]
fn bad_rotor() {
    let got = RedundantCoords::new(&water(), &[[0, 1, 2, 7]]);
    assert!(matches!(got, Err(CoordError::InputError(_))));
}

#[test_case(0.5, 0.5 ; "positive")]
#[test_case(-0.5, -0.5 ; "negative")]
#[test_case(2.0 * PI - 0.1, -0.1 ; "above")]
#[test_case(-2.0 * PI + 0.1, 0.1 ; "below")]
#[test_case(PI, PI ; "pi")]
#[test_case(-PI, PI ; "minus pi")]
fn wrap(x: f64, want: f64) {
    assert_abs_diff_eq!(wrap_angle(x), want, epsilon = 1e-12);
}
