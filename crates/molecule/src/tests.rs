use approx::assert_abs_diff_eq;

use super::*;

fn water() -> Molecule {
    molecule![
        O 0.0000000000 0.0000000000 -0.0657441568
        H 0.0000000000 0.7574590974 0.5217905143
        H 0.0000000000 -0.7574590974 0.5217905143
    ]
}

#[test]
fn com() {
    let mol = water();
    let got = mol.com();
    assert_abs_diff_eq!(got[0], 0.0);
    assert_abs_diff_eq!(got[1], 0.0, epsilon = 1e-12);
    // already very close to the center of mass
    assert_abs_diff_eq!(got[2], 0.0, epsilon = 1e-4);
}

#[test]
fn linearity() {
    assert!(!water().is_linear());
    let co2 = molecule![
        O 0.0 0.0 -1.16
        C 0.0 0.0 0.0
        O 0.0 0.0 1.16
    ];
    assert!(co2.is_linear());
    let hcn = molecule![
        H 0.0 0.0 -1.066
        C 0.0 0.0 0.0
        N 0.0 0.0 1.153
    ];
    assert!(hcn.is_linear());
    let hh = molecule![
        H 0.0 0.0 0.0
        H 0.0 0.0 0.74
    ];
    assert!(hh.is_linear());
    let he = molecule![He 0.0 0.0 0.0];
    assert!(!he.is_linear());
}

#[test]
fn bonds() {
    let mol = water();
    assert_eq!(mol.bonds(BOND_SCALE), vec![(0, 1), (0, 2)]);
    let adj = mol.adjacency(&mol.bonds(BOND_SCALE));
    assert_eq!(adj, vec![vec![1, 2], vec![0], vec![0]]);
}

#[test]
fn rotate_about() {
    let mol = water();
    let origin = mol.atoms[0].coord();
    let axis = Vec3::new(0.0, 0.0, 1.0);
    let got = mol.rotate_about(&[1, 2], origin, axis, std::f64::consts::PI);
    // a half turn about z swaps the hydrogens
    assert_abs_diff_eq!(got.atoms[1], mol.atoms[2], epsilon = 1e-10);
    assert_abs_diff_eq!(got.atoms[2], mol.atoms[1], epsilon = 1e-10);
    // bond lengths are preserved for any angle
    let got = mol.rotate_about(&[1], origin, axis, 0.3);
    assert_abs_diff_eq!(got.dist(0, 1), mol.dist(0, 1), epsilon = 1e-12);
    assert_abs_diff_eq!(got.atoms[0], mol.atoms[0]);
}

#[test]
fn coords_round_trip() {
    let mol = water();
    let mut other = mol.clone();
    other.set_coords(&vec![0.0; 9]);
    other.set_coords(&mol.coords());
    assert_eq!(other, mol);
    assert_eq!(mol.symbols(), vec!["O", "H", "H"]);
    assert_eq!(mol.heavy_atoms(), 1);
}
