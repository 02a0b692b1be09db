use crate::{DVec, Siic, Vec3};
use molecule::Molecule;
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// Cartesian geometry in Å
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Geom(pub Vec<Vec3>);

impl Geom {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// return the unit vector from atom i to atom j
    pub fn unit(&self, i: usize, j: usize) -> Vec3 {
        let diff = self[j] - self[i];
        diff / diff.magnitude()
    }

    /// distance between atoms i and j
    pub fn dist(&self, i: usize, j: usize) -> f64 {
        (self[j] - self[i]).magnitude()
    }

    /// angle in radians between atoms i, j, and k, where j is the central atom
    pub fn angle(&self, i: usize, j: usize, k: usize) -> f64 {
        let e_ji = self.unit(j, i);
        let e_jk = self.unit(j, k);
        e_ji.dot(&e_jk).clamp(-1.0, 1.0).acos()
    }

    /// dihedral angle in radians in (-π, π] between the planes formed by i, j,
    /// k and j, k, l
    pub fn dihedral(&self, i: usize, j: usize, k: usize, l: usize) -> f64 {
        let b1 = self[j] - self[i];
        let b2 = self[k] - self[j];
        let b3 = self[l] - self[k];
        let m = b1.cross(&b2);
        let n = b2.cross(&b3);
        f64::atan2(b2.magnitude() * b1.dot(&n), m.dot(&n))
    }

    /// the row of the Wilson B matrix for `ic`: the derivative of its value
    /// with respect to each Cartesian coordinate
    pub fn s_vec(&self, ic: &Siic) -> Vec<f64> {
        let mut tmp = vec![0.0; 3 * self.len()];
        match ic {
            &Siic::Stretch(a, b) => {
                let e_12 = self.unit(a, b);
                for i in 0..3 {
                    tmp[3 * a + i] = -e_12[i];
                    tmp[3 * b + i] = e_12[i];
                }
            }
            &Siic::Bend(a, b, c) => {
                let e_21 = self.unit(b, a);
                let e_23 = self.unit(b, c);
                let t_12 = self.dist(b, a);
                let t_32 = self.dist(b, c);
                let w = e_21.dot(&e_23);
                let sp = (1.0 - w * w).sqrt();
                let c1 = 1.0 / (t_12 * sp);
                let c2 = 1.0 / (t_32 * sp);
                for i in 0..3 {
                    tmp[3 * a + i] = (w * e_21[i] - e_23[i]) * c1;
                    tmp[3 * c + i] = (w * e_23[i] - e_21[i]) * c2;
                    tmp[3 * b + i] = -tmp[3 * a + i] - tmp[3 * c + i];
                }
            }
            &Siic::LinearBend { a, b, c, axis } => {
                let ea = Vec3::from(axis);
                let u1 = self.unit(b, a);
                let u2 = self.unit(b, c);
                let g1 = (ea - ea.dot(&u1) * u1) / self.dist(b, a);
                let g3 = (ea - ea.dot(&u2) * u2) / self.dist(b, c);
                for i in 0..3 {
                    tmp[3 * a + i] = g1[i];
                    tmp[3 * c + i] = g3[i];
                    tmp[3 * b + i] = -g1[i] - g3[i];
                }
            }
            &Siic::Torsion(a, b, c, d) => {
                let e_21 = self.unit(b, a);
                let e_32 = self.unit(c, b);
                let e_43 = self.unit(d, c);
                let t_21 = self.dist(b, a);
                let t_32 = self.dist(c, b);
                let t_43 = self.dist(d, c);
                let v5 = e_21.cross(&e_32);
                let v6 = e_43.cross(&e_32);
                let cp2 = -e_21.dot(&e_32);
                let cp3 = -e_43.dot(&e_32);
                let sp2 = 1.0 - cp2 * cp2;
                let sp3 = 1.0 - cp3 * cp3;
                // terminal atoms
                let w1 = 1.0 / (t_21 * sp2);
                let w2 = 1.0 / (t_43 * sp3);
                for i in 0..3 {
                    tmp[3 * a + i] = -w1 * v5[i];
                    tmp[3 * d + i] = -w2 * v6[i];
                }
                let w3 = (t_32 - t_21 * cp2) * w1 / t_32;
                let w4 = cp3 / (t_32 * sp3);
                let w5 = (t_32 - t_43 * cp3) * w2 / t_32;
                let w6 = cp2 / (t_32 * sp2);
                for i in 0..3 {
                    tmp[3 * b + i] = w3 * v5[i] + w4 * v6[i];
                    tmp[3 * c + i] = w5 * v6[i] + w6 * v5[i];
                }
            }
        }
        tmp
    }
}

impl From<&Molecule> for Geom {
    fn from(mol: &Molecule) -> Self {
        Self(mol.atoms.iter().map(|atom| atom.coord()).collect())
    }
}

impl From<&DVec> for Geom {
    fn from(dvec: &DVec) -> Self {
        Self(
            dvec.as_slice()
                .chunks(3)
                .map(Vec3::from_row_slice)
                .collect(),
        )
    }
}

impl From<&Geom> for DVec {
    fn from(val: &Geom) -> Self {
        DVec::from_iterator(
            3 * val.len(),
            val.0.iter().flat_map(|v| [v[0], v[1], v[2]]),
        )
    }
}

impl Index<usize> for Geom {
    type Output = Vec3;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}
