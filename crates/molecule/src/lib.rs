use approx::AbsDiffEq;
pub use atom::*;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[cfg(test)]
mod tests;

pub mod atom;
mod weights;

use nalgebra as na;

pub type Vec3 = na::Vector3<f64>;
pub type Mat3 = na::Matrix3<f64>;

/// from <https://physics.nist.gov/cgi-bin/cuu/Value?bohrrada0>
pub const ANGBOHR: f64 = 0.529_177_210_9;

/// default scale factor applied to the sum of covalent radii when deciding if
/// two atoms are bonded
pub const BOND_SCALE: f64 = 1.3;

#[macro_export]
macro_rules! molecule {
    ($($num:ident $x:literal $y:literal $z:literal)+) => {
	$crate::Molecule::new(vec![
	    $($crate::Atom::new_from_label(stringify!($num), $x, $y, $z),)*
	    ])
    };
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Molecule {
    pub atoms: Vec<Atom>,
}

impl Molecule {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self { atoms }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// return the atomic numbers of each atoms as a vector
    pub fn atomic_numbers(&self) -> Vec<usize> {
        self.atoms.iter().map(|a| a.atomic_number).collect()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.atoms.iter().map(|a| a.label()).collect()
    }

    /// return the masses of each atom in amu
    pub fn weights(&self) -> Vec<f64> {
        self.atoms.iter().map(Atom::weight).collect()
    }

    /// the flattened Cartesian coordinates, x1 y1 z1 x2 ...
    pub fn coords(&self) -> Vec<f64> {
        self.atoms.iter().flat_map(|a| [a.x, a.y, a.z]).collect()
    }

    pub fn positions(&self) -> Vec<Vec3> {
        self.atoms.iter().map(Atom::coord).collect()
    }

    /// replace the coordinates of `self` with the flattened `coords`. panics
    /// if the length does not match
    pub fn set_coords(&mut self, coords: &[f64]) {
        assert_eq!(coords.len(), 3 * self.atoms.len());
        for (atom, c) in self.atoms.iter_mut().zip(coords.chunks(3)) {
            atom.set_coord(Vec3::new(c[0], c[1], c[2]));
        }
    }

    /// the number of atoms heavier than hydrogen
    pub fn heavy_atoms(&self) -> usize {
        self.atoms.iter().filter(|a| a.is_heavy()).count()
    }

    /// the distance between atoms `i` and `j` in the units of the coordinates
    pub fn dist(&self, i: usize, j: usize) -> f64 {
        (self.atoms[j].coord() - self.atoms[i].coord()).magnitude()
    }

    /// compute the center of mass of `self`
    pub fn com(&self) -> Vec3 {
        let mut sum = 0.0;
        let mut com = Vec3::zeros();
        for atom in &self.atoms {
            let w = atom.weight();
            sum += w;
            com += w * atom.coord();
        }
        com / sum
    }

    /// compute the moment of inertia tensor about the origin
    pub fn moi(&self) -> Mat3 {
        let mut ret = Mat3::zeros();
        for atom in &self.atoms {
            let Atom { x, y, z, .. } = atom;
            let w = atom.weight();
            ret[(0, 0)] += w * (y * y + z * z);
            ret[(1, 1)] += w * (x * x + z * z);
            ret[(2, 2)] += w * (x * x + y * y);
            ret[(1, 0)] -= w * x * y;
            ret[(2, 0)] -= w * x * z;
            ret[(2, 1)] -= w * y * z;
        }
        ret[(0, 1)] = ret[(1, 0)];
        ret[(0, 2)] = ret[(2, 0)];
        ret[(1, 2)] = ret[(2, 1)];
        ret
    }

    /// the principal moments of inertia about the center of mass, sorted in
    /// ascending order
    pub fn principal_moments(&self) -> Vec3 {
        let mut shifted = self.clone();
        shifted.translate(-self.com());
        let sym = na::SymmetricEigen::new(shifted.moi());
        let mut moms: Vec<f64> = sym.eigenvalues.iter().copied().collect();
        moms.sort_by(|a, b| a.total_cmp(b));
        Vec3::from_row_slice(&moms)
    }

    /// report whether all of the atoms lie on a single line. single atoms are
    /// not linear, diatomics always are, and larger molecules are linear when
    /// their smallest principal moment vanishes
    pub fn is_linear(&self) -> bool {
        const EPS: f64 = 1e-4;
        match self.atoms.len() {
            0 | 1 => false,
            2 => true,
            _ => {
                let moms = self.principal_moments();
                moms[0] < EPS * moms[2].max(1.0)
            }
        }
    }

    /// translate each of the atoms in `self` by vec
    pub fn translate(&mut self, vec: Vec3) -> &mut Self {
        for atom in self.atoms.iter_mut() {
            *atom += vec;
        }
        self
    }

    /// rotate the atoms in `indices` by `angle` radians about the axis
    /// through `origin` along `axis`, following the right-hand rule. the
    /// remaining atoms are left in place
    pub fn rotate_about(
        &self,
        indices: &[usize],
        origin: Vec3,
        axis: Vec3,
        angle: f64,
    ) -> Self {
        let rot = na::Rotation3::from_axis_angle(
            &na::Unit::new_normalize(axis),
            angle,
        );
        let mut ret = self.clone();
        for &i in indices {
            let r = ret.atoms[i].coord() - origin;
            ret.atoms[i].set_coord(origin + rot * r);
        }
        ret
    }

    /// the pairs of atoms closer than `scale` times the sum of their covalent
    /// radii, sorted with i < j
    pub fn bonds(&self, scale: f64) -> Vec<(usize, usize)> {
        let mut ret = Vec::new();
        for i in 0..self.atoms.len() {
            for j in i + 1..self.atoms.len() {
                let cut = scale
                    * (self.atoms[i].covalent_radius()
                        + self.atoms[j].covalent_radius());
                if self.dist(i, j) < cut {
                    ret.push((i, j));
                }
            }
        }
        ret
    }

    /// neighbor lists built from `bonds`
    pub fn adjacency(&self, bonds: &[(usize, usize)]) -> Vec<Vec<usize>> {
        let mut ret = vec![Vec::new(); self.atoms.len()];
        for &(i, j) in bonds {
            ret[i].push(j);
            ret[j].push(i);
        }
        for r in ret.iter_mut() {
            r.sort_unstable();
        }
        ret
    }

    /// return a new molecule containing only the atoms in `indices`, in that
    /// order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self::new(indices.iter().map(|&i| self.atoms[i]).collect())
    }

    /// format the geometry as `symbol x y z` lines with full precision
    pub fn xyz_string(&self) -> String {
        use std::fmt::Write;
        let mut ret = String::with_capacity(50 * self.atoms.len());
        for a in &self.atoms {
            // writing to a String cannot fail
            let _ = writeln!(
                ret,
                "{:<2} {:>15.8} {:>15.8} {:>15.8}",
                a.label(),
                a.x,
                a.y,
                a.z
            );
        }
        ret
    }
}

impl Display for Molecule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for atom in &self.atoms {
            writeln!(f, "{atom}")?;
        }
        Ok(())
    }
}

impl AbsDiffEq for Molecule {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        1e-8
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        if self.atoms.len() != other.atoms.len() {
            return false;
        }
        for (i, atom) in self.atoms.iter().enumerate() {
            if !atom.abs_diff_eq(&other.atoms[i], epsilon) {
                return false;
            }
        }
        true
    }
}
