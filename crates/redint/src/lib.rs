//! Redundant internal coordinates generated from molecular connectivity, their
//! Wilson B matrix, and the iterative conversion of internal-coordinate
//! displacements back to Cartesian geometries.

use serde::{Deserialize, Serialize};
use std::{
    error::Error,
    f64::consts::PI,
    fmt::{Display, Formatter},
    ops::Range,
};

pub mod geom;

use geom::Geom;
use molecule::{BOND_SCALE, Molecule};
use nalgebra as na;

#[cfg(test)]
mod tests;

/// convergence threshold on the RMS Cartesian step in Å
const TOLDISP: f64 = 1e-10;
const MAX_ITER: usize = 100;

/// angles above this many degrees are replaced by a pair of linear bends
const LINEAR_CUTOFF: f64 = 175.0;

/// eigenvalues of BBᵀ below this fraction of the largest one are treated as
/// redundancies when forming the generalized inverse
const EIG_TOL: f64 = 1e-8;

type Vec3 = na::Vector3<f64>;
pub type DMat = na::DMatrix<f64>;
pub type DVec = na::DVector<f64>;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Siic {
    /// bond stretch between two atoms
    Stretch(usize, usize),

    /// central atom is second like normal people would expect
    Bend(usize, usize, usize),

    /// one component of a nearly linear `a`-`b`-`c` bend: the projection of
    /// the sum of the unit vectors b→a and b→c onto `axis`, which is fixed
    /// perpendicular to the a→c line when the coordinate is built
    LinearBend {
        a: usize,
        b: usize,
        c: usize,
        axis: [f64; 3],
    },

    /// angle between planes formed by i, j, k and j, k, l. also used for
    /// improper torsions describing the pyramidalization of a
    /// three-coordinate center
    Torsion(usize, usize, usize, usize),
}

impl Display for Siic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Siic::Stretch(i, j) => write!(f, "r({}-{})", i + 1, j + 1),
            Siic::Bend(i, j, k) => {
                write!(f, "∠({}-{}-{})", i + 1, j + 1, k + 1)
            }
            Siic::LinearBend { a, b, c, .. } => {
                write!(f, "LIN({}-{}-{})", a + 1, b + 1, c + 1)
            }
            Siic::Torsion(i, j, k, l) => {
                write!(f, "τ({}-{}-{}-{})", i + 1, j + 1, k + 1, l + 1)
            }
        }
    }
}

impl Siic {
    /// the value of `self` in Å or radians
    pub fn value(&self, geom: &Geom) -> f64 {
        use Siic::*;
        match self {
            Stretch(a, b) => geom.dist(*a, *b),
            Bend(a, b, c) => geom.angle(*a, *b, *c),
            LinearBend { a, b, c, axis } => {
                let ea = Vec3::from(*axis);
                ea.dot(&(geom.unit(*b, *a) + geom.unit(*b, *c)))
            }
            Torsion(a, b, c, d) => geom.dihedral(*a, *b, *c, *d),
        }
    }

    #[must_use]
    pub fn is_torsion(&self) -> bool {
        matches!(self, Self::Torsion(..))
    }
}

/// wrap an angle difference into (-π, π]
pub fn wrap_angle(x: f64) -> f64 {
    let y = (x + PI).rem_euclid(2.0 * PI) - PI;
    if y == -PI { PI } else { y }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoordError {
    /// the molecule cannot be described by internal coordinates
    InputError(String),

    /// the back-transformation failed to converge
    DispError { iterations: usize, rms: f64 },
}

impl Display for CoordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordError::InputError(s) => write!(f, "{s}"),
            CoordError::DispError { iterations, rms } => write!(
                f,
                "back-transformation failed to converge after {iterations} \
                 iterations (rms step {rms:.3e} Å)"
            ),
        }
    }
}

impl Error for CoordError {}

/// A set of redundant internal coordinates for one molecule. The coordinates
/// for the rotors, if any, always come last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedundantCoords {
    pub coords: Vec<Siic>,

    /// number of rotor torsions at the end of `coords`
    pub n_rotors: usize,

    /// number of hydrogen capping atoms at a QM/MM boundary
    pub n_hcap: usize,

    natoms: usize,
}

impl RedundantCoords {
    /// build the redundant internal coordinates of `mol`, appending one
    /// torsion per entry in `rotor_scans`. The atoms are bonded according to
    /// their covalent radii, and disconnected fragments are joined through
    /// their closest pair of atoms
    pub fn new(
        mol: &Molecule,
        rotor_scans: &[[usize; 4]],
    ) -> Result<Self, CoordError> {
        let natoms = mol.len();
        if natoms == 0 {
            return Err(CoordError::InputError(
                "at least one atom is required to build internal coordinates"
                    .to_owned(),
            ));
        }
        for scan in rotor_scans {
            if scan.iter().any(|&i| i >= natoms) {
                return Err(CoordError::InputError(format!(
                    "rotor scan {scan:?} refers to an atom outside of the \
                     {natoms}-atom molecule"
                )));
            }
        }
        let geom = Geom::from(mol);
        let bonds = connect_fragments(mol, mol.bonds(BOND_SCALE));
        let adj = mol.adjacency(&bonds);
        let is_linear = |a, b, c| {
            geom.angle(a, b, c).to_degrees() > LINEAR_CUTOFF
        };

        let mut coords: Vec<Siic> =
            bonds.iter().map(|&(i, j)| Siic::Stretch(i, j)).collect();

        for (b, nbrs) in adj.iter().enumerate() {
            for (k, &a) in nbrs.iter().enumerate() {
                for &c in &nbrs[k + 1..] {
                    if is_linear(a, b, c) {
                        let [e1, e2] = perpendicular_axes(geom.unit(a, c));
                        for axis in [e1, e2] {
                            coords.push(Siic::LinearBend {
                                a,
                                b,
                                c,
                                axis: axis.into(),
                            });
                        }
                    } else {
                        coords.push(Siic::Bend(a, b, c));
                    }
                }
            }
        }

        // impropers for three-coordinate centers
        for (b, nbrs) in adj.iter().enumerate() {
            if let &[a, c, d] = nbrs.as_slice()
                && !is_linear(a, b, c)
                && !is_linear(b, c, d)
            {
                coords.push(Siic::Torsion(a, b, c, d));
            }
        }

        for &(b, c) in &bonds {
            for &a in adj[b].iter().filter(|&&a| a != c) {
                if is_linear(a, b, c) {
                    continue;
                }
                for &d in adj[c].iter().filter(|&&d| d != b && d != a) {
                    if is_linear(b, c, d) {
                        continue;
                    }
                    coords.push(Siic::Torsion(a, b, c, d));
                }
            }
        }

        for &[a, b, c, d] in rotor_scans {
            coords.push(Siic::Torsion(a, b, c, d));
        }

        log::debug!(
            "built {} redundant internal coordinates for {natoms} atoms",
            coords.len()
        );

        Ok(Self {
            coords,
            n_rotors: rotor_scans.len(),
            n_hcap: 0,
            natoms,
        })
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn natoms(&self) -> usize {
        self.natoms
    }

    /// the rows of the B matrix belonging to rotor torsions
    pub fn rotor_rows(&self) -> Range<usize> {
        self.len() - self.n_rotors..self.len()
    }

    /// returns a vector of internal coordinate values in Ångstroms or radians
    pub fn values(&self, geom: &Geom) -> DVec {
        DVec::from_iterator(
            self.len(),
            self.coords.iter().map(|s| s.value(geom)),
        )
    }

    /// return the B matrix, with one row per coordinate and one column per
    /// Cartesian coordinate of `geom`
    pub fn b_matrix(&self, geom: &Geom) -> DMat {
        let rows = self.coords.len();
        let cols = 3 * geom.len();
        let mut b_mat = Vec::with_capacity(rows * cols);
        for ic in &self.coords {
            b_mat.extend(geom.s_vec(ic));
        }
        DMat::from_row_slice(rows, cols, &b_mat)
    }

    /// the diagonal projector that zeroes the rotor rows of an
    /// internal-coordinate vector
    pub fn rotor_projector(&self) -> DMat {
        let mut diag = DVec::from_element(self.len(), 1.0);
        for i in self.rotor_rows() {
            diag[i] = 0.0;
        }
        DMat::from_diagonal(&diag)
    }

    /// Let G = BBᵀ and return A = BᵀG⁻, where G⁻ is the generalized inverse of
    /// G. The redundancy in the coordinates makes G singular, so only the
    /// eigenvectors with non-negligible eigenvalues contribute
    pub fn a_matrix(b: &DMat) -> DMat {
        let g = b * b.transpose();
        let sym = na::SymmetricEigen::new(g);
        let max = sym.eigenvalues.iter().copied().fold(0.0, f64::max);
        let mut ginv = DMat::zeros(b.nrows(), b.nrows());
        for (i, &lam) in sym.eigenvalues.iter().enumerate() {
            if lam > EIG_TOL * max {
                let v = sym.eigenvectors.column(i);
                ginv += (v * v.transpose()) / lam;
            }
        }
        b.transpose() * ginv
    }

    /// the difference `desired - current` with torsions wrapped into (-π, π]
    fn deviation(&self, desired: &DVec, current: &DVec) -> DVec {
        let mut ret = desired - current;
        for (i, ic) in self.coords.iter().enumerate() {
            if ic.is_torsion() {
                ret[i] = wrap_angle(ret[i]);
            }
        }
        ret
    }

    /// convert the internal-coordinate displacement `dq` about `geom` into a
    /// new Cartesian geometry. Because the coordinates are redundant, `dq`
    /// may not correspond to any geometry exactly, in which case the result
    /// is the least-squares fit reached when the Cartesian steps vanish
    pub fn displace(&self, geom: &Geom, dq: &DVec) -> Result<Geom, CoordError> {
        let desired = self.values(geom) + dq;
        let mut cart = DVec::from(geom);
        let n = cart.len() as f64;
        let mut rms = f64::INFINITY;
        for iter in 1..=MAX_ITER {
            let current_geom = Geom::from(&cart);
            let current = self.values(&current_geom);
            let a = Self::a_matrix(&self.b_matrix(&current_geom));
            let step = a * self.deviation(&desired, &current);
            cart += &step;
            rms = step.norm() / n.sqrt();
            if !rms.is_finite() {
                break;
            }
            if rms < TOLDISP {
                log::trace!("back-transformation converged in {iter} steps");
                return Ok(Geom::from(&cart));
            }
        }
        Err(CoordError::DispError {
            iterations: MAX_ITER,
            rms,
        })
    }
}

/// join the disconnected fragments implied by `bonds` by repeatedly bonding
/// the closest pair of atoms between the first fragment and any other
fn connect_fragments(
    mol: &Molecule,
    mut bonds: Vec<(usize, usize)>,
) -> Vec<(usize, usize)> {
    loop {
        let frags = fragments(mol.len(), &bonds);
        if frags.len() < 2 {
            break;
        }
        let mut best = (f64::INFINITY, 0, 0);
        for &i in &frags[0] {
            for frag in &frags[1..] {
                for &j in frag {
                    let d = mol.dist(i, j);
                    if d < best.0 {
                        best = (d, i.min(j), i.max(j));
                    }
                }
            }
        }
        log::debug!(
            "joining fragments through atoms {} and {}",
            best.1 + 1,
            best.2 + 1
        );
        bonds.push((best.1, best.2));
    }
    bonds.sort_unstable();
    bonds
}

/// connected components of the bond graph, each sorted, ordered by their
/// lowest atom index
pub fn fragments(natoms: usize, bonds: &[(usize, usize)]) -> Vec<Vec<usize>> {
    let mut label: Vec<usize> = (0..natoms).collect();
    fn find(label: &mut [usize], i: usize) -> usize {
        let mut r = i;
        while label[r] != r {
            r = label[r];
        }
        label[i] = r;
        r
    }
    for &(i, j) in bonds {
        let (ri, rj) = (find(&mut label, i), find(&mut label, j));
        if ri != rj {
            label[ri.max(rj)] = ri.min(rj);
        }
    }
    let mut ret: Vec<Vec<usize>> = Vec::new();
    let mut root_of = vec![usize::MAX; natoms];
    for i in 0..natoms {
        let r = find(&mut label, i);
        if root_of[r] == usize::MAX {
            root_of[r] = ret.len();
            ret.push(Vec::new());
        }
        ret[root_of[r]].push(i);
    }
    ret
}

/// two unit vectors perpendicular to `u` and to each other
fn perpendicular_axes(u: Vec3) -> [Vec3; 2] {
    let mut reference = Vec3::zeros();
    let imin = u.iamin();
    reference[imin] = 1.0;
    let e1 = (reference - reference.dot(&u) * u).normalize();
    let e2 = u.cross(&e1);
    [e1, e2]
}
