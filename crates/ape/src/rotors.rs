//! Hindered rotor detection from molecular connectivity

use std::collections::VecDeque;

use molecule::{BOND_SCALE, Molecule, Vec3};
use serde::{Deserialize, Serialize};

/// bonds shorter than this fraction of the sum of covalent radii are treated
/// as multiple bonds and cannot rotate
const MULTIPLE_BOND: f64 = 0.9;

/// candidate rotational symmetries of each side of a rotor, highest first
const SYMMETRIES: [usize; 2] = [3, 2];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rotor {
    /// the bonded atoms defining the rotation axis. the second one belongs to
    /// the top
    pub pivots: (usize, usize),

    /// the atoms that turn during the scan, including `pivots.1`
    pub top: Vec<usize>,

    /// the dihedral followed during the scan
    pub scan: [usize; 4],

    /// number of indistinguishable minima in one full turn
    pub symmetry: usize,
}

impl Rotor {
    /// the rotation axis from the fixed pivot to the top pivot
    pub fn axis(&self, mol: &Molecule) -> Vec3 {
        mol.atoms[self.pivots.1].coord() - mol.atoms[self.pivots.0].coord()
    }

    /// a copy of `self` with every atom index passed through `map`
    pub fn remap(&self, map: &[usize]) -> Self {
        Self {
            pivots: (map[self.pivots.0], map[self.pivots.1]),
            top: self.top.iter().map(|&i| map[i]).collect(),
            scan: self.scan.map(|i| map[i]),
            symmetry: self.symmetry,
        }
    }
}

pub trait RotorDetector {
    fn rotors(&self, mol: &Molecule) -> Vec<Rotor>;
}

/// Find rotors as single, acyclic bonds between two non-terminal atoms
#[derive(Clone, Debug, PartialEq)]
pub struct TopologyDetector {
    pub bond_scale: f64,

    /// distance in Å within which rotated atoms must land on an equivalent
    /// atom for a side to count as symmetric
    pub tolerance: f64,
}

impl Default for TopologyDetector {
    fn default() -> Self {
        Self {
            bond_scale: BOND_SCALE,
            tolerance: 0.1,
        }
    }
}

impl RotorDetector for TopologyDetector {
    fn rotors(&self, mol: &Molecule) -> Vec<Rotor> {
        let bonds = mol.bonds(self.bond_scale);
        let adj = mol.adjacency(&bonds);
        let mut ret = Vec::new();
        for &(i, j) in &bonds {
            if adj[i].len() < 2 || adj[j].len() < 2 {
                continue;
            }
            let (ai, aj) = (&mol.atoms[i], &mol.atoms[j]);
            let single =
                MULTIPLE_BOND * (ai.covalent_radius() + aj.covalent_radius());
            if mol.dist(i, j) < single {
                continue;
            }
            let side_j = side(&adj, j, i);
            if side_j.contains(&i) {
                // ring bond
                continue;
            }
            let side_i: Vec<usize> =
                (0..mol.len()).filter(|k| !side_j.contains(k)).collect();
            if self.on_axis(mol, i, j, &side_i) || self.on_axis(mol, i, j, &side_j)
            {
                continue;
            }
            let (fixed, top, top_side, rest) = if side_j.len() <= side_i.len() {
                (i, j, side_j, side_i)
            } else {
                (j, i, side_i, side_j)
            };
            let symmetry = lcm(
                self.symmetry(mol, fixed, top, &top_side),
                self.symmetry(mol, fixed, top, &rest),
            );
            // both pivots have another neighbor by the degree check above
            let a = adj[fixed].iter().copied().find(|&a| a != top);
            let d = adj[top].iter().copied().find(|&d| d != fixed);
            let (Some(a), Some(d)) = (a, d) else {
                continue;
            };
            log::debug!(
                "rotor about {}-{} with {} top atoms and symmetry {symmetry}",
                fixed + 1,
                top + 1,
                top_side.len()
            );
            ret.push(Rotor {
                pivots: (fixed, top),
                top: top_side,
                scan: [a, fixed, top, d],
                symmetry,
            });
        }
        ret
    }
}

impl TopologyDetector {
    /// report whether every atom of `group` lies on the `i`-`j` axis, so
    /// rotating it changes nothing
    fn on_axis(&self, mol: &Molecule, i: usize, j: usize, group: &[usize]) -> bool {
        let origin = mol.atoms[i].coord();
        let axis = (mol.atoms[j].coord() - origin).normalize();
        group.iter().all(|&k| {
            let r = mol.atoms[k].coord() - origin;
            (r - r.dot(&axis) * axis).norm() < self.tolerance
        })
    }

    /// the highest order of rotation about the `fixed`-`top` axis mapping
    /// `group` onto itself
    fn symmetry(
        &self,
        mol: &Molecule,
        fixed: usize,
        top: usize,
        group: &[usize],
    ) -> usize {
        let origin = mol.atoms[top].coord();
        let axis = origin - mol.atoms[fixed].coord();
        for n in SYMMETRIES {
            let angle = std::f64::consts::TAU / n as f64;
            let rotated = mol.rotate_about(group, origin, axis, angle);
            let maps = group.iter().all(|&k| {
                let r = rotated.atoms[k];
                group.iter().any(|&l| {
                    let a = mol.atoms[l];
                    a.atomic_number == r.atomic_number
                        && (a.coord() - r.coord()).norm() < self.tolerance
                })
            });
            if maps {
                return n;
            }
        }
        1
    }
}

/// the atoms reachable from `start` without crossing the bond to `from`,
/// sorted
fn side(adj: &[Vec<usize>], start: usize, from: usize) -> Vec<usize> {
    let mut seen = vec![false; adj.len()];
    seen[start] = true;
    let mut queue = VecDeque::from([start]);
    while let Some(k) = queue.pop_front() {
        for &l in &adj[k] {
            if k == start && l == from {
                continue;
            }
            if !seen[l] {
                seen[l] = true;
                queue.push_back(l);
            }
        }
    }
    (0..adj.len()).filter(|&k| seen[k]).collect()
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 { a } else { gcd(b, a % b) }
}

fn lcm(a: usize, b: usize) -> usize {
    a / gcd(a, b) * b
}
