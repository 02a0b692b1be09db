use std::{
    fmt::Display,
    io,
    ops::AddAssign,
    str::FromStr,
};

use approx::AbsDiffEq;
use serde::{Deserialize, Serialize};

use crate::{
    Vec3,
    weights::{COVALENT_RADII, WEIGHTS},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Atom {
    pub atomic_number: usize,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// overrides the default isotope mass for this atom
    #[serde(default)]
    pub weight: Option<f64>,
}

impl PartialEq for Atom {
    fn eq(&self, other: &Self) -> bool {
        self.abs_diff_eq(other, Self::default_epsilon())
    }
}

impl AbsDiffEq for Atom {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        1e-8
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() < epsilon;
        self.atomic_number == other.atomic_number
            && close(self.x, other.x)
            && close(self.y, other.y)
            && close(self.z, other.z)
    }
}

impl AddAssign<Vec3> for Atom {
    fn add_assign(&mut self, rhs: Vec3) {
        self.x += rhs[0];
        self.y += rhs[1];
        self.z += rhs[2];
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:2} {:15.10} {:15.10} {:15.10}",
            self.label(),
            self.x,
            self.y,
            self.z
        )
    }
}

impl FromStr for Atom {
    type Err = io::Error;

    /// parse an Atom from a line like
    ///  C 1.0 1.0 1.0
    /// where the first field is either an atomic symbol or an atomic number
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<_> = s.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(io::Error::other("wrong number of fields in Atom"));
        }
        let mut coord = [0.0; 3];
        for (c, f) in coord.iter_mut().zip(&fields[1..]) {
            *c = f.parse().map_err(|_| {
                io::Error::other("failed to parse coordinate field as f64")
            })?;
        }
        let number = match fields[0].parse::<usize>() {
            Ok(n) if n < NUMBER_TO_SYMBOL.len() => n,
            Ok(n) => {
                return Err(io::Error::other(format!(
                    "unsupported atomic number {n}"
                )));
            }
            Err(_) => symbol_to_number(fields[0]).ok_or_else(|| {
                io::Error::other(format!(
                    "failed to locate atomic symbol {}",
                    fields[0]
                ))
            })?,
        };
        Ok(Self::new(number, coord[0], coord[1], coord[2]))
    }
}

pub const NUMBER_TO_SYMBOL: [&str; 37] = [
    "X", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg",
    "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn",
    "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As", "Se", "Br", "Kr",
];

/// look up the atomic number of `s`, ignoring its case
pub fn symbol_to_number(s: &str) -> Option<usize> {
    NUMBER_TO_SYMBOL
        .iter()
        .position(|&x| x == s)
        .or_else(|| NUMBER_TO_SYMBOL.iter().position(|&x| x == titlecase(s)))
}

fn titlecase(s: &str) -> String {
    let mut cs = s.chars();
    match cs.next() {
        Some(c) => c
            .to_uppercase()
            .chain(cs.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

impl Atom {
    pub fn new(atomic_number: usize, x: f64, y: f64, z: f64) -> Self {
        Self {
            atomic_number,
            x,
            y,
            z,
            weight: None,
        }
    }

    /// panics if `atomic_symbol` is not a known element. see
    /// [symbol_to_number] for a fallible lookup
    pub fn new_from_label(atomic_symbol: &str, x: f64, y: f64, z: f64) -> Self {
        let number = symbol_to_number(atomic_symbol).unwrap_or_else(|| {
            panic!("failed to locate atomic symbol {atomic_symbol}")
        });
        Self::new(number, x, y, z)
    }

    #[inline]
    pub const fn label(&self) -> &str {
        NUMBER_TO_SYMBOL[self.atomic_number]
    }

    pub fn coord(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn set_coord(&mut self, v: Vec3) {
        self.x = v[0];
        self.y = v[1];
        self.z = v[2];
    }

    pub fn weight(&self) -> f64 {
        self.weight.unwrap_or(WEIGHTS[self.atomic_number])
    }

    pub fn covalent_radius(&self) -> f64 {
        COVALENT_RADII[self.atomic_number]
    }

    pub fn is_heavy(&self) -> bool {
        self.atomic_number > 1
    }
}
