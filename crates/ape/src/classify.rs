use serde::{Deserialize, Serialize};

use crate::ApeError;

/// The partitioning of the internal degrees of freedom into torsions and
/// vibrations
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeCount {
    /// total number of sampled modes
    pub nmode: usize,

    /// number of vibrational modes
    pub n_vib: usize,

    /// number of torsional modes
    pub n_rotors: usize,
}

/// Count the modes of a molecule with `natom` atoms. For QM/MM systems,
/// `n_qm` is the number of QM atoms, whose translations and rotations are
/// frustrated by the environment and therefore count as vibrations
pub fn classify(
    natom: usize,
    linear: bool,
    is_ts: bool,
    n_rotors: usize,
    n_qm: Option<usize>,
) -> Result<ModeCount, ApeError> {
    let ts = is_ts as isize;
    let nmode = match n_qm {
        Some(n_qm) => 3 * n_qm as isize - ts,
        None if linear => 3 * natom as isize - 5 - ts,
        None => 3 * natom as isize - 6 - ts,
    };
    let n_vib = nmode - n_rotors as isize;
    if natom == 0 || nmode < 1 || n_vib < 0 {
        return Err(ApeError::Input(format!(
            "no internal degrees of freedom left for {natom} atoms with \
             {n_rotors} rotors (linear: {linear}, transition state: {is_ts})"
        )));
    }
    Ok(ModeCount {
        nmode: nmode as usize,
        n_vib: n_vib as usize,
        n_rotors,
    })
}
