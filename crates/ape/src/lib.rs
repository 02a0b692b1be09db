//! Anharmonic vibrational sampling: partition the internal motions of a
//! molecule into hindered rotors and vibrations, sample the potential energy
//! along each of them, and save the profiles for the partition functions.

pub mod classify;
pub mod consts;
pub mod error;
pub mod input;
pub mod job;
pub mod output;
pub mod projection;
pub mod rotors;
pub mod sampling;
pub mod source;
pub mod summary;

pub use error::ApeError;

#[macro_export]
macro_rules! die {
    ($($t:tt)*) => {{
        eprintln!($($t)*);
        std::process::exit(1)
    }};
}
