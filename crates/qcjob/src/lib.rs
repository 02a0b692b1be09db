//! Single-point energy evaluation through an external quantum chemistry
//! program.

pub mod evaluator;
pub mod local;
pub mod program;

pub use evaluator::{EvalError, Evaluator, QChemEvaluator, Retry};
pub use local::Local;
pub use program::{QmmmSection, SinglePoint};
