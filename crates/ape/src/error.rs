use std::{error::Error, fmt::Display, io};

use qcjob::EvalError;
use redint::CoordError;

#[derive(Debug)]
pub enum ApeError {
    /// malformed or insufficient input, such as a missing Hessian, an
    /// unrecognized protocol, or a contradictory transition state
    Input(String),

    /// duplicate labels or references to unknown labels
    Value(String),

    /// unrecognized configuration keys
    Type(String),

    /// numerical results that should not occur for a converged structure
    Computation(String),

    Evaluator(EvalError),
    Coord(CoordError),
    Io(io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
    Toml(toml::de::Error),
}

impl ApeError {
    /// classify a TOML error, reporting unknown keys as [ApeError::Type]
    pub(crate) fn from_toml(e: toml::de::Error) -> Self {
        if e.message().starts_with("unknown field") {
            Self::Type(e.message().to_owned())
        } else {
            Self::Toml(e)
        }
    }

    #[must_use]
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input(..))
    }

    #[must_use]
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(..))
    }

    #[must_use]
    pub fn is_type(&self) -> bool {
        matches!(self, Self::Type(..))
    }

    #[must_use]
    pub fn is_computation(&self) -> bool {
        matches!(self, Self::Computation(..))
    }
}

impl Display for ApeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApeError::Input(s) => write!(f, "input error: {s}"),
            ApeError::Value(s) => write!(f, "value error: {s}"),
            ApeError::Type(s) => write!(f, "type error: {s}"),
            ApeError::Computation(s) => write!(f, "computation error: {s}"),
            ApeError::Evaluator(e) => write!(f, "evaluator error: {e}"),
            ApeError::Coord(e) => write!(f, "coordinate error: {e}"),
            ApeError::Io(e) => write!(f, "{e}"),
            ApeError::Csv(e) => write!(f, "{e}"),
            ApeError::Json(e) => write!(f, "{e}"),
            ApeError::Toml(e) => write!(f, "{e}"),
        }
    }
}

impl Error for ApeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ApeError::Evaluator(e) => Some(e),
            ApeError::Coord(e) => Some(e),
            ApeError::Io(e) => Some(e),
            ApeError::Csv(e) => Some(e),
            ApeError::Json(e) => Some(e),
            ApeError::Toml(e) => Some(e),
            _ => None,
        }
    }
}

macro_rules! from_impls {
    ($($variant:ident($t:ty)$(,)*)*) => {
        $(impl From<$t> for ApeError {
            fn from(value: $t) -> Self {
                Self::$variant(value)
            }
        })*
    }
}

impl From<CoordError> for ApeError {
    fn from(value: CoordError) -> Self {
        match value {
            CoordError::InputError(s) => Self::Input(s),
            e => Self::Coord(e),
        }
    }
}

from_impls!(
    Evaluator(EvalError),
    Io(io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
);
