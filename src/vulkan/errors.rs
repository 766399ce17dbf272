use std::error::Error;
use std::fmt;

/// A lightweight ad hoc error for "this physical device doesn't qualify", raised
/// with `anyhow!` at the call site rather than modeled as a `GraphError` variant
/// (device suitability is a bootstrap concern, not a render-graph one).
#[derive(Debug)]
pub struct SuitabilityError(pub &'static str);

impl fmt::Display for SuitabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for SuitabilityError {}
