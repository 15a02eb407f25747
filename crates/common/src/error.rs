use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A unit was queried that has never been added to the graph.
    UnitNotFound(String),

    /// An edge weight that is not a positive finite real.
    InvalidRate { from: String, to: String, rate: f64 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnitNotFound(unit) => write!(f, "Unit {} is not part of the graph.", unit),

            Error::InvalidRate { from, to, rate } => write!(
                f,
                "Rate {} -> {} must be positive and finite, got {}.",
                from, to, rate
            ),
        }
    }
}

impl std::error::Error for Error {}
