//! Error and warning taxonomy for the reaction network builder and driver.

use std::fmt;

/// Fatal conditions raised by [`crate::Gillespie::add_reaction`],
/// [`crate::Gillespie::set_init`] or [`crate::Gillespie::run`].
///
/// These never panic: malformed user input always comes back through a
/// `Result`, never a process abort.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A rate string could not be parsed as an arithmetic expression.
    /// Carries the original, unparsed text.
    #[error("rate expression not understood: {0:?}")]
    RateExpressionNotUnderstood(String),

    /// An expression rate referenced a name that is neither a declared
    /// species nor a key of the `params` map passed to `run`.
    #[error("missing parameter: {0:?}")]
    MissingParameter(String),

    /// A key of `params` is also the name of a declared species.
    #[error("parameter name collides with species: {0:?}")]
    ParameterNameCollidesWithSpecies(String),

    /// `set_init` was called with a negative copy number for a species.
    #[error("initial count of species {0:?} is negative")]
    InitSpeciesNegative(String),

    /// `var_names` referenced a name that is not a declared species.
    #[error("unknown variable name: {0:?}")]
    UnknownVarName(String),

    /// `tmax` was not strictly positive and finite.
    #[error("tmax must be strictly positive and finite")]
    NonPositiveTmax,
}

/// Non-fatal conditions, collected and returned alongside a successful
/// call rather than aborting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A species named in `init` does not appear as a reactant or
    /// product of any reaction. It is still interned and will appear
    /// in the output with a constant value.
    SpeciesNotInvolvedInAnyReaction(String),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::SpeciesNotInvolvedInAnyReaction(name) => {
                write!(f, "species {name:?} is not involved in any reaction")
            }
        }
    }
}
