//! Scene description foundations.

use strum::{Display, EnumString};

mod path;
mod value;

pub use path::{path, Path};
pub use value::*;

/// Grammatical role of a prim block.
///
/// See <https://openusd.org/release/usdfaq.html#what-s-the-difference-between-an-over-and-a-typeless-def>
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Specifier {
    /// A concrete, defined prim.
    #[default]
    Def,
    /// A speculative override.
    Over,
    /// Prim from which other prims inherit.
    Class,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Variability {
    #[default]
    Varying,
    Uniform,
}

/// Describes how a list-valued metadatum (or relationship) combines with
/// the values it inherits through composition.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ListEditQual {
    /// No qualifier keyword in front of the statement.
    #[default]
    Unqualified,
    /// The list was assigned `None`, discarding anything inherited.
    ExplicitReset,
    Prepend,
    Append,
    Add,
    Delete,
}

/// Coarse classification of a model hierarchy.
///
/// See <https://openusd.org/release/glossary.html#usdglossary-kind>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Kind {
    Model,
    Group,
    Assembly,
    Component,
    Subcomponent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Axis {
    X,
    Y,
    Z,
}
