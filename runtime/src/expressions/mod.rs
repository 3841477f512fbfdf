//! Expression units.
//!
//! Literals, identifiers and enumerated constants are read in place and
//! never stepped. Operators and calls hold their result in storage that
//! is allocated from the static type before execution.
mod identifier;
mod literal;
mod operator;
mod qualified;

pub use identifier::Identifier;
pub use literal::{EnumConstant, Literal};
pub use operator::{BinaryOperator, BinaryTerm, UnaryTerm};
pub use qualified::{Access, Link, LinkKind, Qualified};
