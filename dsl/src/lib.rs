//! Unlinked IEC 61131-3 Structured Text declarations.
//!
//! The objects here are the output of a parser and the input of the
//! runtime linker. References between declarations are by name only.
pub mod common;
pub mod core;
pub mod diagnostic;
pub mod textual;
