//! Resumable execution of IEC 61131-3 Structured Text.
//!
//! The [`linker`] binds unlinked declarations from any number of
//! libraries into an [`Application`]. The application runs each program
//! of record cycle by cycle, and a debugger can suspend a cycle after any
//! statement or expression term and resume it later.
// Allow large errors because diagnostics carry every label and context.
#![allow(clippy::result_large_err)]

pub mod application;
pub mod config;
pub mod cursor;
pub mod datatypes;
pub mod error;
pub mod expressions;
pub mod invocation;
pub mod linker;
pub mod logger;
pub mod machine;
pub mod memory;
pub mod pou;
pub mod reference_pool;
pub mod statements;
pub mod type_table;
pub mod unit;
pub mod value;

pub use application::{Application, ProgramOfRecord, StepEvent};
pub use config::RuntimeConfig;
pub use error::{Fault, FaultClass, FaultContext, ValueError};
pub use linker::{link, Linker};
pub use value::Value;
