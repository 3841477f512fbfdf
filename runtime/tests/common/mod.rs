//! Helpers shared by the integration tests.
#![allow(dead_code)]

use stint_dsl::common::Library;
use stint_dsl::core::Id;
use stint_dsl::diagnostic::Diagnostic;
use stint_runtime::{link, Application, RuntimeConfig};

/// Sends log records to the test output.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Links the libraries and starts every program.
pub fn start(libraries: Vec<Library>, config: RuntimeConfig) -> Application {
    init_logging();
    let mut app = link(libraries, config)
        .unwrap_or_else(|errors| panic!("expected link to succeed: {errors:?}"));
    app.start_all()
        .unwrap_or_else(|err| panic!("expected start to succeed: {err}"));
    app
}

/// Links the library with the default configuration and starts every
/// program.
pub fn start_one(library: Library) -> Application {
    start(vec![library], RuntimeConfig::default())
}

/// Links the libraries and returns the problems.
pub fn link_errors(libraries: Vec<Library>) -> Vec<Diagnostic> {
    init_logging();
    match link(libraries, RuntimeConfig::default()) {
        Ok(_) => panic!("expected link to fail"),
        Err(errors) => errors,
    }
}

pub fn integer(app: &Application, path: &str) -> i128 {
    app.variable(path)
        .and_then(|value| value.as_integer())
        .unwrap_or_else(|| panic!("expected integer variable {path}"))
}

pub fn main_program() -> Id {
    Id::from("Main")
}
