//! Problem codes for the linker and runtime.
//!
//! The problems are defined in `resources/problem-codes.csv` and the
//! build script generates the [`Problem`] enumeration from that file.
//! Codes starting with `P` are static (link and verification) problems
//! and codes starting with `R` are runtime problems.

include!(concat!(env!("OUT_DIR"), "/problems.rs"));

impl Problem {
    /// Returns true if the problem is detected while executing rather
    /// than while linking.
    pub fn is_runtime(&self) -> bool {
        self.code().starts_with('R')
    }
}
