//! Registre SIRENE - sample SIRENs that exist and are publicly diffusible
//!
//! Draws valid identifiers (Luhn) uniformly from a numeric range, asks the
//! public search API which of them exist, and writes the survivors to the
//! identifiers file the document pullers read.

pub mod api;
pub mod config;
pub mod luhn;
pub mod runner;

pub use config::Config;
pub use luhn::{SampleError, check_digit, passes_luhn, sample_valid_sirens};
