//! Registre Qard - aggregator document puller
//!
//! Authenticates with a static API key and works per SIREN through the
//! aggregator's user model: find (or create) the user, list its files or
//! acts, and download the allowed datatypes.
//!
//! Four batch modes share the same client:
//! - [`download`]: bulk file download per SIREN
//! - [`acts`]: sync and list registry acts into a CSV
//! - [`from_csv`]: download the file ids listed in a CSV
//! - [`users`]: user activity report

pub mod acts;
pub mod api;
pub mod config;
pub mod download;
pub mod files;
pub mod from_csv;
pub mod records;
pub mod users;

pub use config::Config;
