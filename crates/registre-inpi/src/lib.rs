//! Registre INPI - national business registry acte puller
//!
//! Logs in with a username and password, lists the actes filed for each
//! SIREN, keeps the allowed types and downloads them as PDF files or packs
//! them base64-encoded into JSON.
//!
//! # Example
//!
//! ```ignore
//! use registre_inpi::{Config, api, runner};
//!
//! let config = Config { username, password, ..Default::default() };
//! let mut client = api::build_client(&config, transport, Arc::new(ThreadSleep));
//! let stats = runner::run(&mut client, &config, &sirens, &progress)?;
//! ```

pub mod api;
pub mod config;
pub mod pack;
pub mod runner;

pub use config::Config;
