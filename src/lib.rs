//! Core library for the upgrade readiness analyzer: discovers a
//! content-management installation's layout and extensions, resolves
//! abstract path roles against it, parses its configuration, runs a
//! battery of analyzers against each extension, and builds a
//! consolidated, risk-graded report.
//!
//! `main.rs` is a thin CLI driver over this library; everything here is
//! usable as a plain Rust API independent of the `ura` binary.

pub mod analysis;
pub mod cache;
pub mod clients;
pub mod config;
pub mod configparser;
pub mod discovery;
pub mod error;
pub mod model;
pub mod path;
pub mod report;
pub mod score;
pub mod version;
