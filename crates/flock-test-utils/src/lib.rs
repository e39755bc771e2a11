//! Test fixtures for Flock development.
//!
//! Scripted agents ([`Scripted`], [`Walker`]) and model constructors that
//! integration tests and benchmarks share instead of each redefining
//! their own toy agents.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{scripted_model, walker_model, Scripted, Walker};
