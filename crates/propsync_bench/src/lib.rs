//! # PropSync Benchmarks
//!
//! Shared input generators for the criterion benchmarks under `benches/`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;
