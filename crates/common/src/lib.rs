//! Common utilities shared across the bearer verifier crates.

#![warn(clippy::pedantic)]

/// Module for JWT utilities (structural parsing, lifetime and audience checks)
pub mod jwt;
