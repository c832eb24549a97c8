//! Builder capability matrix and candidate matching.
//!
//! A builder declares which operating systems, architectures and tags it can
//! serve. Declarations are stored as [`domain::CapabilityEntry`] rows that
//! are always replaced as a whole. [`services::MatchEngine`] turns a task's
//! requirements into the deduplicated list of builders that could run it.

pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
