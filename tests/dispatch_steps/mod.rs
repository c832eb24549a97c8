//! Step definitions for dispatch scenarios.

pub mod world;

mod given;
mod then;
mod when;
