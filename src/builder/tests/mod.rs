//! Unit tests for the builder module.
