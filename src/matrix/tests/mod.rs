//! Unit tests for the capability matrix.
