//! Integration tests for secshell
//!
//! These tests exercise the persistence layer through its public API and
//! drive the `secshell` binary end to end.

// Test utilities and common setup
mod common;

mod cli_tests;
mod memory_tests;
mod session_tests;

pub use common::*;
