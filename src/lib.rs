// Library exports for secshell
// This allows the modules to be imported in tests and external code

pub mod approval;
pub mod commands;
pub mod config;
pub mod error;
pub mod permissions;
pub mod persistence;
pub mod session;
pub mod tools;
