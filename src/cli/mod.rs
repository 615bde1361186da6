//! CLI module for FedQuery
//!
//! Handles command-line argument parsing and terminal output.

pub mod args;
pub mod output;

pub use args::{Args, Commands, Verbosity};
