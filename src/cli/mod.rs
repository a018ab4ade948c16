//! CLI module for ragserve
//!
//! Handles command-line argument parsing.

pub mod args;

pub use args::{Args, Commands, QueryOptions, Verbosity};
