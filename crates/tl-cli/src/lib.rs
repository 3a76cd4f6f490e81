//! Time ledger CLI library.
//!
//! This crate provides the `tl` command-line interface: argument parsing,
//! configuration, network rate sources and report rendering.

mod cli;
pub mod commands;
mod config;
mod rates;
pub mod render;

pub use cli::{Cli, Commands, EntrySource, ExportArgs, OutputFormat};
pub use config::{Config, Text};
