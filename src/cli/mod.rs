//! Command-line handlers

pub mod commands;

pub use commands::{cmd_attack, cmd_demo, cmd_mine, cmd_validate, print_chain_info, CliResult};
