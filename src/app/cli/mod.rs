//! CLI module: arguments, configuration file, command-line parsing and output

pub mod args;
pub mod config;
pub mod display;
pub mod parsing;

#[cfg(test)]
mod tests;
