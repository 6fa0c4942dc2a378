/*!
# CLI module
Command line interface functionality that is specific to varsync.
*/

/// The main CLI module that contains the top-level CLI parser and help text
pub mod core;
/// The eval CLI subcommand
pub mod eval;
