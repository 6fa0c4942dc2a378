/*!
# varsync
Haplotype-aware reconciliation of variant calls against a baseline.
Calls and baseline variants are replayed onto the reference, and the search looks for the assignment of variants that makes both sides spell out identical haplotypes.
Differences in variant representation are therefore resolved by what they produce, not by how they are written.
*/

/// Command line interface functionality
pub mod cli;
/// Contains various shared data types
pub mod data_types;
/// Coordinates workers and keeps the output in reference order
pub mod eval_synchronizer;
/// Replays variants onto the reference to build haplotypes
pub mod haplotype;
/// Tooling for parsing input files into meaningful structs / data
pub mod parsing;
/// The search for the best way to match calls to the baseline
pub mod path_finder;
/// Phase consistency of matched calls
pub mod phasing_evaluator;
/// Per-sequence evaluation and the worker pool
pub mod sequence_evaluator;
/// Various utility functions that tend to be very generic
pub mod util;
/// All output writers
pub mod writers;
