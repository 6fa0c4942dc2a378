/*!
# Writers module
Contains the logic for writing the output files of the eval command.
*/
/// Helper functions for indexing file
pub mod noodles_idx;
/// Generates the ROC tables
pub mod roc_writer;
/// Generates the summary and phasing files
pub mod summary;
/// Generates the categorized variant files
pub mod variant_categorizer;
