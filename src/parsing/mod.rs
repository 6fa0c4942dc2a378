/*!
# Parsing module
Contains the logic for parsing input files into meaningful structs / data.
*/
/// Restricts the evaluation to BED regions
pub mod evaluation_regions;
/// Helper functions for noodles
pub mod noodles_helper;
/// Converts VCF records into variants, one reference sequence at a time
pub mod variant_loader;
