/// Accumulates weighted ROC points for each variant partition
pub mod roc_container;
/// The categorized records of one reference sequence
pub mod sequence_result;
/// Contains tracker for TP, FP, FN, phasing, and warning counts
pub mod summary_metrics;
/// The variants loaded for one reference sequence
pub mod variant_set;
/// Contains variant definition functionality and checks
pub mod variants;
