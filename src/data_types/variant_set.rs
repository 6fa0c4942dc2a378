use crate::data_types::summary_metrics::WarningCounts;
use crate::data_types::variants::Variant;

/// All the usable variants for a single reference sequence, ready to be evaluated
#[derive(Clone, Debug, Default)]
pub struct VariantSet {
    /// The reference sequence name
    sequence_name: String,
    /// Baseline variants, sorted and non-overlapping
    baseline: Vec<Variant>,
    /// Called variants, sorted and non-overlapping
    calls: Vec<Variant>,
    /// Records dropped while loading this sequence
    warnings: WarningCounts
}

impl VariantSet {
    /// Constructor; sorts both sides by position
    pub fn new(sequence_name: String, mut baseline: Vec<Variant>, mut calls: Vec<Variant>, warnings: WarningCounts) -> Self {
        baseline.sort();
        calls.sort();
        Self {
            sequence_name, baseline, calls, warnings
        }
    }

    /// An empty set, used for sequences that have no records in either input
    pub fn empty(sequence_name: String) -> Self {
        Self {
            sequence_name,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.baseline.is_empty() && self.calls.is_empty()
    }

    // getters
    pub fn sequence_name(&self) -> &str {
        &self.sequence_name
    }

    pub fn baseline(&self) -> &[Variant] {
        &self.baseline
    }

    pub fn calls(&self) -> &[Variant] {
        &self.calls
    }

    pub fn warnings(&self) -> WarningCounts {
        self.warnings
    }
}
