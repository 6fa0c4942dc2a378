/// Pointer back to an input record, plus what we learned about it
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecordRef {
    /// Ordinal of the record within its sequence
    pub source_index: usize,
    /// 0-based start of the normalized variant, used to sanity check the record when it is read again
    pub start: u64,
    /// Fractional true-positive credit, only set for called true positives
    pub weight: Option<f64>
}

/// The categorized records for one reference sequence, each list sorted by source index
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SequenceResult {
    /// The sequence these records belong to
    pub sequence_name: String,
    /// Called records that matched the baseline
    pub true_positives: Vec<RecordRef>,
    /// Called records without a baseline match
    pub false_positives: Vec<RecordRef>,
    /// Baseline records without a called match
    pub false_negatives: Vec<RecordRef>,
    /// Baseline records that were matched
    pub baseline_true_positives: Vec<RecordRef>
}

impl SequenceResult {
    /// A result with nothing in it
    pub fn new(sequence_name: String) -> Self {
        Self {
            sequence_name,
            ..Default::default()
        }
    }

    /// Sorts every category back into file order
    pub fn sort(&mut self) {
        for records in [&mut self.true_positives, &mut self.false_positives, &mut self.false_negatives, &mut self.baseline_true_positives] {
            records.sort_by_key(|r| r.source_index);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.true_positives.is_empty() && self.false_positives.is_empty() &&
            self.false_negatives.is_empty() && self.baseline_true_positives.is_empty()
    }
}
