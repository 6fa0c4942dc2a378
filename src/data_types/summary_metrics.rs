use std::ops::AddAssign;

/// High-level summary metrics accumulated across sequences
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SummaryMetrics {
    /// Number of baseline variants matched by the calls
    pub baseline_tp: u64,
    /// Number of baseline variants missing from the calls
    pub baseline_fn: u64,
    /// Number of called variants that match the baseline
    pub called_tp: u64,
    /// Number of called variants that are not in the baseline
    pub called_fp: u64,
}

impl AddAssign for SummaryMetrics {
    // Enables += with stats
    fn add_assign(&mut self, rhs: Self) {
        self.baseline_tp += rhs.baseline_tp;
        self.baseline_fn += rhs.baseline_fn;
        self.called_tp += rhs.called_tp;
        self.called_fp += rhs.called_fp;
    }
}

impl SummaryMetrics {
    /// Constructor
    pub fn new(baseline_tp: u64, baseline_fn: u64, called_tp: u64, called_fp: u64) -> Self {
        Self {
            baseline_tp, baseline_fn, called_tp, called_fp
        }
    }

    /// Total variants in the baseline that were scored
    pub fn baseline_total(&self) -> u64 {
        self.baseline_tp + self.baseline_fn
    }

    /// Calculates recall if it can, which is relative to the baseline
    pub fn recall(&self) -> Option<f64> {
        let denom = self.baseline_total();
        if denom > 0 {
            Some(self.baseline_tp as f64 / denom as f64)
        } else {
            None
        }
    }

    /// Calculates precision if it can, which is relative to the calls
    pub fn precision(&self) -> Option<f64> {
        let denom = self.called_tp + self.called_fp;
        if denom > 0 {
            Some(self.called_tp as f64 / denom as f64)
        } else {
            None
        }
    }

    /// Calculates F1 score if possible
    pub fn f1(&self) -> Option<f64> {
        match (self.recall(), self.precision()) {
            (Some(recall), Some(precision)) if recall + precision > 0.0 => {
                Some(2.0 * recall * precision / (recall + precision))
            },
            (Some(_), Some(_)) => Some(0.0),
            _ => None
        }
    }
}

/// Phasing outcomes for heterozygous phased calls
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PhasingCounts {
    /// Calls whose phase agrees with the baseline relative to the previous call
    pub correct: u64,
    /// Calls whose phase flips relative to the baseline
    pub misphasings: u64,
    /// Calls in regions where the baseline phasing was itself inconsistent
    pub unphaseable: u64
}

impl AddAssign for PhasingCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.correct += rhs.correct;
        self.misphasings += rhs.misphasings;
        self.unphaseable += rhs.unphaseable;
    }
}

/// Non-fatal conditions that get reported once at the end of a run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WarningCounts {
    /// Regions abandoned by the search for being too complex
    pub skipped_regions: u64,
    /// Baseline variants inside abandoned regions
    pub skipped_baseline: u64,
    /// Called variants inside abandoned regions
    pub skipped_called: u64,
    /// Records that did not pass the FILTER column
    pub filtered_records: u64,
    /// Records with missing, reference, or unusable genotypes
    pub unusable_genotypes: u64,
    /// Variants with oversized or out-of-bounds alleles
    pub malformed_variants: u64,
    /// Variants dropped for overlapping an earlier variant or being an ambiguous co-located insertion
    pub overlapping_variants: u64,
    /// Variants outside the evaluation regions
    pub outside_regions: u64
}

impl AddAssign for WarningCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.skipped_regions += rhs.skipped_regions;
        self.skipped_baseline += rhs.skipped_baseline;
        self.skipped_called += rhs.skipped_called;
        self.filtered_records += rhs.filtered_records;
        self.unusable_genotypes += rhs.unusable_genotypes;
        self.malformed_variants += rhs.malformed_variants;
        self.overlapping_variants += rhs.overlapping_variants;
        self.outside_regions += rhs.outside_regions;
    }
}

impl WarningCounts {
    /// True if nothing was reported
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
