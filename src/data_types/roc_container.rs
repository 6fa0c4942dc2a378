use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::cli::eval::SortOrder;

/// The variant partitions we build separate ROC curves for
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, strum_macros::AsRefStr)]
pub enum RocFilter {
    #[strum(serialize = "weighted")]
    All,
    #[strum(serialize = "heterozygous")]
    Heterozygous,
    #[strum(serialize = "homozygous")]
    Homozygous
}

impl RocFilter {
    /// Every filter, in output order
    pub const ALL_FILTERS: [RocFilter; 3] = [RocFilter::All, RocFilter::Heterozygous, RocFilter::Homozygous];
}

/// Score wrapper with a total order so it can key a map; NaN is kept out of the map entirely
#[derive(Clone, Copy, Debug)]
struct RocScore(f64);

impl PartialEq for RocScore {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RocScore {}

impl PartialOrd for RocScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RocScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Accumulated counts at one score threshold
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RocPoint {
    /// Weighted true positives, fractional
    pub true_positives: f64,
    /// False positives
    pub false_positives: u64
}

impl std::ops::AddAssign for RocPoint {
    fn add_assign(&mut self, rhs: Self) {
        self.true_positives += rhs.true_positives;
        self.false_positives += rhs.false_positives;
    }
}

/// One called variant's contribution to the curves
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RocLine {
    /// ROC sort value, NaN if absent
    pub score: f64,
    /// True-positive credit; 0.0 marks a false positive
    pub weight: f64,
    /// The categories this line counts towards
    pub filters: [RocFilter; 2]
}

/// A cumulative row of an output ROC table
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RocRow {
    pub score: f64,
    pub true_positives: f64,
    pub false_positives: u64
}

/// Per-filter score-keyed accumulators for the ROC curves
#[derive(Clone, Debug)]
pub struct RocContainer {
    /// Which end of the score range is "best"
    sort_order: SortOrder,
    /// Score-keyed entries for each filter
    points: BTreeMap<RocFilter, BTreeMap<RocScore, RocPoint>>,
    /// Entries without a score, always reported last
    unscored: BTreeMap<RocFilter, RocPoint>
}

impl RocContainer {
    /// Creates an empty container
    /// # Arguments
    /// * `sort_order` - `Descending` if higher scores are more confident
    pub fn new(sort_order: SortOrder) -> Self {
        Self {
            sort_order,
            points: Default::default(),
            unscored: Default::default()
        }
    }

    /// Records one called variant.
    /// Positive weights add to the weighted true positives, a weight of 0.0 counts one false positive.
    /// # Arguments
    /// * `line` - the score, weight and filter categories for the variant
    pub fn add_roc_line(&mut self, line: &RocLine) {
        let point = if line.weight > 0.0 {
            RocPoint { true_positives: line.weight, false_positives: 0 }
        } else {
            RocPoint { true_positives: 0.0, false_positives: 1 }
        };

        for &filter in line.filters.iter() {
            let entry = if line.score.is_nan() {
                self.unscored.entry(filter).or_default()
            } else {
                self.points.entry(filter).or_default()
                    .entry(RocScore(line.score)).or_default()
            };
            *entry += point;
        }
    }

    /// Totals over every score for a filter
    pub fn totals(&self, filter: RocFilter) -> RocPoint {
        let mut total = self.unscored.get(&filter).copied().unwrap_or_default();
        if let Some(score_map) = self.points.get(&filter) {
            for &point in score_map.values() {
                total += point;
            }
        }
        total
    }

    /// Builds the cumulative table for a filter, best score first and unscored entries last
    pub fn cumulative_rows(&self, filter: RocFilter) -> Vec<RocRow> {
        let empty = BTreeMap::new();
        let score_map = self.points.get(&filter).unwrap_or(&empty);
        let ordered: Box<dyn Iterator<Item = (&RocScore, &RocPoint)>> = match self.sort_order {
            SortOrder::Descending => Box::new(score_map.iter().rev()),
            SortOrder::Ascending => Box::new(score_map.iter())
        };

        let mut running = RocPoint::default();
        let mut rows: Vec<RocRow> = ordered
            .map(|(score, &point)| {
                running += point;
                RocRow { score: score.0, true_positives: running.true_positives, false_positives: running.false_positives }
            })
            .collect();

        if let Some(&point) = self.unscored.get(&filter) {
            running += point;
            rows.push(RocRow { score: f64::NAN, true_positives: running.true_positives, false_positives: running.false_positives });
        }
        rows
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }
}
