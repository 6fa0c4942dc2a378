use std::cmp::Ordering;

use crate::data_types::variants::{OrientedVariant, Variant, Variation};
use crate::haplotype::half_path::HalfPath;
use crate::haplotype::playback::{HaplotypePlayback, PlaybackError};
use crate::util::persistent_list::PersistentList;

/// Which input a variant came from
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, strum_macros::AsRefStr)]
pub enum Side {
    #[strum(serialize = "baseline")]
    Baseline,
    #[strum(serialize = "calls")]
    Called
}

/// A joint state of the called and baseline replays, plus the positions where both sides agreed completely.
#[derive(Clone, Debug)]
pub struct Path<'a> {
    /// Replay of the calls being evaluated
    called: HalfPath<'a>,
    /// Replay of the baseline
    baseline: HalfPath<'a>,
    /// Positions where both sides were fully in sync, newest first
    sync_points: PersistentList<i64>
}

/// The outcome of weighting the true positives on a finished path
#[derive(Clone, Debug, Default)]
pub struct TruePositiveWeights<'a> {
    /// Called true positives with their fractional weights, oldest first
    pub called: Vec<OrientedVariant<'a>>,
    /// Baseline true positives, oldest first
    pub baseline: Vec<OrientedVariant<'a>>,
    /// Called variants that were replayed but have no baseline counterpart in their segment
    pub demoted_called: Vec<&'a Variant>,
    /// Baseline variants that were replayed but have no called counterpart in their segment
    pub demoted_baseline: Vec<&'a Variant>
}

impl<'a> Path<'a> {
    /// Creates the starting path, positioned before the first reference base
    pub fn new(reference: &'a [u8]) -> Self {
        Self {
            called: HalfPath::new(reference),
            baseline: HalfPath::new(reference),
            sync_points: PersistentList::new()
        }
    }

    pub fn half(&self, side: Side) -> &HalfPath<'a> {
        match side {
            Side::Called => &self.called,
            Side::Baseline => &self.baseline
        }
    }

    fn half_mut(&mut self, side: Side) -> &mut HalfPath<'a> {
        match side {
            Side::Called => &mut self.called,
            Side::Baseline => &mut self.baseline
        }
    }

    /// Branches on `variant` for one side.
    /// Always yields the exclusion, then inclusion as A if it fits, then inclusion as B if it also has a second allele.
    /// # Arguments
    /// * `side` - which half path the variant belongs to
    /// * `variant` - the candidate
    pub fn add_variant(&self, side: Side, variant: &'a Variant) -> Vec<Path<'a>> {
        let mut parent = self.clone();
        if parent.in_sync() {
            parent.push_sync_point(parent.called.position());
        }

        let mut children = Vec::with_capacity(3);
        let mut exclude = parent.clone();
        exclude.half_mut(side).exclude(variant);
        children.push(exclude);

        if parent.half(side).can_include(variant) {
            let mut include_a = parent.clone();
            include_a.half_mut(side).include(OrientedVariant::new(variant, true));
            children.push(include_a);

            if variant.is_heterozygous() {
                let mut include_b = parent;
                include_b.half_mut(side).include(OrientedVariant::new(variant, false));
                children.push(include_b);
            }
        }
        children
    }

    /// Drops `variant` on one side without recording it, used when abandoning a region
    pub fn skip_variant(&mut self, side: Side, variant: &'a Variant) {
        self.half_mut(side).skip(variant);
    }

    fn push_sync_point(&mut self, position: i64) {
        if self.sync_points.head().is_none_or(|&last| position > last) {
            self.sync_points = self.sync_points.push(position);
        }
    }

    /// Records the end of the replay as the final sync point
    pub fn close(&mut self) {
        self.push_sync_point(self.called.position());
    }

    /// True if every haplotype on both sides sits at the same template position with nothing pending
    pub fn in_sync(&self) -> bool {
        let position = self.called.haplotype_a().template_position();
        self.called.is_settled_at(position) && self.baseline.is_settled_at(position)
    }

    /// Advances by one base, letting a lagging haplotype catch up when the A and B cursors differ
    pub fn step(&mut self) -> Result<(), PlaybackError> {
        match self.called.compare_haplotype_positions() {
            Ordering::Less => {
                self.called.step_haplotype_a()?;
                self.baseline.step_haplotype_a()?;
            },
            Ordering::Greater => {
                self.called.step_haplotype_b()?;
                self.baseline.step_haplotype_b()?;
            },
            Ordering::Equal => {
                self.called.step()?;
                self.baseline.step()?;
            }
        };
        Ok(())
    }

    /// Jumps every haplotype forward; only valid while in sync
    pub fn move_forward(&mut self, position: i64) -> Result<(), PlaybackError> {
        self.called.move_forward(position)?;
        self.baseline.move_forward(position)
    }

    /// True if the called and baseline haplotypes currently agree
    pub fn matches(&self) -> bool {
        haplotypes_match(self.called.haplotype_a(), self.baseline.haplotype_a()) &&
            haplotypes_match(self.called.haplotype_b(), self.baseline.haplotype_b())
    }

    pub fn finished(&self) -> bool {
        self.called.finished() && self.baseline.finished()
    }

    /// The furthest position either side has reached or committed to
    pub fn frontier_position(&self) -> i64 {
        self.called.frontier_position().max(self.baseline.frontier_position())
    }

    /// Picks between two paths with the same replay state.
    /// More called inclusions win, then more baseline inclusions, then a baseline ending on an A orientation.
    /// Remaining ties keep `self`.
    pub fn better(self, other: Path<'a>) -> Path<'a> {
        let prefers_a = |p: &Path| p.baseline.included().head().is_some_and(|ov| ov.is_allele_a());
        let ordering = self.called.included().len().cmp(&other.called.included().len())
            .then(self.baseline.included().len().cmp(&other.baseline.included().len()))
            .then(prefers_a(&self).cmp(&prefers_a(&other)));
        match ordering {
            Ordering::Less => other,
            _ => self
        }
    }

    /// Splits the replayed variants into weighted true positives per sync segment.
    /// Each called true positive gets (baseline TPs in its segment) / (called TPs in its segment), so the weights sum to the baseline TP count.
    pub fn calculate_weights(&self) -> TruePositiveWeights<'a> {
        let sync_points = self.sync_points.to_vec_oldest_first();
        let segment_of = |variant: &OrientedVariant| {
            sync_points.partition_point(|&s| s < variant.start() as i64)
        };

        let called = self.called.included().to_vec_oldest_first();
        let baseline = self.baseline.included().to_vec_oldest_first();
        let mut called_counts = vec![0_usize; sync_points.len() + 1];
        let mut baseline_counts = vec![0_usize; sync_points.len() + 1];
        for ov in called.iter() {
            called_counts[segment_of(ov)] += 1;
        }
        for ov in baseline.iter() {
            baseline_counts[segment_of(ov)] += 1;
        }

        let mut weights = TruePositiveWeights::default();
        for mut ov in called.into_iter() {
            let segment = segment_of(&ov);
            if baseline_counts[segment] == 0 {
                weights.demoted_called.push(ov.variant());
            } else {
                ov.set_weight(baseline_counts[segment] as f64 / called_counts[segment] as f64);
                weights.called.push(ov);
            }
        }
        for mut ov in baseline.into_iter() {
            if called_counts[segment_of(&ov)] == 0 {
                weights.demoted_baseline.push(ov.variant());
            } else {
                ov.set_weight(1.0);
                weights.baseline.push(ov);
            }
        }
        weights
    }

    // getters
    pub fn called(&self) -> &HalfPath<'a> {
        &self.called
    }

    pub fn baseline(&self) -> &HalfPath<'a> {
        &self.baseline
    }

    pub fn sync_points(&self) -> &PersistentList<i64> {
        &self.sync_points
    }
}

/// Finished haplotypes only match other finished haplotypes
fn haplotypes_match(called: &HaplotypePlayback, baseline: &HaplotypePlayback) -> bool {
    match (called.is_finished(), baseline.is_finished()) {
        (true, true) => true,
        (false, false) => called.nt() == baseline.nt(),
        _ => false
    }
}

impl PartialEq for Path<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Path<'_> {}

impl PartialOrd for Path<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Path<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.called.cmp(&other.called)
            .then_with(|| self.baseline.cmp(&other.baseline))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;

    const REFERENCE: &[u8] = b"ACCGTTACCAGGACTTGACAAACCG";

    /// Steps a path until it finishes, requiring every base to match
    fn run_to_end(path: &mut Path) {
        while !path.finished() {
            path.step().unwrap();
            assert!(path.matches());
            if path.in_sync() {
                path.close();
            }
        }
        path.close();
    }

    #[test]
    fn test_branch_counts() {
        let het = Variant::new(0, 5, 6, b"T".to_vec(), Some(b"C".to_vec()), false, 0.0).unwrap();
        let hom = Variant::new(1, 5, 6, b"C".to_vec(), None, false, 0.0).unwrap();
        let path = Path::new(REFERENCE);

        let het_children = path.add_variant(Side::Called, &het);
        assert_eq!(het_children.len(), 3);
        assert_eq!(het_children[0].called().excluded().len(), 1);
        assert!(het_children[1].called().included().head().unwrap().is_allele_a());
        assert!(!het_children[2].called().included().head().unwrap().is_allele_a());

        let hom_children = path.add_variant(Side::Baseline, &hom);
        assert_eq!(hom_children.len(), 2);
        assert_eq!(hom_children[1].baseline().included().len(), 1);

        // the starting position was in sync, so every child carries that sync point
        for child in het_children.iter().chain(hom_children.iter()) {
            assert_eq!(child.sync_points().head(), Some(&-1));
        }
    }

    #[test]
    fn test_blocked_inclusion() {
        let deletion = Variant::new(0, 3, 8, vec![], None, false, 0.0).unwrap();
        let inside = Variant::new(1, 5, 6, b"C".to_vec(), Some(b"A".to_vec()), false, 0.0).unwrap();
        let path = Path::new(REFERENCE);
        let with_deletion = path.add_variant(Side::Called, &deletion).pop().unwrap();
        let children = with_deletion.add_variant(Side::Called, &inside);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].called().excluded().len(), 1);
    }

    #[test]
    fn test_matching_snv() {
        let called = Variant::new(0, 5, 6, b"C".to_vec(), None, false, 10.0).unwrap();
        let baseline = Variant::new(0, 5, 6, b"C".to_vec(), None, false, 10.0).unwrap();
        let mut path = Path::new(REFERENCE).add_variant(Side::Called, &called).pop().unwrap();
        path = path.add_variant(Side::Baseline, &baseline).pop().unwrap();
        run_to_end(&mut path);

        let weights = path.calculate_weights();
        assert_eq!(weights.called.len(), 1);
        assert_eq!(weights.baseline.len(), 1);
        assert_approx_eq!(weights.called[0].weight(), 1.0);
        assert!(weights.demoted_called.is_empty());
    }

    #[test]
    fn test_mismatch() {
        let called = Variant::new(0, 5, 6, b"C".to_vec(), None, false, 10.0).unwrap();
        let mut path = Path::new(REFERENCE).add_variant(Side::Called, &called).pop().unwrap();
        let mut matched = true;
        while !path.finished() && matched {
            path.step().unwrap();
            matched = path.matches();
        }
        assert!(!matched);
        assert_eq!(path.called().position(), 5);
    }

    #[test]
    fn test_weights_split() {
        // two called SNVs that together equal one baseline MNP
        let called_1 = Variant::new(0, 5, 6, b"C".to_vec(), None, false, 10.0).unwrap();
        let called_2 = Variant::new(1, 6, 7, b"T".to_vec(), None, false, 10.0).unwrap();
        let baseline = Variant::new(0, 5, 7, b"CT".to_vec(), None, false, 10.0).unwrap();

        let mut path = Path::new(REFERENCE).add_variant(Side::Called, &called_1).pop().unwrap();
        path = path.add_variant(Side::Called, &called_2).pop().unwrap();
        path = path.add_variant(Side::Baseline, &baseline).pop().unwrap();
        run_to_end(&mut path);

        let weights = path.calculate_weights();
        assert_eq!(weights.called.len(), 2);
        let total: f64 = weights.called.iter().map(|ov| ov.weight()).sum();
        assert_approx_eq!(total, 1.0);
        assert_approx_eq!(weights.called[0].weight(), 0.5);
    }

    #[test]
    fn test_cancelling_demoted() {
        // a called insertion and deletion that cancel out, replayed with no baseline at all
        let insertion = Variant::new(0, 5, 5, b"T".to_vec(), None, false, 10.0).unwrap();
        let deletion = Variant::new(1, 5, 6, vec![], None, false, 10.0).unwrap();
        let mut path = Path::new(REFERENCE).add_variant(Side::Called, &insertion).pop().unwrap();
        path = path.add_variant(Side::Called, &deletion).pop().unwrap();
        run_to_end(&mut path);

        let weights = path.calculate_weights();
        assert!(weights.called.is_empty());
        assert_eq!(weights.demoted_called.len(), 2);
    }

    #[test]
    fn test_better() {
        let het = Variant::new(0, 5, 6, b"T".to_vec(), Some(b"C".to_vec()), false, 0.0).unwrap();
        let path = Path::new(REFERENCE);
        let mut children = path.add_variant(Side::Baseline, &het);
        let as_b = children.pop().unwrap();
        let as_a = children.pop().unwrap();
        let excluded = children.pop().unwrap();

        assert!(as_a.clone().better(as_b.clone()).baseline().included().head().unwrap().is_allele_a());
        assert!(as_b.clone().better(as_a.clone()).baseline().included().head().unwrap().is_allele_a());
        assert_eq!(excluded.clone().better(as_b.clone()).baseline().included().len(), 1);
        assert_eq!(as_b.better(excluded).baseline().included().len(), 1);
    }

    #[test]
    fn test_sync_monotonic() {
        let called = Variant::new(0, 5, 6, b"C".to_vec(), None, false, 10.0).unwrap();
        let baseline = Variant::new(0, 5, 6, b"C".to_vec(), None, false, 10.0).unwrap();
        let mut path = Path::new(REFERENCE).add_variant(Side::Called, &called).pop().unwrap();
        path = path.add_variant(Side::Baseline, &baseline).pop().unwrap();
        run_to_end(&mut path);

        let syncs = path.sync_points().to_vec_oldest_first();
        assert!(syncs.windows(2).all(|w| w[0] < w[1]));
        assert!(*syncs.last().unwrap() <= path.called().position());
        assert_eq!(*syncs.last().unwrap(), REFERENCE.len() as i64);
    }
}
