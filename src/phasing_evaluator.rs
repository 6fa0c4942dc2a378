/*!
# Phasing Evaluator
Counts how often the phase of heterozygous calls agrees with the baseline along a finished path.
Orientation is only compared relative to the previous phased call, so a consistent swap of both haplotypes is not penalized.
*/

use itertools::Itertools;
use std::iter::Peekable;

use crate::data_types::summary_metrics::PhasingCounts;
use crate::data_types::variants::{OrientedVariant, Variant, Variation};
use crate::haplotype::half_path::HalfPath;
use crate::haplotype::path::Path;

/// One decision made on a half path
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CallEvent<'a> {
    Included(OrientedVariant<'a>),
    Excluded(&'a Variant)
}

impl<'a> CallEvent<'a> {
    pub fn variant(&self) -> &'a Variant {
        match self {
            CallEvent::Included(ov) => ov.variant(),
            CallEvent::Excluded(v) => v
        }
    }

    /// True if the underlying call is heterozygous and phased
    fn is_phased_heterozygous(&self) -> bool {
        let variant = self.variant();
        variant.is_phased() && variant.is_heterozygous()
    }
}

/// Walks the included and excluded variants of a half path together in position order
pub struct CallIterator<'a> {
    events: std::vec::IntoIter<CallEvent<'a>>
}

impl<'a> CallIterator<'a> {
    pub fn new(half_path: &HalfPath<'a>) -> Self {
        let included = half_path.included().to_vec_oldest_first();
        let excluded = half_path.excluded().to_vec_oldest_first();
        let events: Vec<CallEvent<'a>> = included.into_iter().map(CallEvent::Included)
            .merge_by(excluded.into_iter().map(CallEvent::Excluded), |a, b| a.variant() <= b.variant())
            .collect();
        Self {
            events: events.into_iter()
        }
    }
}

impl<'a> Iterator for CallIterator<'a> {
    type Item = CallEvent<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.events.next()
    }
}

/// Pulls every event that starts at or before `sync_point`
fn take_segment<'a>(events: &mut Peekable<CallIterator<'a>>, sync_point: i64) -> Vec<CallEvent<'a>> {
    let mut segment = vec![];
    while let Some(event) = events.next_if(|e| e.variant().start() as i64 <= sync_point) {
        segment.push(event);
    }
    segment
}

/// Counts correct, misphased and unphaseable calls on the best path.
/// # Arguments
/// * `path` - a finished and closed path
pub fn count_phasings(path: &Path) -> PhasingCounts {
    let mut counts = PhasingCounts::default();
    let mut baseline_events = CallIterator::new(path.baseline()).peekable();
    let mut called_events = CallIterator::new(path.called()).peekable();

    let mut sync_points = path.sync_points().to_vec_oldest_first();
    sync_points.push(i64::MAX);

    // orientation of the last phased baseline segment and of the last phased call
    let mut baseline_phase: Option<bool> = None;
    let mut called_phase: Option<bool> = None;

    for sync_point in sync_points.into_iter() {
        let baseline_segment = take_segment(&mut baseline_events, sync_point);
        let called_segment = take_segment(&mut called_events, sync_point);

        let mut segment_phase = None;
        let mut consistent = true;
        for event in baseline_segment.iter() {
            if let CallEvent::Included(ov) = event {
                if ov.is_phased() && ov.is_heterozygous() {
                    match segment_phase {
                        None => segment_phase = Some(ov.is_allele_a()),
                        Some(phase) if phase != ov.is_allele_a() => consistent = false,
                        _ => {}
                    };
                }
            }
        }

        if !consistent {
            counts.unphaseable += called_segment.iter().filter(|e| e.is_phased_heterozygous()).count() as u64;
            baseline_phase = None;
            called_phase = None;
            continue;
        }

        let Some(segment_phase) = segment_phase else {
            // nothing to compare against
            continue;
        };
        let mut baseline_transition = baseline_phase.is_some_and(|phase| phase != segment_phase);
        baseline_phase = Some(segment_phase);

        for event in called_segment.iter() {
            if let CallEvent::Included(ov) = event {
                if ov.is_phased() && ov.is_heterozygous() {
                    let called_transition = called_phase.is_some_and(|phase| phase != ov.is_allele_a());
                    if called_transition == baseline_transition {
                        counts.correct += 1;
                    } else {
                        counts.misphasings += 1;
                    }
                    called_phase = Some(ov.is_allele_a());
                    baseline_transition = false;
                }
            }
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haplotype::path::Side;

    const REFERENCE: &[u8] = b"ACCGTTACCAGGACTTGACAAACCGTTAGCAAGT";

    fn phased(index: usize, position: u64, allele_a: &[u8], allele_b: &[u8]) -> Variant {
        Variant::new(index, position, position + 1, allele_a.to_vec(), Some(allele_b.to_vec()), true, 10.0).unwrap()
    }

    /// Replays a fixed set of decisions; `choice` indexes the children of `Path::add_variant`
    fn build_path<'a>(choices: &[(Side, &'a Variant, usize)]) -> Path<'a> {
        let mut path = Path::new(REFERENCE);
        for &(side, variant, choice) in choices {
            while path.called().position() < variant.start() as i64 - 1 {
                path.step().unwrap();
                assert!(path.matches());
            }
            path = path.add_variant(side, variant).into_iter().nth(choice).unwrap();
        }
        while !path.finished() {
            path.step().unwrap();
            assert!(path.matches());
        }
        path.close();
        path
    }

    #[test]
    fn test_call_iterator_order() {
        let first = phased(0, 5, b"C", b"T");
        let middle = phased(1, 9, b"T", b"A");
        let last = phased(2, 20, b"G", b"A");
        let mut half = HalfPath::new(REFERENCE);
        half.include(OrientedVariant::new(&first, true));
        half.exclude(&middle);
        half.include(OrientedVariant::new(&last, false));
        let order: Vec<(u64, bool)> = CallIterator::new(&half)
            .map(|e| (e.variant().start(), matches!(e, CallEvent::Included(_))))
            .collect();
        assert_eq!(order, vec![(5, true), (9, false), (20, true)]);
    }

    #[test]
    fn test_correct_phasing() {
        let called_1 = phased(0, 5, b"C", b"T");
        let called_2 = phased(1, 20, b"G", b"A");
        let baseline_1 = called_1.clone();
        let baseline_2 = called_2.clone();

        // same orientation in both segments
        let path = build_path(&[
            (Side::Called, &called_1, 1), (Side::Baseline, &baseline_1, 1),
            (Side::Called, &called_2, 1), (Side::Baseline, &baseline_2, 1)
        ]);
        assert_eq!(count_phasings(&path), PhasingCounts { correct: 2, misphasings: 0, unphaseable: 0 });

        // both sides switch orientation together
        let path = build_path(&[
            (Side::Called, &called_1, 1), (Side::Baseline, &baseline_1, 1),
            (Side::Called, &called_2, 2), (Side::Baseline, &baseline_2, 2)
        ]);
        assert_eq!(count_phasings(&path), PhasingCounts { correct: 2, misphasings: 0, unphaseable: 0 });
    }

    #[test]
    fn test_misphasing() {
        let called_1 = phased(0, 5, b"C", b"T");
        let called_2 = phased(1, 20, b"A", b"G");
        let baseline_1 = phased(0, 5, b"C", b"T");
        let baseline_2 = phased(1, 20, b"G", b"A");

        // the second call keeps its orientation while the baseline switches
        let path = build_path(&[
            (Side::Called, &called_1, 1), (Side::Baseline, &baseline_1, 1),
            (Side::Called, &called_2, 1), (Side::Baseline, &baseline_2, 2)
        ]);
        assert_eq!(count_phasings(&path), PhasingCounts { correct: 1, misphasings: 1, unphaseable: 0 });
    }

    #[test]
    fn test_unphaseable() {
        let called_1 = phased(0, 5, b"C", b"T");
        let called_2 = phased(1, 6, b"T", b"A");
        let baseline_1 = phased(0, 5, b"C", b"T");
        let baseline_2 = phased(1, 6, b"A", b"T");

        // the baseline needs both orientations inside a single segment
        let path = build_path(&[
            (Side::Called, &called_1, 1), (Side::Baseline, &baseline_1, 1),
            (Side::Called, &called_2, 1), (Side::Baseline, &baseline_2, 2)
        ]);
        assert_eq!(count_phasings(&path), PhasingCounts { correct: 0, misphasings: 0, unphaseable: 2 });
    }

    #[test]
    fn test_unphased_calls_ignored() {
        let called = Variant::new(0, 5, 6, b"C".to_vec(), Some(b"T".to_vec()), false, 10.0).unwrap();
        let baseline = phased(0, 5, b"C", b"T");
        let path = build_path(&[(Side::Called, &called, 1), (Side::Baseline, &baseline, 1)]);
        assert_eq!(count_phasings(&path), PhasingCounts::default());
    }
}
