/*!
# Path Finder
Contains the best-first search that reconciles the called and baseline variants for one reference sequence.
Every candidate variant is branched on (excluded, included as A, included as B when heterozygous), and branches are
only kept while the replayed called and baseline haplotypes produce identical bases.
Equivalent search states are merged, keeping the one with the most true positives.

## Example usage
```rust
use varsync::data_types::variants::Variant;
use varsync::path_finder::PathFinder;

// 0-based SNV at position 5, T>C, present in both inputs
let reference = b"ACCGTTACCAGGACTTGACAAACCG";
let called = vec![Variant::new(0, 5, 6, b"C".to_vec(), None, false, 30.0).unwrap()];
let baseline = called.clone();

let path_finder = PathFinder::new("chr1", reference, &called, &baseline, 1000);
let result = path_finder.find_best_path().unwrap();
assert_eq!(result.best.called().included().len(), 1);
assert_eq!(result.best.baseline().included().len(), 1);
assert!(result.skipped_regions.is_empty());
```
*/

use anyhow::anyhow;
use log::{debug, trace, warn};
use std::collections::BTreeSet;

use crate::data_types::variants::{Variant, Variation};
use crate::haplotype::half_path::HalfPath;
use crate::haplotype::path::{Path, Side};

/// A region the search gave up on because too many branches were alive at once
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SkippedRegion {
    /// Template position the search rolled back to
    pub start: i64,
    /// Template position the search restarted from
    pub end: i64,
    /// Number of called variants dropped
    pub called: usize,
    /// Number of baseline variants dropped
    pub baseline: usize
}

/// The output of a single sequence search
#[derive(Debug)]
pub struct SearchResult<'a> {
    /// The best complete path
    pub best: Path<'a>,
    /// Any regions that were abandoned along the way
    pub skipped_regions: Vec<SkippedRegion>
}

/// Runs the reconciliation search for one reference sequence
pub struct PathFinder<'a> {
    /// Name used for reporting
    sequence_name: &'a str,
    /// The full reference sequence
    reference: &'a [u8],
    /// Called variants, sorted and non-overlapping
    called_variants: &'a [Variant],
    /// Baseline variants, sorted and non-overlapping
    baseline_variants: &'a [Variant],
    /// Frontier size that triggers a rollback
    max_complexity: usize
}

impl<'a> PathFinder<'a> {
    /// Constructor
    /// # Arguments
    /// * `sequence_name` - the sequence name, only used for logging
    /// * `reference` - the reference sequence the variants are placed on
    /// * `called_variants` - the calls under evaluation, sorted
    /// * `baseline_variants` - the truth set, sorted
    /// * `max_complexity` - the most live paths allowed before a region is skipped
    pub fn new(
        sequence_name: &'a str, reference: &'a [u8],
        called_variants: &'a [Variant], baseline_variants: &'a [Variant],
        max_complexity: usize
    ) -> Self {
        Self {
            sequence_name, reference,
            called_variants, baseline_variants,
            max_complexity
        }
    }

    /// Searches for the path that explains the most variants on both sides.
    /// # Errors
    /// * if a playback is driven into an invalid state
    /// * if no complete path is found, which means the inputs were not sorted or validated
    pub fn find_best_path(&self) -> anyhow::Result<SearchResult<'a>> {
        let mut frontier: BTreeSet<Path<'a>> = Default::default();
        frontier.insert(Path::new(self.reference));

        let mut best: Option<Path<'a>> = None;
        let mut checkpoint: Option<Path<'a>> = None;
        let mut skipped_regions = vec![];

        while let Some(mut head) = frontier.pop_first() {
            if frontier.is_empty() && head.in_sync() {
                // nothing else alive, so nothing before here can change anymore
                checkpoint = Some(head.clone());
            }

            if head.finished() {
                head.close();
                best = Some(match best.take() {
                    Some(previous) => previous.better(head),
                    None => head
                });
                continue;
            }

            if frontier.len() > self.max_complexity {
                let region_end = frontier.iter()
                    .map(|p| p.frontier_position())
                    .fold(head.frontier_position(), i64::max);
                frontier.clear();

                let (restart, region) = self.skip_region(checkpoint.take(), region_end)?;
                warn!("{}: skipping region {}-{} with {} called and {} baseline variants, more than {} paths",
                    self.sequence_name, region.start, region.end, region.called, region.baseline, self.max_complexity);
                skipped_regions.push(region);
                frontier.insert(restart);
                continue;
            }

            if let Some(variant) = self.next_candidate(&head, Side::Called) {
                trace!("{}: branching on called variant at {}", self.sequence_name, variant.start());
                for child in head.add_variant(Side::Called, variant) {
                    insert_or_merge(&mut frontier, child);
                }
                continue;
            }

            if let Some(variant) = self.next_candidate(&head, Side::Baseline) {
                trace!("{}: branching on baseline variant at {}", self.sequence_name, variant.start());
                for child in head.add_variant(Side::Baseline, variant) {
                    insert_or_merge(&mut frontier, child);
                }
                continue;
            }

            head.step()?;
            if head.in_sync() {
                self.skip_to_next_variant(&mut head)?;
            }
            if head.matches() {
                insert_or_merge(&mut frontier, head);
            }
        }

        let best = best.ok_or_else(|| anyhow!("no complete path found for {}", self.sequence_name))?;
        debug!("{}: best path has {} called and {} baseline variants included",
            self.sequence_name, best.called().included().len(), best.baseline().included().len());
        Ok(SearchResult {
            best,
            skipped_regions
        })
    }

    fn variants(&self, side: Side) -> &'a [Variant] {
        match side {
            Side::Called => self.called_variants,
            Side::Baseline => self.baseline_variants
        }
    }

    /// The first variant on `side` that this half path has not considered yet
    fn next_unprocessed(&self, half: &HalfPath<'a>, side: Side) -> Option<&'a Variant> {
        let variants = self.variants(side);
        let first = match half.last_variant() {
            Some(last) => variants.partition_point(|v| v.start() < last.start()),
            None => 0
        };
        variants[first..].iter().find(|v| half.is_new(v))
    }

    /// The next unprocessed variant on `side`, if the search has reached it
    fn next_candidate(&self, path: &Path<'a>, side: Side) -> Option<&'a Variant> {
        let half = path.half(side);
        self.next_unprocessed(half, side)
            .filter(|v| v.start() as i64 <= half.frontier_position())
    }

    /// Jumps an in-sync path to just before the next unprocessed variant on either side, or to the last base
    fn skip_to_next_variant(&self, path: &mut Path<'a>) -> anyhow::Result<()> {
        let next_start = [Side::Called, Side::Baseline].into_iter()
            .filter_map(|side| self.next_unprocessed(path.half(side), side))
            .map(|v| v.start() as i64)
            .min();
        let target = match next_start {
            Some(start) => start - 1,
            None => self.reference.len() as i64 - 1
        };
        if target > path.called().position() {
            path.move_forward(target)?;
        }
        Ok(())
    }

    /// Rolls back to `checkpoint` and drops every variant that starts inside the region.
    /// The region end grows with the ends of the dropped variants until nothing else starts inside it.
    /// # Arguments
    /// * `checkpoint` - the last unique in-sync path, or None to restart from the beginning
    /// * `region_end` - the furthest position the abandoned frontier reached
    fn skip_region(&self, checkpoint: Option<Path<'a>>, region_end: i64) -> anyhow::Result<(Path<'a>, SkippedRegion)> {
        let mut path = checkpoint.unwrap_or_else(|| Path::new(self.reference));
        let mut region = SkippedRegion {
            start: path.called().position(),
            end: region_end,
            called: 0,
            baseline: 0
        };

        let mut progressed = true;
        while progressed {
            progressed = false;
            for side in [Side::Called, Side::Baseline] {
                while let Some(variant) = self.next_unprocessed(path.half(side), side) {
                    if variant.start() as i64 > region.end {
                        break;
                    }
                    path.skip_variant(side, variant);
                    region.end = region.end.max(variant.end() as i64);
                    match side {
                        Side::Called => region.called += 1,
                        Side::Baseline => region.baseline += 1
                    };
                    progressed = true;
                }
            }
        }

        region.end = region.end.min(self.reference.len() as i64);
        path.move_forward(region.end)?;
        Ok((path, region))
    }
}

/// Adds `path` to the frontier, keeping the better of it and any equivalent state already present
fn insert_or_merge<'a>(frontier: &mut BTreeSet<Path<'a>>, path: Path<'a>) {
    let path = match frontier.take(&path) {
        Some(existing) => existing.better(path),
        None => path
    };
    frontier.insert(path);
}
