use anyhow::{anyhow, Context};
use coitrees::{COITree, Interval, IntervalTree};
use log::info;
use std::collections::BTreeMap;
use std::path::Path;

use crate::parsing::noodles_helper::LoadedBed;

/// The regions a run is restricted to, loaded from a BED file
#[derive(Clone)]
pub struct EvaluationRegions {
    /// Lookup from a sequence name to a COITree, which has 0-based inclusive ranges
    lookup_trees: BTreeMap<String, COITree<(), usize>>
}

impl std::fmt::Debug for EvaluationRegions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // COITree does not have Debug, so lets just convert it to a length for simplicity
        let lookup_counts: BTreeMap<String, usize> = self.lookup_trees.iter()
            .map(|(s, c)| {
                (s.clone(), c.len())
            })
            .collect();
        f.debug_struct("EvaluationRegions").field("lookup_trees_len", &lookup_counts).finish()
    }
}

impl EvaluationRegions {
    /// Loads a BED file and converts all the entries to the COI trees for lookup
    /// # Arguments
    /// * `bed_fn` - path to the .bed(.gz) file to open
    pub fn from_bed(bed_fn: &Path) -> anyhow::Result<Self> {
        let loaded_bed = LoadedBed::preload_bed_file(bed_fn)
            .with_context(|| format!("Error while loading {bed_fn:?}:"))?;

        let mut lookup_trees: BTreeMap<String, COITree<(), usize>> = Default::default();
        let mut total_intervals = 0;
        for (chrom, intervals) in loaded_bed.chrom_lookup().iter() {
            let coi_intervals: Vec<Interval<()>> = intervals.iter()
                .map(|i| {
                    // the positions are 1-based inclusive, convert to 0-based inclusive
                    let start = i.start().ok_or(anyhow!("Missing start"))?.get() as i32 - 1;
                    let end = i.end().ok_or(anyhow!("Missing end"))?.get() as i32 - 1;
                    Ok(Interval::new(start, end, ()))
                })
                .collect::<anyhow::Result<_>>()?;
            total_intervals += coi_intervals.len();

            let coi_tree = COITree::new(&coi_intervals);
            lookup_trees.insert(chrom.clone(), coi_tree);
        }
        info!("Loaded {total_intervals} evaluation regions on {} sequences.", lookup_trees.len());

        Ok(Self {
            lookup_trees
        })
    }

    /// Returns true if a single region fully contains the variant span.
    /// Pure insertions count as inside if the base before them is.
    /// # Arguments
    /// * `chrom` - the sequence name
    /// * `start` - 0-based start of the variant
    /// * `end` - 0-based exclusive end of the variant
    pub fn contains(&self, chrom: &str, start: u64, end: u64) -> bool {
        let Some(coi_tree) = self.lookup_trees.get(chrom) else {
            return false;
        };

        let (first, last) = if end > start {
            (start as i32, end as i32 - 1)
        } else {
            // an insertion is placed after the base before it
            (start as i32 - 1, start as i32 - 1)
        };

        let mut included = false;
        coi_tree.query(first, last, |i| {
            if i.first <= first && i.last >= last {
                included = true;
            }
        });
        included
    }

    /// Returns true if any region is defined on the sequence
    pub fn has_sequence(&self, chrom: &str) -> bool {
        self.lookup_trees.contains_key(chrom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_contains() {
        // regions are chr1:10-20 and chr1:30-40 in BED coordinates
        let regions = EvaluationRegions::from_bed(&PathBuf::from("test_data/evaluation_regions/regions.bed")).unwrap();
        assert!(regions.has_sequence("chr1"));
        assert!(!regions.has_sequence("chr2"));

        // SNVs
        assert!(!regions.contains("chr1", 9, 10));
        assert!(regions.contains("chr1", 10, 11));
        assert!(regions.contains("chr1", 19, 20));
        assert!(!regions.contains("chr1", 20, 21));

        // spanning variants
        assert!(regions.contains("chr1", 10, 20));
        assert!(!regions.contains("chr1", 15, 25));
        assert!(!regions.contains("chr1", 18, 32));

        // insertions before and after bases
        assert!(regions.contains("chr1", 15, 15));
        assert!(regions.contains("chr1", 20, 20));
        assert!(!regions.contains("chr1", 10, 10));

        assert!(!regions.contains("chr2", 15, 16));
    }
}
