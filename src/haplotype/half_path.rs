use std::cmp::Ordering;

use crate::data_types::variants::{OrientedVariant, Variant, Variation};
use crate::haplotype::playback::{HaplotypePlayback, PlaybackError};
use crate::util::persistent_list::PersistentList;

/// One side (baseline or calls) of a path through the search.
/// Tracks the two haplotypes replayed so far plus the history of which variants were used.
#[derive(Clone, Debug)]
pub struct HalfPath<'a> {
    /// First haplotype
    haplotype_a: HaplotypePlayback<'a>,
    /// Second haplotype; None while it would be identical to `haplotype_a`
    haplotype_b: Option<HaplotypePlayback<'a>>,
    /// Variants replayed on this side, newest first
    included: PersistentList<OrientedVariant<'a>>,
    /// Variants rejected on this side, newest first
    excluded: PersistentList<&'a Variant>,
    /// Rightmost end of any variant touched so far
    variant_end_position: i64,
    /// Most recent variant touched, included or not
    last_variant: Option<&'a Variant>
}

impl<'a> HalfPath<'a> {
    /// Creates an empty half path over `reference`
    pub fn new(reference: &'a [u8]) -> Self {
        Self {
            haplotype_a: HaplotypePlayback::new(reference),
            haplotype_b: None,
            included: PersistentList::new(),
            excluded: PersistentList::new(),
            variant_end_position: -1,
            last_variant: None
        }
    }

    /// Replays `variant` on this side.
    /// A homozygous variant goes to both haplotypes, a heterozygous one splits its alleles between them.
    pub fn include(&mut self, variant: OrientedVariant<'a>) {
        self.touch(variant.variant());
        if variant.is_heterozygous() {
            let haplotype_b = self.haplotype_b.get_or_insert_with(|| self.haplotype_a.clone());
            haplotype_b.add_variant(variant.flipped());
        } else if let Some(haplotype_b) = self.haplotype_b.as_mut() {
            haplotype_b.add_variant(variant);
        }
        self.haplotype_a.add_variant(variant);
        self.included = self.included.push(variant);
    }

    /// Marks `variant` as not replayed on this side
    pub fn exclude(&mut self, variant: &'a Variant) {
        self.touch(variant);
        self.excluded = self.excluded.push(variant);
    }

    /// Moves past `variant` without recording it in either history
    pub fn skip(&mut self, variant: &'a Variant) {
        self.touch(variant);
    }

    fn touch(&mut self, variant: &'a Variant) {
        self.variant_end_position = self.variant_end_position.max(variant.end() as i64);
        self.last_variant = Some(variant);
    }

    /// True if both haplotypes could replay `variant` after what is already queued
    pub fn can_include(&self, variant: &Variant) -> bool {
        self.haplotype_a.accepts(variant) &&
            self.haplotype_b.as_ref().is_none_or(|h| h.accepts(variant))
    }

    /// True if `variant` lies beyond the last variant this side has already processed
    pub fn is_new(&self, variant: &Variant) -> bool {
        match self.last_variant {
            Some(last) => variant.start() > last.start() || variant.end() > last.end(),
            None => true
        }
    }

    fn ensure_haplotype_b(&mut self) -> &mut HaplotypePlayback<'a> {
        self.haplotype_b.get_or_insert_with(|| self.haplotype_a.clone())
    }

    /// Advances every unfinished haplotype by one base
    pub fn step(&mut self) -> Result<(), PlaybackError> {
        if self.haplotype_a.has_next() {
            self.haplotype_a.next()?;
        }
        if let Some(haplotype_b) = self.haplotype_b.as_mut() {
            if haplotype_b.has_next() {
                haplotype_b.next()?;
            }
        }
        Ok(())
    }

    /// Advances haplotype A only; B is split off first so it stays behind
    pub fn step_haplotype_a(&mut self) -> Result<(), PlaybackError> {
        self.ensure_haplotype_b();
        if self.haplotype_a.has_next() {
            self.haplotype_a.next()?;
        }
        Ok(())
    }

    /// Advances haplotype B only
    pub fn step_haplotype_b(&mut self) -> Result<(), PlaybackError> {
        let haplotype_b = self.ensure_haplotype_b();
        if haplotype_b.has_next() {
            haplotype_b.next()?;
        }
        Ok(())
    }

    /// Jumps both haplotypes forward, see `HaplotypePlayback::move_forward`
    pub fn move_forward(&mut self, position: i64) -> Result<(), PlaybackError> {
        self.haplotype_a.move_forward(position)?;
        if let Some(haplotype_b) = self.haplotype_b.as_mut() {
            haplotype_b.move_forward(position)?;
        }
        Ok(())
    }

    /// Sign of (A cursor - B cursor)
    pub fn compare_haplotype_positions(&self) -> Ordering {
        match self.haplotype_b.as_ref() {
            Some(haplotype_b) => self.haplotype_a.template_position().cmp(&haplotype_b.template_position()),
            None => Ordering::Equal
        }
    }

    /// True if both haplotypes sit on the template at `position` with nothing pending, past every touched variant
    pub fn is_settled_at(&self, position: i64) -> bool {
        self.haplotype_a.is_settled_at(position) &&
            self.haplotype_b.as_ref().is_none_or(|h| h.is_settled_at(position)) &&
            self.variant_end_position <= position
    }

    /// The furthest template position of either haplotype
    pub fn position(&self) -> i64 {
        let a = self.haplotype_a.template_position();
        self.haplotype_b.as_ref().map_or(a, |h| a.max(h.template_position()))
    }

    /// The rightmost position this side has committed to, counting touched variants
    pub fn frontier_position(&self) -> i64 {
        (self.position() + 1).max(self.variant_end_position)
    }

    pub fn finished_haplotype_a(&self) -> bool {
        self.haplotype_a.is_finished()
    }

    pub fn finished_haplotype_b(&self) -> bool {
        self.haplotype_b().is_finished()
    }

    pub fn finished(&self) -> bool {
        self.finished_haplotype_a() && self.finished_haplotype_b()
    }

    // getters
    pub fn haplotype_a(&self) -> &HaplotypePlayback<'a> {
        &self.haplotype_a
    }

    /// Haplotype B, which is haplotype A until the two diverge
    pub fn haplotype_b(&self) -> &HaplotypePlayback<'a> {
        self.haplotype_b.as_ref().unwrap_or(&self.haplotype_a)
    }

    pub fn included(&self) -> &PersistentList<OrientedVariant<'a>> {
        &self.included
    }

    pub fn excluded(&self) -> &PersistentList<&'a Variant> {
        &self.excluded
    }

    pub fn variant_end_position(&self) -> i64 {
        self.variant_end_position
    }

    pub fn last_variant(&self) -> Option<&'a Variant> {
        self.last_variant
    }
}

impl PartialEq for HalfPath<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HalfPath<'_> {}

impl PartialOrd for HalfPath<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HalfPath<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.haplotype_a.cmp(&other.haplotype_a)
            .then_with(|| self.haplotype_b().cmp(other.haplotype_b()))
            // only states that have considered the same candidates can merge
            .then_with(|| self.last_variant.cmp(&other.last_variant))
    }
}
