use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::data_types::variants::{OrientedVariant, Variation};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PlaybackError {
    #[error("cannot advance past the end of the reference (length {length})")]
    EndOfReference { length: usize },
    #[error("cannot move forward to {target} while inside the variant at {position}")]
    InsideVariant { position: i64, target: i64 }
}

/// Replays one haplotype (the reference with an ordered set of oriented variants applied) one base at a time.
/// Clones share the reference and duplicate only the cursor and the pending queue.
#[derive(Clone, Debug)]
pub struct HaplotypePlayback<'a> {
    /// The full reference sequence being mutated
    reference: &'a [u8],
    /// Current position on the reference, starts one before the first base
    template_position: i64,
    /// Offset into the allele of `current`; None while on the template
    variant_offset: Option<usize>,
    /// The next variant to replay, or the one being replayed
    current: Option<OrientedVariant<'a>>,
    /// Variants waiting behind `current`, in start order
    queue: VecDeque<OrientedVariant<'a>>
}

impl<'a> HaplotypePlayback<'a> {
    /// Creates a playback positioned just before the first reference base
    pub fn new(reference: &'a [u8]) -> Self {
        Self {
            reference,
            template_position: -1,
            variant_offset: None,
            current: None,
            queue: Default::default()
        }
    }

    /// Returns true if `variant` can be appended without overlapping anything already queued
    pub fn accepts(&self, variant: &impl Variation) -> bool {
        match self.queue.back().or(self.current.as_ref()) {
            Some(last) => variant.start() >= last.end(),
            None => variant.start() as i64 > self.template_position
        }
    }

    /// Queues a variant for replay; callers must check `accepts` first
    pub fn add_variant(&mut self, variant: OrientedVariant<'a>) {
        debug_assert!(self.accepts(&variant));
        if self.current.is_none() {
            self.current = Some(variant);
        } else {
            self.queue.push_back(variant);
        }
    }

    /// Advances one base, entering and leaving variants as needed
    /// # Errors
    /// * if the playback has already reached the end of the reference
    pub fn next(&mut self) -> Result<(), PlaybackError> {
        if self.is_finished() {
            return Err(PlaybackError::EndOfReference { length: self.reference.len() });
        }

        match self.variant_offset.as_mut() {
            Some(offset) => *offset += 1,
            None => self.template_position += 1
        };
        self.settle();
        Ok(())
    }

    /// Resolves variant boundaries at the current cursor.
    /// Entering a zero-length allele exits immediately, and back-to-back variants are entered in the same call.
    fn settle(&mut self) {
        loop {
            match (self.variant_offset, self.current) {
                (None, Some(current)) if current.start() as i64 == self.template_position => {
                    self.variant_offset = Some(0);
                },
                (Some(offset), Some(current)) if offset >= current.played_allele().len() => {
                    self.template_position = current.end() as i64;
                    self.variant_offset = None;
                    self.current = self.queue.pop_front();
                },
                _ => break
            }
        }
    }

    /// Jumps the template cursor forward to `position`, replaying any variants in between.
    /// # Arguments
    /// * `position` - the target template position; positions past the reference end are clamped
    /// # Errors
    /// * if currently inside a variant
    pub fn move_forward(&mut self, position: i64) -> Result<(), PlaybackError> {
        if self.variant_offset.is_some() {
            return Err(PlaybackError::InsideVariant { position: self.template_position, target: position });
        }

        let position = position.min(self.reference.len() as i64);
        match self.current {
            Some(current) if current.start() as i64 <= position => {
                while !self.is_on_template() || self.template_position < position {
                    self.next()?;
                }
            },
            _ => {
                self.template_position = self.template_position.max(position);
            }
        }
        Ok(())
    }

    /// The base at the cursor in upper case; 0 when the cursor is off the sequence
    pub fn nt(&self) -> u8 {
        let base = match (self.variant_offset, self.current) {
            (Some(offset), Some(current)) => current.played_allele().get(offset).copied(),
            _ => usize::try_from(self.template_position).ok()
                .and_then(|p| self.reference.get(p).copied())
        };
        base.map_or(0, |b| b.to_ascii_uppercase())
    }

    /// True if on the template at `position` with nothing left to replay
    pub fn is_settled_at(&self, position: i64) -> bool {
        self.is_on_template() && self.template_position == position && self.current.is_none()
    }

    pub fn is_finished(&self) -> bool {
        self.is_on_template() && self.template_position >= self.reference.len() as i64
    }

    pub fn has_next(&self) -> bool {
        !self.is_finished()
    }

    pub fn is_on_template(&self) -> bool {
        self.variant_offset.is_none()
    }

    pub fn has_pending(&self) -> bool {
        self.current.is_some()
    }

    // getters
    pub fn template_position(&self) -> i64 {
        self.template_position
    }

    pub fn reference(&self) -> &'a [u8] {
        self.reference
    }
}

impl PartialEq for HaplotypePlayback<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HaplotypePlayback<'_> {}

impl PartialOrd for HaplotypePlayback<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HaplotypePlayback<'_> {
    // no pending variant sorts first, then pending variant, offset, and the rest of the queue
    fn cmp(&self, other: &Self) -> Ordering {
        self.template_position.cmp(&other.template_position)
            .then_with(|| self.current.cmp(&other.current))
            .then_with(|| self.variant_offset.cmp(&other.variant_offset))
            .then_with(|| self.queue.iter().cmp(other.queue.iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_types::variants::Variant;

    /// Replays the full haplotype into a byte vector
    fn replay(playback: &mut HaplotypePlayback) -> Vec<u8> {
        let mut ret = vec![];
        while playback.has_next() {
            playback.next().unwrap();
            if playback.has_next() {
                ret.push(playback.nt());
            }
        }
        ret
    }

    #[test]
    fn test_reference_replay() {
        let reference = b"ACCGTTACCAGGACTTGACAAACCG";
        let mut playback = HaplotypePlayback::new(reference);
        assert_eq!(replay(&mut playback), reference.to_vec());
        assert!(playback.is_finished());
        assert_eq!(playback.next(), Err(PlaybackError::EndOfReference { length: reference.len() }));
    }

    #[test]
    fn test_lowercase_reference() {
        let mut playback = HaplotypePlayback::new(b"acgT");
        assert_eq!(replay(&mut playback), b"ACGT".to_vec());
    }

    #[test]
    fn test_variant_replay() {
        let reference = b"ACGTACGTAC";
        let snv = Variant::new(0, 1, 2, b"T".to_vec(), None, false, 0.0).unwrap();
        let deletion = Variant::new(1, 3, 5, vec![], None, false, 0.0).unwrap();
        let insertion = Variant::new(2, 5, 5, b"GG".to_vec(), None, false, 0.0).unwrap();
        let mnp = Variant::new(3, 8, 10, b"TT".to_vec(), None, false, 0.0).unwrap();

        let mut playback = HaplotypePlayback::new(reference);
        for v in [&snv, &deletion, &insertion, &mnp] {
            let ov = OrientedVariant::new(v, true);
            assert!(playback.accepts(&ov));
            playback.add_variant(ov);
        }
        // A T G [del TA] GG C G T TT
        assert_eq!(replay(&mut playback), b"ATGGGCGTTT".to_vec());
    }

    #[test]
    fn test_accepts() {
        let reference = b"ACGTACGTAC";
        let first = Variant::new(0, 2, 4, b"A".to_vec(), None, false, 0.0).unwrap();
        let overlapping = Variant::new(1, 3, 4, b"A".to_vec(), None, false, 0.0).unwrap();
        let adjacent = Variant::new(2, 4, 5, b"C".to_vec(), None, false, 0.0).unwrap();

        let mut playback = HaplotypePlayback::new(reference);
        playback.add_variant(OrientedVariant::new(&first, true));
        assert!(!playback.accepts(&overlapping));
        assert!(playback.accepts(&adjacent));

        // once we are past a base, nothing can start on or before it
        let mut empty = HaplotypePlayback::new(reference);
        empty.next().unwrap();
        empty.next().unwrap();
        assert_eq!(empty.template_position(), 1);
        assert!(!empty.accepts(&Variant::new(3, 1, 2, b"A".to_vec(), None, false, 0.0).unwrap()));
        assert!(empty.accepts(&first));
    }

    #[test]
    fn test_move_forward() {
        let reference = b"ACGTACGTAC";
        let snv = Variant::new(0, 6, 7, b"T".to_vec(), None, false, 0.0).unwrap();

        let mut playback = HaplotypePlayback::new(reference);
        playback.add_variant(OrientedVariant::new(&snv, true));

        // direct jump, nothing to replay before 4
        playback.move_forward(4).unwrap();
        assert_eq!(playback.template_position(), 4);
        assert_eq!(playback.nt(), b'A');

        // this one has to replay through the SNV
        playback.move_forward(8).unwrap();
        assert_eq!(playback.template_position(), 8);
        assert!(!playback.has_pending());
        assert!(playback.is_settled_at(8));

        // moving backwards is a no-op
        playback.move_forward(2).unwrap();
        assert_eq!(playback.template_position(), 8);
    }

    #[test]
    fn test_move_forward_inside_variant() {
        let reference = b"ACGTACGTAC";
        let insertion = Variant::new(0, 2, 2, b"TTT".to_vec(), None, false, 0.0).unwrap();
        let mut playback = HaplotypePlayback::new(reference);
        playback.add_variant(OrientedVariant::new(&insertion, true));
        playback.move_forward(1).unwrap();
        playback.next().unwrap();
        assert!(!playback.is_on_template());
        assert_eq!(playback.nt(), b'T');
        assert_eq!(playback.move_forward(5), Err(PlaybackError::InsideVariant { position: 2, target: 5 }));
    }

    #[test]
    fn test_ordering() {
        let reference = b"ACGTACGTAC";
        let het = Variant::new(0, 3, 4, b"A".to_vec(), Some(b"C".to_vec()), false, 0.0).unwrap();

        let plain = HaplotypePlayback::new(reference);
        let mut with_a = plain.clone();
        with_a.add_variant(OrientedVariant::new(&het, true));
        let mut with_b = plain.clone();
        with_b.add_variant(OrientedVariant::new(&het, false));

        // no pending sorts first, then oriented A before B
        assert!(plain < with_a);
        assert!(with_a < with_b);

        // once past the variant, the states collapse
        with_a.move_forward(5).unwrap();
        with_b.move_forward(5).unwrap();
        assert_eq!(with_a, with_b);
    }
}
