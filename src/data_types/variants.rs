use std::cmp::Ordering;

use crate::data_types::roc_container::RocFilter;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum VariantError {
    #[error("variant start ({start}) must be <= end ({end})")]
    StartAfterEnd { start: u64, end: u64 },
    #[error("variant at {start} does not change the reference")]
    NoChange { start: u64 },
    #[error("allele length {length} exceeds the maximum of {maximum}")]
    AlleleTooLong { length: usize, maximum: usize },
    #[error("variant end ({end}) is past the sequence length ({length})")]
    PastSequenceEnd { end: u64, length: usize }
}

/// Uniform view over anything that behaves like a variant on the template.
/// Raw loaded variants report their alleles in genotype order, oriented wrappers report the allele each haplotype plays.
pub trait Variation {
    /// 0-based start on the reference sequence
    fn start(&self) -> u64;
    /// 0-based exclusive end on the reference sequence
    fn end(&self) -> u64;
    /// The allele replayed on haplotype A
    fn allele_a(&self) -> &[u8];
    /// The allele replayed on haplotype B, None if it matches A
    fn allele_b(&self) -> Option<&[u8]>;
    /// True if the source genotype carried phase information
    fn is_phased(&self) -> bool;

    /// Length of the reference span this replaces
    fn ref_len(&self) -> u64 {
        self.end() - self.start()
    }

    /// True if the two haplotypes get different alleles
    fn is_heterozygous(&self) -> bool {
        self.allele_b().is_some()
    }
}

/// A normalized diploid call against one reference sequence.
/// Both alleles are expressed over the same `[start, end)` reference span after trimming shared bases.
#[derive(Clone, Debug)]
pub struct Variant {
    /// Ordinal of the source record within its sequence, used to find it again in the input file
    source_index: usize,
    /// 0-based start
    start: u64,
    /// 0-based exclusive end
    end: u64,
    /// First genotype allele
    allele_a: Vec<u8>,
    /// Second genotype allele; None if homozygous
    allele_b: Option<Vec<u8>>,
    /// Phase flag from the GT separator
    is_phased: bool,
    /// ROC sort value, NaN when the record did not carry one
    score: f64
}

impl Variant {
    /// Constructor, collapsing identical alleles into a homozygous call
    /// # Arguments
    /// * `source_index` - ordinal of the originating record in its sequence
    /// * `start` - 0-based start of the replaced reference span
    /// * `end` - 0-based exclusive end of the replaced reference span
    /// * `allele_a` - the first genotype allele
    /// * `allele_b` - the second genotype allele, if it differs
    /// * `is_phased` - whether the genotype was phased
    /// * `score` - the ROC score
    /// # Errors
    /// * if `start > end`
    pub fn new(
        source_index: usize, start: u64, end: u64,
        allele_a: Vec<u8>, allele_b: Option<Vec<u8>>,
        is_phased: bool, score: f64
    ) -> Result<Self, VariantError> {
        if start > end {
            return Err(VariantError::StartAfterEnd { start, end });
        }
        let allele_b = allele_b.filter(|b| *b != allele_a);
        Ok(Self {
            source_index,
            start, end,
            allele_a, allele_b,
            is_phased,
            score
        })
    }

    /// Checks that this call is not a reference no-op and that alleles are within bounds.
    /// # Arguments
    /// * `reference` - the full sequence the variant is placed on
    /// * `max_length` - the longest allowed allele, including the REF span
    pub fn validate(&self, reference: &[u8], max_length: usize) -> Result<(), VariantError> {
        if self.end as usize > reference.len() {
            return Err(VariantError::PastSequenceEnd { end: self.end, length: reference.len() });
        }

        let longest = [self.ref_len() as usize, self.allele_a.len(), self.allele_b.as_ref().map_or(0, |b| b.len())]
            .into_iter().max().unwrap_or(0);
        if longest > max_length {
            return Err(VariantError::AlleleTooLong { length: longest, maximum: max_length });
        }

        let ref_span = &reference[self.start as usize..self.end as usize];
        let changes_ref = |allele: &[u8]| !allele.eq_ignore_ascii_case(ref_span);
        let any_change = changes_ref(self.allele_a.as_slice()) || self.allele_b.as_deref().is_some_and(changes_ref);
        if !any_change {
            return Err(VariantError::NoChange { start: self.start });
        }
        Ok(())
    }

    /// The ROC categories this call contributes to
    pub fn roc_filters(&self) -> [RocFilter; 2] {
        if self.is_heterozygous() {
            [RocFilter::All, RocFilter::Heterozygous]
        } else {
            [RocFilter::All, RocFilter::Homozygous]
        }
    }

    /// True for an insertion with no reference span
    pub fn is_pure_insertion(&self) -> bool {
        self.start == self.end
    }

    // getters
    pub fn source_index(&self) -> usize {
        self.source_index
    }

    pub fn score(&self) -> f64 {
        self.score
    }
}

impl Variation for Variant {
    fn start(&self) -> u64 {
        self.start
    }

    fn end(&self) -> u64 {
        self.end
    }

    fn allele_a(&self) -> &[u8] {
        &self.allele_a
    }

    fn allele_b(&self) -> Option<&[u8]> {
        self.allele_b.as_deref()
    }

    fn is_phased(&self) -> bool {
        self.is_phased
    }
}

// Variants are unique within one side by their source record
impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Variant {}

impl PartialOrd for Variant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Variant {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start.cmp(&other.start)
            .then(self.end.cmp(&other.end))
            .then(self.source_index.cmp(&other.source_index))
    }
}

/// A variant bound to the allele that haplotype A replays.
/// The weight is fractional true-positive credit, only meaningful once the search is done.
#[derive(Clone, Copy, Debug)]
pub struct OrientedVariant<'a> {
    variant: &'a Variant,
    is_allele_a: bool,
    weight: f64
}

impl<'a> OrientedVariant<'a> {
    /// Constructor
    /// # Arguments
    /// * `variant` - the underlying call
    /// * `is_allele_a` - if true, haplotype A replays the first genotype allele
    pub fn new(variant: &'a Variant, is_allele_a: bool) -> Self {
        Self {
            variant,
            is_allele_a,
            weight: 0.0
        }
    }

    /// The same call, replaying the other allele on haplotype A
    pub fn flipped(&self) -> Self {
        Self {
            variant: self.variant,
            is_allele_a: !self.is_allele_a,
            weight: self.weight
        }
    }

    /// The allele sequence this orientation replays
    pub fn played_allele(&self) -> &'a [u8] {
        if self.is_allele_a {
            &self.variant.allele_a
        } else {
            self.variant.allele_b.as_deref().unwrap_or(&self.variant.allele_a)
        }
    }

    pub fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }

    // getters
    pub fn variant(&self) -> &'a Variant {
        self.variant
    }

    pub fn is_allele_a(&self) -> bool {
        self.is_allele_a
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }
}

impl Variation for OrientedVariant<'_> {
    fn start(&self) -> u64 {
        self.variant.start
    }

    fn end(&self) -> u64 {
        self.variant.end
    }

    fn allele_a(&self) -> &[u8] {
        self.played_allele()
    }

    fn allele_b(&self) -> Option<&[u8]> {
        self.variant.allele_b.as_ref()?;
        Some(self.flipped().played_allele())
    }

    fn is_phased(&self) -> bool {
        self.variant.is_phased
    }
}

// weight does not take part in identity
impl PartialEq for OrientedVariant<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrientedVariant<'_> {}

impl PartialOrd for OrientedVariant<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrientedVariant<'_> {
    // oriented-as-A sorts before oriented-as-B over the same call
    fn cmp(&self, other: &Self) -> Ordering {
        self.variant.cmp(other.variant)
            .then(other.is_allele_a.cmp(&self.is_allele_a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_homozygous_collapse() {
        let variant = Variant::new(0, 4, 5, b"G".to_vec(), Some(b"G".to_vec()), false, 1.0).unwrap();
        assert!(!variant.is_heterozygous());
        assert_eq!(variant.allele_b(), None);
        assert_eq!(variant.ref_len(), 1);
        assert_eq!(variant.roc_filters(), [RocFilter::All, RocFilter::Homozygous]);
    }

    #[test]
    fn test_bad_span() {
        assert_eq!(
            Variant::new(0, 5, 4, b"G".to_vec(), None, false, 1.0).unwrap_err(),
            VariantError::StartAfterEnd { start: 5, end: 4 }
        );
    }

    #[test]
    fn test_validate() {
        let reference = b"ACGTACGT";
        let snv = Variant::new(0, 2, 3, b"T".to_vec(), None, false, f64::NAN).unwrap();
        assert!(snv.validate(reference, 10).is_ok());

        let no_change = Variant::new(1, 2, 3, b"g".to_vec(), Some(b"G".to_vec()), false, f64::NAN).unwrap();
        assert_eq!(no_change.validate(reference, 10), Err(VariantError::NoChange { start: 2 }));

        let long_insertion = Variant::new(2, 2, 2, b"AAAAAA".to_vec(), Some(vec![]), false, f64::NAN).unwrap();
        assert!(long_insertion.is_pure_insertion());
        assert_eq!(long_insertion.validate(reference, 5), Err(VariantError::AlleleTooLong { length: 6, maximum: 5 }));

        let past_end = Variant::new(3, 7, 9, b"A".to_vec(), None, false, f64::NAN).unwrap();
        assert_eq!(past_end.validate(reference, 10), Err(VariantError::PastSequenceEnd { end: 9, length: 8 }));
    }

    #[test]
    fn test_oriented_alleles() {
        let het = Variant::new(0, 1, 2, b"A".to_vec(), Some(b"T".to_vec()), true, 30.0).unwrap();
        let a = OrientedVariant::new(&het, true);
        let b = OrientedVariant::new(&het, false);
        assert_eq!(a.played_allele(), b"A");
        assert_eq!(b.played_allele(), b"T");
        assert_eq!(a.allele_b(), Some(&b"T"[..]));
        assert_eq!(b.allele_b(), Some(&b"A"[..]));
        assert_eq!(a.flipped(), b);
        assert!(a < b);

        let hom = Variant::new(1, 1, 2, b"C".to_vec(), None, false, 30.0).unwrap();
        let h = OrientedVariant::new(&hom, false);
        assert_eq!(h.played_allele(), b"C");
        assert_eq!(h.allele_b(), None);
    }

    #[test]
    fn test_variant_order() {
        let v1 = Variant::new(3, 1, 2, b"C".to_vec(), None, false, 0.0).unwrap();
        let v2 = Variant::new(0, 1, 3, b"C".to_vec(), None, false, 0.0).unwrap();
        let v3 = Variant::new(1, 2, 2, b"C".to_vec(), None, false, 0.0).unwrap();
        let mut sorted = vec![&v3, &v2, &v1];
        sorted.sort();
        assert_eq!(sorted.iter().map(|v| v.source_index()).collect::<Vec<usize>>(), vec![3, 0, 1]);
    }
}
