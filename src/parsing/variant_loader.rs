/*!
# Variant loader
Reads the baseline and called VCFs one reference sequence at a time and converts the selected sample's genotype into normalized [`Variant`]s.
Records that cannot take part in the evaluation are dropped here and tallied in [`WarningCounts`], they never stop a run.
*/

use anyhow::{anyhow, Context};
use derive_builder::Builder;
use log::{debug, info};
use noodles::vcf;
use noodles::vcf::variant::record::samples::keys::key as vcf_key;
use rust_lib_reference_genome::reference_genome::ReferenceGenome;
use std::collections::VecDeque;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::data_types::summary_metrics::WarningCounts;
use crate::data_types::variant_set::VariantSet;
use crate::data_types::variants::{Variant, VariantError, Variation};
use crate::eval_synchronizer::VariantSetSource;
use crate::parsing::evaluation_regions::EvaluationRegions;
use crate::parsing::noodles_helper::IndexedVcf;

/// Where the ROC score of a record comes from
#[derive(Clone, Debug, PartialEq)]
pub enum RocScoreField {
    /// The QUAL column
    Qual,
    /// A numeric INFO field
    Info(String),
    /// A numeric FORMAT field of the selected sample
    Format(String)
}

impl Default for RocScoreField {
    fn default() -> Self {
        RocScoreField::Format(vcf_key::CONDITIONAL_GENOTYPE_QUALITY.to_string())
    }
}

impl FromStr for RocScoreField {
    type Err = anyhow::Error;

    /// Accepts `QUAL`, `INFO.<key>`, `FORMAT.<key>`, or a bare FORMAT key
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = if s.eq_ignore_ascii_case("QUAL") {
            RocScoreField::Qual
        } else if let Some(key) = s.strip_prefix("INFO.") {
            RocScoreField::Info(key.to_string())
        } else if let Some(key) = s.strip_prefix("FORMAT.") {
            RocScoreField::Format(key.to_string())
        } else {
            RocScoreField::Format(s.to_string())
        };

        match &field {
            RocScoreField::Info(key) | RocScoreField::Format(key) if key.is_empty() => {
                Err(anyhow!("ROC score field {s:?} is missing a key"))
            },
            _ => Ok(field)
        }
    }
}

impl std::fmt::Display for RocScoreField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RocScoreField::Qual => write!(f, "QUAL"),
            RocScoreField::Info(key) => write!(f, "INFO.{key}"),
            RocScoreField::Format(key) => write!(f, "FORMAT.{key}")
        }
    }
}

/// Controls which records become variants
#[derive(Builder, Clone, Debug)]
#[builder(default)]
pub struct LoaderConfig {
    /// Longest allowed allele, including the REF span
    max_length: usize,
    /// If true, records are kept regardless of FILTER
    all_records: bool,
    /// Source of the ROC score
    score_field: RocScoreField
}

impl Default for LoaderConfig {
    fn default() -> Self {
        // main.rs overwrites these from the CLI
        Self {
            max_length: 1000,
            all_records: false,
            score_field: Default::default()
        }
    }
}

/// Why a record did not become a variant
#[derive(Clone, Copy, Debug, PartialEq)]
enum SkipReason {
    Filtered,
    UnusableGenotype,
    Malformed
}

/// Converts one record into a variant for the sample at `sample_index`
/// # Arguments
/// * `record` - the parsed record
/// * `source_index` - ordinal of the record within its sequence
/// * `sample_index` - the sample whose genotype is used
/// * `config` - the loader settings
fn parse_record(
    record: &vcf::variant::RecordBuf,
    source_index: usize,
    sample_index: usize,
    config: &LoaderConfig
) -> Result<Variant, SkipReason> {
    use vcf::variant::record::samples::series::value::genotype::Phasing;
    use vcf::variant::record_buf::samples::sample::Value;

    if !config.all_records {
        let filters = record.filters().as_ref();
        if !filters.iter().all(|f| f == "PASS") {
            return Err(SkipReason::Filtered);
        }
    }

    let sample = record.samples().get_index(sample_index)
        .ok_or(SkipReason::UnusableGenotype)?;
    let Some(Some(Value::Genotype(genotype))) = sample.get(vcf_key::GENOTYPE) else {
        return Err(SkipReason::UnusableGenotype);
    };

    let gt_alleles = genotype.as_ref();
    let (indices, is_phased) = match gt_alleles {
        [a1] => (vec![a1.position()], false),
        [a1, a2] => {
            let is_phased = a1.phasing() == Phasing::Phased || a2.phasing() == Phasing::Phased;
            (vec![a1.position(), a2.position()], is_phased)
        },
        _ => return Err(SkipReason::UnusableGenotype)
    };
    let indices: Vec<usize> = indices.into_iter().collect::<Option<_>>()
        .ok_or(SkipReason::UnusableGenotype)?;
    if indices.iter().all(|&i| i == 0) {
        return Err(SkipReason::UnusableGenotype);
    }

    let ref_allele = record.reference_bases().to_ascii_uppercase().into_bytes();
    let alts = record.alternate_bases().as_ref();
    let mut alleles: Vec<Vec<u8>> = Vec::with_capacity(indices.len());
    for &index in indices.iter() {
        let allele = if index == 0 {
            ref_allele.clone()
        } else {
            let alt = alts.get(index - 1).ok_or(SkipReason::Malformed)?;
            if !is_sequence_allele(alt) {
                return Err(SkipReason::Malformed);
            }
            alt.to_ascii_uppercase().into_bytes()
        };
        alleles.push(allele);
    }
    if !is_sequence_allele(record.reference_bases()) {
        return Err(SkipReason::Malformed);
    }

    let position = record.variant_start().ok_or(SkipReason::Malformed)?.get() as u64 - 1;
    let (start, end, mut trimmed) = trim_alleles(position, &ref_allele, alleles);
    let allele_a = trimmed.remove(0);
    let allele_b = trimmed.pop();

    let score = extract_score(record, sample_index, &config.score_field);
    Variant::new(source_index, start, end, allele_a, allele_b, is_phased, score)
        .map_err(|_| SkipReason::Malformed)
}

/// True for plain nucleotide alleles; symbolic, breakend, and spanning-deletion alleles fail
fn is_sequence_allele(allele: &str) -> bool {
    !allele.is_empty() && allele.bytes().all(|b| b.is_ascii_alphabetic())
}

/// Removes the bases shared by the reference and every allele, first from the front and then from the back.
/// Returns the trimmed `[start, end)` reference span and the trimmed alleles.
/// # Arguments
/// * `position` - 0-based position of the first REF base
/// * `ref_allele` - the REF bases
/// * `alleles` - the genotype alleles
pub fn trim_alleles(position: u64, ref_allele: &[u8], mut alleles: Vec<Vec<u8>>) -> (u64, u64, Vec<Vec<u8>>) {
    let shared = |a: &[u8], b: &[u8], from_back: bool| -> usize {
        if from_back {
            a.iter().rev().zip(b.iter().rev()).take_while(|(x, y)| x == y).count()
        } else {
            a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
        }
    };

    let prefix = alleles.iter()
        .map(|a| shared(ref_allele, a, false))
        .min().unwrap_or(0);
    let ref_rest = &ref_allele[prefix..];
    for allele in alleles.iter_mut() {
        allele.drain(..prefix);
    }

    let suffix = alleles.iter()
        .map(|a| shared(ref_rest, a, true))
        .min().unwrap_or(0);
    let ref_trimmed = &ref_rest[..ref_rest.len() - suffix];
    for allele in alleles.iter_mut() {
        allele.truncate(allele.len() - suffix);
    }

    let start = position + prefix as u64;
    (start, start + ref_trimmed.len() as u64, alleles)
}

/// Pulls the ROC score for a record, NaN if the field is absent or not numeric
fn extract_score(record: &vcf::variant::RecordBuf, sample_index: usize, score_field: &RocScoreField) -> f64 {
    use vcf::variant::record_buf::info::field::Value as InfoValue;
    use vcf::variant::record_buf::samples::sample::Value as SampleValue;

    match score_field {
        RocScoreField::Qual => record.quality_score().map_or(f64::NAN, |q| q as f64),
        RocScoreField::Info(key) => match record.info().get(key.as_str()) {
            Some(Some(InfoValue::Integer(v))) => *v as f64,
            Some(Some(InfoValue::Float(v))) => *v as f64,
            _ => f64::NAN
        },
        RocScoreField::Format(key) => {
            let samples = record.samples();
            let value = samples.get_index(sample_index)
                .and_then(|sample| sample.get(key.as_str()).flatten().cloned());
            match value {
                Some(SampleValue::Integer(v)) => v as f64,
                Some(SampleValue::Float(v)) => v as f64,
                _ => f64::NAN
            }
        }
    }
}

/// Converts all the records on one sequence into sorted, non-overlapping variants
/// # Arguments
/// * `sequence_name` - the sequence being loaded
/// * `records` - every record on the sequence, in file order
/// * `reference` - the full sequence
/// * `sample_index` - the sample whose genotype is used
/// * `config` - the loader settings
/// * `regions` - optional evaluation regions
pub fn convert_records(
    sequence_name: &str,
    records: &[vcf::variant::RecordBuf],
    reference: &[u8],
    sample_index: usize,
    config: &LoaderConfig,
    regions: Option<&EvaluationRegions>
) -> (Vec<Variant>, WarningCounts) {
    let mut warnings = WarningCounts::default();
    let mut variants = vec![];
    for (source_index, record) in records.iter().enumerate() {
        let variant = match parse_record(record, source_index, sample_index, config) {
            Ok(v) => v,
            Err(SkipReason::Filtered) => { warnings.filtered_records += 1; continue; },
            Err(SkipReason::UnusableGenotype) => { warnings.unusable_genotypes += 1; continue; },
            Err(SkipReason::Malformed) => { warnings.malformed_variants += 1; continue; }
        };

        match variant.validate(reference, config.max_length) {
            Ok(()) => {},
            Err(VariantError::NoChange { .. }) => { warnings.unusable_genotypes += 1; continue; },
            Err(e) => {
                debug!("Skipping record {source_index} on {sequence_name}: {e}");
                warnings.malformed_variants += 1;
                continue;
            }
        };

        if let Some(regions) = regions {
            if !regions.contains(sequence_name, variant.start(), variant.end()) {
                warnings.outside_regions += 1;
                continue;
            }
        }
        variants.push(variant);
    }

    variants.sort();
    let mut kept: Vec<Variant> = Vec::with_capacity(variants.len());
    for variant in variants.into_iter() {
        if let Some(previous) = kept.last() {
            let overlaps = variant.start() < previous.end();
            let ambiguous_insertion = variant.is_pure_insertion() && previous.is_pure_insertion() &&
                variant.start() == previous.start();
            if overlaps || ambiguous_insertion {
                warnings.overlapping_variants += 1;
                continue;
            }
        }
        kept.push(variant);
    }
    (kept, warnings)
}

/// One of the two VCF inputs
struct VcfInput {
    vcf: IndexedVcf,
    sample_index: usize
}

impl VcfInput {
    fn open(filename: &Path, sample_name: Option<&str>) -> anyhow::Result<Self> {
        let vcf = IndexedVcf::open(filename)?;
        let sample_index = vcf.sample_index(sample_name)?;
        Ok(Self { vcf, sample_index })
    }
}

/// Hands out one [`VariantSet`] per reference sequence, in sorted reference order
pub struct VcfVariantSetLoader {
    /// Shared reference genome
    reference_genome: Arc<ReferenceGenome>,
    /// Sequences not yet handed out
    sequence_names: VecDeque<String>,
    baseline: VcfInput,
    calls: VcfInput,
    /// Optional restriction of the evaluation
    regions: Option<EvaluationRegions>,
    config: LoaderConfig
}

impl VcfVariantSetLoader {
    /// Opens both inputs and queues every reference sequence
    /// # Arguments
    /// * `reference_genome` - the shared reference
    /// * `baseline_fn` - the baseline VCF, bgzipped and tabix indexed
    /// * `baseline_sample` - sample to use from the baseline, defaults to the first
    /// * `calls_fn` - the called VCF, bgzipped and tabix indexed
    /// * `calls_sample` - sample to use from the calls, defaults to the first
    /// * `regions` - optional evaluation regions
    /// * `config` - the loader settings
    pub fn new(
        reference_genome: Arc<ReferenceGenome>,
        baseline_fn: &Path, baseline_sample: Option<&str>,
        calls_fn: &Path, calls_sample: Option<&str>,
        regions: Option<EvaluationRegions>,
        config: LoaderConfig
    ) -> anyhow::Result<Self> {
        let baseline = VcfInput::open(baseline_fn, baseline_sample)?;
        let calls = VcfInput::open(calls_fn, calls_sample)?;

        let mut sequence_names: Vec<String> = reference_genome.contig_keys().iter().cloned().collect();
        sequence_names.sort();

        Ok(Self {
            reference_genome,
            sequence_names: sequence_names.into(),
            baseline,
            calls,
            regions,
            config
        })
    }

    /// Loads and converts both sides for one sequence
    fn load_sequence(&mut self, sequence_name: String) -> anyhow::Result<VariantSet> {
        if self.regions.as_ref().is_some_and(|r| !r.has_sequence(&sequence_name)) {
            debug!("No evaluation regions on {sequence_name}, skipping its records");
            return Ok(VariantSet::empty(sequence_name));
        }

        let reference = self.reference_genome.get_full_chromosome(&sequence_name);
        let mut warnings = WarningCounts::default();
        let mut sides = vec![];
        for input in [&mut self.baseline, &mut self.calls] {
            let records = input.vcf.query_sequence(&sequence_name)
                .with_context(|| format!("Error while loading {sequence_name} from {:?}:", input.vcf.filename()))?;
            let (variants, side_warnings) = convert_records(
                &sequence_name, &records, reference, input.sample_index, &self.config, self.regions.as_ref()
            );
            warnings += side_warnings;
            sides.push(variants);
        }

        let calls = sides.pop().unwrap_or_default();
        let baseline = sides.pop().unwrap_or_default();
        info!("Loaded {} baseline and {} called variants on {sequence_name}", baseline.len(), calls.len());
        Ok(VariantSet::new(sequence_name, baseline, calls, warnings))
    }
}

impl VariantSetSource for VcfVariantSetLoader {
    fn next_set(&mut self) -> anyhow::Result<Option<VariantSet>> {
        match self.sequence_names.pop_front() {
            Some(sequence_name) => Ok(Some(self.load_sequence(sequence_name)?)),
            None => Ok(None)
        }
    }
}
