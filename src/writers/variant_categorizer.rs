use anyhow::{anyhow, Context};
use log::debug;
use noodles::vcf;
use noodles::vcf::header::record::value::{Map, map};
use noodles::vcf::variant::io::Write;
use noodles::vcf::variant::record_buf::info::field::Value as InfoValue;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::data_types::sequence_result::{RecordRef, SequenceResult};
use crate::eval_synchronizer::EvalOutput;
use crate::parsing::noodles_helper::IndexedVcf;

/// INFO key holding the fractional true-positive weight of a called record
pub const WEIGHT_KEY: &str = "VSW";

/// A listed record could not be found again in its input
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum CategorizeError {
    #[error("record {source_index} on {sequence_name} is missing from {filename:?}")]
    MissingRecord { sequence_name: String, source_index: usize, filename: PathBuf },
    #[error("record {source_index} on {sequence_name} in {filename:?} is at {record_start}, which cannot hold a variant at {variant_start}")]
    PositionMismatch { sequence_name: String, source_index: usize, filename: PathBuf, record_start: u64, variant_start: u64 }
}

/// The output VCFs
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, strum_macros::AsRefStr)]
pub enum Category {
    #[strum(serialize = "tp.vcf.gz")]
    TruePositive,
    #[strum(serialize = "fp.vcf.gz")]
    FalsePositive,
    #[strum(serialize = "fn.vcf.gz")]
    FalseNegative,
    #[strum(serialize = "tp-baseline.vcf.gz")]
    BaselineTruePositive
}

/// One output VCF
struct CategoryWriter {
    filename: PathBuf,
    header: vcf::Header,
    writer: vcf::io::Writer<noodles::bgzf::io::Writer<File>>
}

impl CategoryWriter {
    fn new(filename: PathBuf, header: vcf::Header) -> anyhow::Result<Self> {
        debug!("Opening {filename:?} for writing...");
        let file = File::create(&filename)
            .with_context(|| format!("Error while creating {filename:?}:"))?;
        let mut writer = vcf::io::Writer::new(noodles::bgzf::io::Writer::new(file));
        writer.write_header(&header)
            .with_context(|| format!("Error while writing header to {filename:?}:"))?;
        Ok(Self { filename, header, writer })
    }

    fn write(&mut self, record: &vcf::variant::RecordBuf) -> anyhow::Result<()> {
        self.writer.write_variant_record(&self.header, record)
            .with_context(|| format!("Error while writing to {:?}:", self.filename))
    }
}

/// Re-reads the original records and splits them into categorized VCFs.
/// Records keep every original column, called true positives also get a weight in INFO.
pub struct VariantCategorizer {
    baseline: IndexedVcf,
    calls: IndexedVcf,
    writers: BTreeMap<Category, CategoryWriter>
}

impl VariantCategorizer {
    /// Constructor that opens both inputs and creates the output files.
    /// # Arguments
    /// * `baseline_fn` - the baseline VCF
    /// * `calls_fn` - the called VCF
    /// * `output_folder` - the files are created inside it
    /// * `output_baseline_tp` - if true, matched baseline records get their own file
    /// # Errors
    /// * if there are any problems opening the input files or writing files to the output folder
    pub fn new(baseline_fn: &Path, calls_fn: &Path, output_folder: &Path, output_baseline_tp: bool) -> anyhow::Result<Self> {
        let baseline = IndexedVcf::open(baseline_fn)?;
        let calls = IndexedVcf::open(calls_fn)?;

        let ver: &str = crate::cli::core::FULL_VERSION.as_str();
        let cli_version = format!("\"{}\"", ver);
        let cli_string = format!("\"{}\"", std::env::args().collect::<Vec<String>>().join(" "));
        let stamp = |header: &vcf::Header| -> anyhow::Result<vcf::Header> {
            let mut header = header.clone();
            header.insert("varsync_version".parse()?, vcf::header::record::Value::from(cli_version.clone()))?;
            header.insert("varsync_command".parse()?, vcf::header::record::Value::from(cli_string.clone()))?;
            Ok(header)
        };

        let baseline_header = stamp(baseline.header())?;
        let calls_header = stamp(calls.header())?;
        let mut weighted_header = calls_header.clone();
        weighted_header.infos_mut().insert(
            WEIGHT_KEY.to_string(),
            Map::<map::Info>::new(map::info::Number::Count(1), map::info::Type::Float, "Fractional true-positive weight of the call")
        );

        let mut categories = vec![
            (Category::TruePositive, weighted_header),
            (Category::FalsePositive, calls_header),
            (Category::FalseNegative, baseline_header.clone())
        ];
        if output_baseline_tp {
            categories.push((Category::BaselineTruePositive, baseline_header));
        }

        let mut writers = BTreeMap::new();
        for (category, header) in categories.into_iter() {
            let vcf_fn = output_folder.join(category.as_ref());
            writers.insert(category, CategoryWriter::new(vcf_fn, header)?);
        }

        Ok(Self {
            baseline,
            calls,
            writers
        })
    }

    /// Copies the listed records of one input into an output
    fn write_category(
        writers: &mut BTreeMap<Category, CategoryWriter>,
        category: Category,
        sequence_name: &str,
        source: &IndexedVcf,
        records: &[vcf::variant::RecordBuf],
        record_refs: &[RecordRef]
    ) -> anyhow::Result<()> {
        let Some(writer) = writers.get_mut(&category) else {
            return Ok(());
        };

        for record_ref in record_refs.iter() {
            let record = find_record(sequence_name, source.filename(), records, record_ref)?;
            match record_ref.weight {
                Some(weight) => {
                    let mut weighted = record.clone();
                    weighted.info_mut().insert(WEIGHT_KEY.to_string(), Some(InfoValue::Float(weight as f32)));
                    writer.write(&weighted)?;
                },
                None => writer.write(record)?
            };
        }
        Ok(())
    }
}

/// Finds a record by its ordinal and checks that it can still hold the variant
/// # Arguments
/// * `sequence_name` - for error messages
/// * `filename` - for error messages
/// * `records` - all the records on the sequence, in file order
/// * `record_ref` - the record to find
pub fn find_record<'a>(
    sequence_name: &str,
    filename: &Path,
    records: &'a [vcf::variant::RecordBuf],
    record_ref: &RecordRef
) -> anyhow::Result<&'a vcf::variant::RecordBuf> {
    let record = records.get(record_ref.source_index)
        .ok_or_else(|| CategorizeError::MissingRecord {
            sequence_name: sequence_name.to_string(),
            source_index: record_ref.source_index,
            filename: filename.to_owned()
        })?;

    // trimming only ever moves the start right, and at most to the end of REF
    let record_start = record.variant_start()
        .ok_or(anyhow!("Missing POS in record {} of {sequence_name}", record_ref.source_index))?
        .get() as u64 - 1;
    let record_end = record_start + record.reference_bases().len() as u64;
    if record_ref.start < record_start || record_ref.start > record_end {
        return Err(CategorizeError::PositionMismatch {
            sequence_name: sequence_name.to_string(),
            source_index: record_ref.source_index,
            filename: filename.to_owned(),
            record_start,
            variant_start: record_ref.start
        }.into());
    }
    Ok(record)
}

impl EvalOutput for VariantCategorizer {
    fn write_sequence(&mut self, result: &SequenceResult) -> anyhow::Result<()> {
        let sequence_name = result.sequence_name.as_str();
        if result.is_empty() {
            return Ok(());
        }

        if !(result.true_positives.is_empty() && result.false_positives.is_empty()) {
            let records = self.calls.query_sequence(sequence_name)?;
            Self::write_category(&mut self.writers, Category::TruePositive, sequence_name, &self.calls, &records, &result.true_positives)?;
            Self::write_category(&mut self.writers, Category::FalsePositive, sequence_name, &self.calls, &records, &result.false_positives)?;
        }

        if !(result.false_negatives.is_empty() && result.baseline_true_positives.is_empty()) {
            let records = self.baseline.query_sequence(sequence_name)?;
            Self::write_category(&mut self.writers, Category::FalseNegative, sequence_name, &self.baseline, &records, &result.false_negatives)?;
            Self::write_category(&mut self.writers, Category::BaselineTruePositive, sequence_name, &self.baseline, &records, &result.baseline_true_positives)?;
        }
        Ok(())
    }

    /// Finalizes every BGZF stream and then indexes it
    fn finish(self: Box<Self>) -> anyhow::Result<()> {
        for (_category, category_writer) in self.writers.into_iter() {
            let vcf_fn = category_writer.filename;
            category_writer.writer.into_inner().finish()
                .with_context(|| format!("Error while finalizing {vcf_fn:?}:"))?;

            debug!("Generating index for {vcf_fn:?}...");
            crate::writers::noodles_idx::index_vcf(&vcf_fn)
                .with_context(|| format!("Error while writing index for {vcf_fn:?}"))?;
        }
        Ok(())
    }
}
