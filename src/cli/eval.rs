use anyhow::bail;
use clap::Args;
use log::info;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::core::{check_optional_filename, check_required_filename, AFTER_HELP, FULL_VERSION};
use crate::parsing::noodles_helper::get_vcf_sample_name;
use crate::parsing::variant_loader::RocScoreField;

/// Direction in which scores get better
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, strum_macros::AsRefStr)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Low scores are the most confident
    Ascending,
    /// High scores are the most confident
    #[default]
    Descending
}

#[derive(Args, Clone, Default, Serialize)]
#[clap(author, about,
    after_help = &**AFTER_HELP
)]
pub struct EvalSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    varsync_version: String,

    /// Reference FASTA file
    #[clap(required = true)]
    #[clap(short = 'r')]
    #[clap(long = "reference")]
    #[clap(value_name = "FASTA")]
    #[clap(help_heading = Some("Input/Output"))]
    pub reference_fn: PathBuf,

    /// Baseline variant call file (VCF, bgzipped and tabix indexed)
    #[clap(required = true)]
    #[clap(short = 'b')]
    #[clap(long = "baseline")]
    #[clap(value_name = "VCF")]
    #[clap(help_heading = Some("Input/Output"))]
    pub baseline_vcf_filename: PathBuf,

    /// Called variant call file (VCF, bgzipped and tabix indexed)
    #[clap(required = true)]
    #[clap(short = 'c')]
    #[clap(long = "calls")]
    #[clap(value_name = "VCF")]
    #[clap(help_heading = Some("Input/Output"))]
    pub calls_vcf_filename: PathBuf,

    /// Restricts the evaluation to these regions (BED)
    #[clap(long = "bed-regions")]
    #[clap(value_name = "BED")]
    #[clap(help_heading = Some("Input/Output"))]
    pub bed_regions: Option<PathBuf>,

    /// Output directory containing the categorized VCFs, ROC tables, and summary
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-dir")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_folder: PathBuf,

    /// The sample name to use in the baseline VCF [default: first sample]
    #[clap(long = "baseline-sample")]
    #[clap(value_name = "SAMPLE")]
    #[clap(help_heading = Some("Input/Output"))]
    #[clap(default_value = "", hide_default_value = true)]
    pub baseline_sample: String,

    /// The sample name to use in the called VCF [default: first sample]
    #[clap(long = "sample")]
    #[clap(value_name = "SAMPLE")]
    #[clap(help_heading = Some("Input/Output"))]
    #[clap(default_value = "", hide_default_value = true)]
    pub calls_sample: String,

    /// Writes the matched baseline records to tp-baseline.vcf.gz
    #[clap(long = "output-baseline-tp")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_baseline_tp: bool,

    /// Uses every record instead of only those that PASS
    #[clap(long = "all-records")]
    #[clap(help_heading = Some("Variant loading"))]
    pub all_records: bool,

    /// Drops variants with an allele or REF span longer than this
    #[clap(long = "max-length")]
    #[clap(value_name = "BP")]
    #[clap(help_heading = Some("Variant loading"))]
    #[clap(default_value = "1000")]
    pub max_length: usize,

    /// Field that ranks the calls: QUAL, INFO.<key>, or FORMAT.<key>
    #[clap(long = "roc-score")]
    #[clap(value_name = "FIELD")]
    #[clap(help_heading = Some("ROC parameters"))]
    #[clap(default_value = "GQ")]
    pub roc_score: String,

    /// Direction in which the ROC score gets better
    #[clap(long = "sort-order")]
    #[clap(value_name = "ORDER")]
    #[clap(help_heading = Some("ROC parameters"))]
    #[clap(value_enum, default_value_t = SortOrder::Descending)]
    pub sort_order: SortOrder,

    /// Number of open search paths before a region is skipped as too complex
    #[clap(long = "max-complexity")]
    #[clap(value_name = "INT")]
    #[clap(help_heading = Some("Search parameters"))]
    #[clap(default_value = "1000")]
    pub max_complexity: usize,

    /// Number of threads to use in the evaluation step
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    pub threads: usize,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8
}

impl EvalSettings {
    /// The parsed ROC score field, only valid after `check_eval_settings`
    pub fn roc_score_field(&self) -> anyhow::Result<RocScoreField> {
        self.roc_score.parse()
    }
}

pub fn check_eval_settings(mut settings: EvalSettings) -> anyhow::Result<EvalSettings> {
    // hard code the version in
    settings.varsync_version = FULL_VERSION.clone();
    info!("varsync version: {:?}", &settings.varsync_version);
    info!("Sub-command: eval");
    info!("Inputs:");

    // check for all the required input files
    check_required_filename(&settings.reference_fn, "Reference FASTA")?;
    check_required_filename(&settings.baseline_vcf_filename, "Baseline VCF")?;
    check_required_filename(&settings.calls_vcf_filename, "Called VCF")?;
    check_optional_filename(settings.bed_regions.as_deref(), "BED regions")?;

    // dump stuff to the logger
    info!("\tReference: {:?}", &settings.reference_fn);
    info!("\tBaseline VCF: {:?}", &settings.baseline_vcf_filename);
    if settings.baseline_sample.is_empty() {
        settings.baseline_sample = get_vcf_sample_name(&settings.baseline_vcf_filename, 0)?;
    }
    info!("\tBaseline sample: {:?}", &settings.baseline_sample);
    info!("\tCalled VCF: {:?}", &settings.calls_vcf_filename);
    if settings.calls_sample.is_empty() {
        settings.calls_sample = get_vcf_sample_name(&settings.calls_vcf_filename, 0)?;
    }
    info!("\tCalled sample: {:?}", &settings.calls_sample);
    if let Some(bed_fn) = settings.bed_regions.as_deref() {
        info!("\tBED regions: {bed_fn:?}");
    } else {
        info!("\tBED regions: None");
    }

    // outputs
    info!("Outputs:");
    info!("\tOutput folder: {:?}", &settings.output_folder);
    info!("\tBaseline true positives: {}", if settings.output_baseline_tp { "ENABLED" } else { "DISABLED" });

    info!("Variant loading parameters:");
    if settings.max_length == 0 {
        bail!("--max-length must be >0");
    }
    info!("\tMaximum allele length: {}", settings.max_length);
    info!("\tRecords used: {}", if settings.all_records { "ALL" } else { "PASS only" });

    info!("ROC parameters:");
    let score_field = settings.roc_score_field()?;
    info!("\tScore field: {score_field}");
    info!("\tSort order: {}", settings.sort_order.as_ref());

    info!("Search parameters:");
    if settings.max_complexity == 0 {
        bail!("--max-complexity must be >0");
    }
    info!("\tMaximum complexity: {}", settings.max_complexity);

    if settings.threads == 0 {
        settings.threads = 1;
    }
    info!("Processing threads: {}", settings.threads);

    Ok(settings)
}
