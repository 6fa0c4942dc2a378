use indicatif::ProgressBar;
use log::{LevelFilter, error, info, warn};
use rust_lib_reference_genome::reference_genome::ReferenceGenome;
use std::sync::Arc;
use std::time::Instant;

use varsync::cli::core::{Commands, get_cli};
use varsync::cli::eval::{EvalSettings, check_eval_settings};
use varsync::data_types::roc_container::{RocContainer, RocFilter};
use varsync::eval_synchronizer::EvalSynchronizer;
use varsync::parsing::evaluation_regions::EvaluationRegions;
use varsync::parsing::variant_loader::{LoaderConfigBuilder, VcfVariantSetLoader};
use varsync::sequence_evaluator::{evaluate_all, is_data_inconsistency, EvalConfigBuilder};
use varsync::util::json_io::save_json;
use varsync::util::progress_bar::get_progress_style;
use varsync::writers::roc_writer::write_roc_tables;
use varsync::writers::summary::{write_phasing, write_summary};
use varsync::writers::variant_categorizer::VariantCategorizer;

fn run_eval(settings: EvalSettings) {
    // start the timer
    let start_time = Instant::now();

    // set up logging before we check the other settings
    let filter_level: LevelFilter = match settings.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();

    let settings = match check_eval_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };
    let score_field = match settings.roc_score_field() {
        Ok(sf) => sf,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    // set up the number of threads for rayon
    match rayon::ThreadPoolBuilder::new().num_threads(settings.threads).build_global() {
        Ok(()) => {},
        Err(e) => {
            error!("Error while building thread pool: {e}");
            std::process::exit(exitcode::OSERR);
        }
    };

    // create the primary output folder
    info!("Creating output folder at {:?}...", settings.output_folder);
    match std::fs::create_dir_all(&settings.output_folder) {
        Ok(()) => {},
        Err(e) => {
            error!("Error while creating output folder: {e}");
            std::process::exit(exitcode::IOERR);
        }
    }

    // save the CLI options
    let cli_json = settings.output_folder.join("cli_settings.json");
    info!("Saving CLI options to {cli_json:?}...");
    if let Err(e) = save_json(&settings, &cli_json) {
        error!("Error while saving CLI options: {e}");
        std::process::exit(exitcode::IOERR);
    }

    // load the reference genome
    info!("Pre-loading reference genome into memory...");
    let reference_genome = match ReferenceGenome::from_fasta(&settings.reference_fn) {
        Ok(rg) => Arc::new(rg),
        Err(e) => {
            error!("Error while loading reference genome: {e:?}");
            std::process::exit(exitcode::IOERR);
        }
    };

    let regions = settings.bed_regions.as_deref().map(|bed_fn| {
        info!("Pre-loading evaluation regions into memory...");
        match EvaluationRegions::from_bed(bed_fn) {
            Ok(r) => r,
            Err(e) => {
                error!("Error while loading evaluation regions: {e:#}");
                std::process::exit(exitcode::IOERR);
            }
        }
    });

    // build our configurations
    let loader_config = match LoaderConfigBuilder::default()
        .max_length(settings.max_length)
        .all_records(settings.all_records)
        .score_field(score_field.clone())
        .build() {
        Ok(lc) => lc,
        Err(e) => {
            error!("Error while building loader config: {e:?}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };
    let eval_config = match EvalConfigBuilder::default()
        .max_complexity(settings.max_complexity)
        .output_baseline_tp(settings.output_baseline_tp)
        .build() {
        Ok(ec) => ec,
        Err(e) => {
            error!("Error while building eval config: {e:?}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };

    info!("Opening input VCF files...");
    let loader = match VcfVariantSetLoader::new(
        reference_genome.clone(),
        &settings.baseline_vcf_filename, Some(&settings.baseline_sample),
        &settings.calls_vcf_filename, Some(&settings.calls_sample),
        regions,
        loader_config
    ) {
        Ok(l) => l,
        Err(e) => {
            error!("Error while opening input VCF files: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };

    info!("Opening output VCF files...");
    let categorizer = match VariantCategorizer::new(
        &settings.baseline_vcf_filename, &settings.calls_vcf_filename,
        &settings.output_folder, settings.output_baseline_tp
    ) {
        Ok(vc) => vc,
        Err(e) => {
            error!("Error while building output VCF writers: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };

    let synchronizer = EvalSynchronizer::new(
        Box::new(loader), Box::new(categorizer), RocContainer::new(settings.sort_order)
    );

    info!("Evaluating {} sequences...", reference_genome.contig_keys().len());
    let progress_bar = ProgressBar::new(reference_genome.contig_keys().len() as u64);
    progress_bar.set_style(get_progress_style());
    if let Err(e) = evaluate_all(&synchronizer, &reference_genome, eval_config, settings.threads, &progress_bar) {
        progress_bar.abandon();
        error!("Error while evaluating variants: {e:#}");
        let code = if is_data_inconsistency(&e) { exitcode::SOFTWARE } else { exitcode::IOERR };
        std::process::exit(code);
    }
    progress_bar.finish();

    info!("Finalizing and indexing output VCF files...");
    let totals = match synchronizer.finish() {
        Ok(t) => t,
        Err(e) => {
            error!("Error while finalizing output VCF files: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };

    info!("Saving ROC tables...");
    let baseline_total = |filter: RocFilter| totals.metrics.get(&filter).map_or(0, |m| m.baseline_total());
    if let Err(e) = write_roc_tables(&totals.roc, &settings.output_folder, &score_field, baseline_total) {
        error!("Error while saving ROC tables: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    let summary_fn = settings.output_folder.join("summary.tsv");
    info!("Saving output summary to {summary_fn:?}...");
    if let Err(e) = write_summary(&totals.metrics, &summary_fn) {
        error!("Error while saving summary file: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    let phasing_fn = settings.output_folder.join("phasing.tsv");
    info!("Saving phasing summary to {phasing_fn:?}...");
    if let Err(e) = write_phasing(&totals.phasing, &phasing_fn) {
        error!("Error while saving phasing file: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    let all_metrics = totals.metrics.get(&RocFilter::All).copied().unwrap_or_default();
    info!("All variants: {all_metrics:?}");
    info!("\tRecall: {:?}", all_metrics.recall());
    info!("\tPrecision: {:?}", all_metrics.precision());
    info!("\tF1: {:?}", all_metrics.f1());
    info!("Phasing: {:?}", totals.phasing);

    let warnings = totals.warnings;
    if !warnings.is_empty() {
        warn!("Some variants were not evaluated:");
        warn!("\tComplex regions skipped: {}", warnings.skipped_regions);
        warn!("\tBaseline variants in skipped regions: {}", warnings.skipped_baseline);
        warn!("\tCalled variants in skipped regions: {}", warnings.skipped_called);
        warn!("\tRecords failing FILTER: {}", warnings.filtered_records);
        warn!("\tRecords with unusable genotypes: {}", warnings.unusable_genotypes);
        warn!("\tMalformed variants: {}", warnings.malformed_variants);
        warn!("\tOverlapping variants: {}", warnings.overlapping_variants);
        warn!("\tVariants outside the BED regions: {}", warnings.outside_regions);
    }

    info!("Evaluation completed in {} seconds.", start_time.elapsed().as_secs_f64());
}

fn main() {
    let cli = get_cli();
    match cli.command {
        Commands::Eval(settings) => {
            run_eval(*settings);
        }
    }

    info!("Process finished successfully.");
}
